//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as `id`, not `_id`.
//! - Datetimes are serialised as RFC 3339 strings.

pub mod candidate;
pub mod dump;
pub mod message;
pub mod statistics;
pub mod vote;
pub mod voter;
