//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - Datetimes are serialised in MongoDB's own format.
//! - IDs live in the `_id` field.

mod candidate;
pub use candidate::{Candidate, CandidateCore, NewCandidate, TalliedCandidate};

mod identity;
pub use identity::IdentityClaim;

mod vote;
pub use vote::{Vote, VoteCore};

mod voter;
pub use voter::{NewVoter, Voter, VoterCore};
