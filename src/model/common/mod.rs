mod identity;

pub use identity::{Identity, IdentityOwner};

/// Voter IDs are drawn from an auto-increment counter.
pub type VoterId = u32;
/// Candidate IDs are drawn from an auto-increment counter.
pub type CandidateId = u32;
/// Vote IDs are drawn from an auto-increment counter.
pub type VoteId = u32;
