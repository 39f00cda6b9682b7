//! The record store behind every operation.
//!
//! A store owns voters, candidates and votes, and is responsible for keeping
//! the tally invariants under concurrent requests:
//!
//! - an identity value is claimed by at most one voter or candidate;
//! - a voter has voted if and only if exactly one vote references them;
//! - a candidate's tally is the number of votes referencing them.
//!
//! Multi-record writes are all-or-nothing.

use std::sync::Arc;

use crate::error::Result;
use crate::model::{
    api::dump::TallyDump,
    ballot::Ballot,
    common::{CandidateId, VoterId},
    db::{Candidate, NewCandidate, NewVoter, TalliedCandidate, Vote, Voter},
};

mod memory;

pub use memory::MemoryStore;

/// A store shared between all request handlers.
pub type DynStore = Arc<dyn Store>;

/// What to do when deleting a candidate who has received votes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CandidateDeletion {
    /// Refuse with [`crate::error::Conflict::CandidateHasVotes`].
    Guarded,
    /// Delete anyway. Their votes remain but no longer count towards any tally.
    Permissive,
}

#[rocket::async_trait]
pub trait Store: Send + Sync {
    /// Register a voter, claiming their email as an identity.
    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter>;

    /// Register a candidate, claiming their name as an identity.
    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<TalliedCandidate>;

    async fn voter(&self, id: VoterId) -> Result<Option<Voter>>;

    async fn candidate(&self, id: CandidateId) -> Result<Option<TalliedCandidate>>;

    /// All voters, in ID order.
    async fn voters(&self) -> Result<Vec<Voter>>;

    /// All candidates with their tallies, in ID order.
    async fn candidates(&self) -> Result<Vec<TalliedCandidate>>;

    /// All votes, in ID order.
    async fn votes(&self) -> Result<Vec<Vote>>;

    /// Number of voters who have voted.
    async fn voted_voter_count(&self) -> Result<u64>;

    /// Delete a voter who has not voted, releasing their identity.
    async fn delete_voter(&self, id: VoterId) -> Result<Voter>;

    /// Delete a candidate, releasing their identity.
    async fn delete_candidate(
        &self,
        id: CandidateId,
        deletion: CandidateDeletion,
    ) -> Result<Candidate>;

    /// Check the ballot and record it as a vote in a single transaction.
    async fn cast_vote(&self, ballot: Ballot) -> Result<Vote>;

    /// A consistent snapshot of every record.
    async fn dump(&self) -> Result<TallyDump>;
}
