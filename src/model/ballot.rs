//! Rules for turning a ballot into a vote.
//!
//! Every store runs [`check_ballot`] inside the same transaction that records
//! the vote, so the checks and the write are never separated.

use serde::{Deserialize, Serialize};

use crate::error::{Conflict, Error, Result};
use crate::model::{
    common::{CandidateId, VoterId},
    db::{Candidate, Voter},
};

/// A request from a voter to vote for a candidate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub voter_id: VoterId,
    pub candidate_id: CandidateId,
}

impl Ballot {
    pub fn new(voter_id: VoterId, candidate_id: CandidateId) -> Self {
        Self {
            voter_id,
            candidate_id,
        }
    }
}

/// Check the preconditions for casting `ballot`, stopping at the first failure.
///
/// `voter` and `candidate` are the records the ballot refers to, if they
/// exist. `clashing` is any candidate whose name equals the voter's email.
pub fn check_ballot<'v>(
    ballot: &Ballot,
    voter: Option<&'v Voter>,
    candidate: Option<&Candidate>,
    clashing: Option<&Candidate>,
) -> Result<&'v Voter> {
    let voter = voter.ok_or_else(|| Error::not_found(format!("Voter {}", ballot.voter_id)))?;
    if candidate.is_none() {
        return Err(Error::not_found(format!(
            "Candidate {}",
            ballot.candidate_id
        )));
    }
    if let Some(clashing) = clashing {
        return Err(Conflict::IdentityConflict {
            voter_id: voter.id,
            candidate_id: clashing.id,
            identity: voter.email.clone(),
        }
        .into());
    }
    if voter.has_voted {
        return Err(Conflict::AlreadyVoted(voter.id).into());
    }
    Ok(voter)
}
