use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    ballot::Ballot,
    common::{CandidateId, VoteId, VoterId},
    db::Vote,
};

/// A vote casting request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSpec {
    pub voter_id: Option<VoterId>,
    pub candidate_id: Option<CandidateId>,
}

impl TryFrom<VoteSpec> for Ballot {
    type Error = Error;

    fn try_from(spec: VoteSpec) -> Result<Self, Self::Error> {
        match (spec.voter_id, spec.candidate_id) {
            (Some(voter_id), Some(candidate_id)) => Ok(Ballot::new(voter_id, candidate_id)),
            _ => Err(Error::BadRequest(
                "voter_id and candidate_id are required".to_string(),
            )),
        }
    }
}

/// An API-friendly vote description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteDescription {
    pub id: VoteId,
    pub voter_id: VoterId,
    pub candidate_id: CandidateId,
    pub created_at: DateTime<Utc>,
}

impl From<Vote> for VoteDescription {
    fn from(vote: Vote) -> Self {
        Self {
            id: vote.id,
            voter_id: vote.vote.voter_id,
            candidate_id: vote.vote.candidate_id,
            created_at: vote.vote.created_at,
        }
    }
}

/// The response to a successfully cast vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    #[serde(flatten)]
    pub vote: VoteDescription,
    pub message: String,
}

impl From<Vote> for VoteReceipt {
    fn from(vote: Vote) -> Self {
        Self {
            vote: vote.into(),
            message: "Vote recorded successfully".to_string(),
        }
    }
}
