use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::model::{
    api::{
        candidate::CandidateDescription, vote::VoteDescription, voter::VoterDescription,
    },
    common::{CandidateId, VoteId, VoterId},
};

/// A consistent snapshot of every record in the store.
///
/// Tallies are included as reported by the store, so that a dump can be
/// verified independently of the server that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyDump {
    pub voters: Vec<VoterDescription>,
    pub candidates: Vec<CandidateDescription>,
    pub votes: Vec<VoteDescription>,
}

/// Reasons a dump can fail verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// The same ID appears twice for one kind of record.
    DuplicateId { kind: &'static str, id: u32 },
    /// An email is also a candidate's name.
    SharedIdentity { identity: String },
    /// A vote references a voter that does not exist.
    UnknownVoter { vote_id: VoteId, voter_id: VoterId },
    /// A voter is referenced by more than one vote.
    MultipleVotes { voter_id: VoterId, votes: usize },
    /// A voter is marked as having voted without a vote, or vice versa.
    VoterState { voter_id: VoterId, has_voted: bool },
    /// A reported tally disagrees with the votes.
    Tally {
        candidate_id: CandidateId,
        reported: u32,
        counted: u32,
    },
}

impl Display for VerificationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateId { kind, id } => write!(f, "{kind} ID {id} appears more than once."),
            Self::SharedIdentity { identity } => write!(
                f,
                "'{identity}' is registered as both a voter email and a candidate name."
            ),
            Self::UnknownVoter { vote_id, voter_id } => {
                write!(f, "Vote {vote_id} was cast by unknown voter {voter_id}.")
            }
            Self::MultipleVotes { voter_id, votes } => {
                write!(f, "Voter {voter_id} cast {votes} votes.")
            }
            Self::VoterState {
                voter_id,
                has_voted: true,
            } => write!(f, "Voter {voter_id} is marked as voted but has no vote."),
            Self::VoterState {
                voter_id,
                has_voted: false,
            } => write!(f, "Voter {voter_id} has a vote but is not marked as voted."),
            Self::Tally {
                candidate_id,
                reported,
                counted,
            } => write!(
                f,
                "The tally for candidate {candidate_id} is {reported}, but {counted} votes reference them."
            ),
        }
    }
}

impl TallyDump {
    /// Check the tally invariants over this dump, reporting the first violation.
    ///
    /// Votes for candidates missing from the dump are allowed: they belong to
    /// candidates deleted in permissive mode.
    pub fn verify(&self) -> Result<(), VerificationError> {
        let mut voter_ids = HashSet::new();
        for voter in &self.voters {
            if !voter_ids.insert(voter.id) {
                return Err(VerificationError::DuplicateId {
                    kind: "Voter",
                    id: voter.id,
                });
            }
        }
        let mut candidate_ids = HashSet::new();
        for candidate in &self.candidates {
            if !candidate_ids.insert(candidate.id) {
                return Err(VerificationError::DuplicateId {
                    kind: "Candidate",
                    id: candidate.id,
                });
            }
        }

        // Identities.
        let emails = self
            .voters
            .iter()
            .map(|v| v.email.as_str())
            .collect::<HashSet<_>>();
        if let Some(candidate) = self
            .candidates
            .iter()
            .find(|c| emails.contains(c.name.as_str()))
        {
            return Err(VerificationError::SharedIdentity {
                identity: candidate.name.clone(),
            });
        }

        // One vote per voter, matching their state.
        let mut votes_by_voter: HashMap<VoterId, usize> = HashMap::new();
        let mut votes_by_candidate: HashMap<CandidateId, u32> = HashMap::new();
        let mut vote_ids = HashSet::new();
        for vote in &self.votes {
            if !vote_ids.insert(vote.id) {
                return Err(VerificationError::DuplicateId {
                    kind: "Vote",
                    id: vote.id,
                });
            }
            if !voter_ids.contains(&vote.voter_id) {
                return Err(VerificationError::UnknownVoter {
                    vote_id: vote.id,
                    voter_id: vote.voter_id,
                });
            }
            *votes_by_voter.entry(vote.voter_id).or_default() += 1;
            *votes_by_candidate.entry(vote.candidate_id).or_default() += 1;
        }
        for voter in &self.voters {
            let votes = votes_by_voter.get(&voter.id).copied().unwrap_or(0);
            if votes > 1 {
                return Err(VerificationError::MultipleVotes {
                    voter_id: voter.id,
                    votes,
                });
            }
            if voter.has_voted != (votes == 1) {
                return Err(VerificationError::VoterState {
                    voter_id: voter.id,
                    has_voted: voter.has_voted,
                });
            }
        }

        // Tallies.
        for candidate in &self.candidates {
            let counted = votes_by_candidate.get(&candidate.id).copied().unwrap_or(0);
            if candidate.votes != counted {
                return Err(VerificationError::Tally {
                    candidate_id: candidate.id,
                    reported: candidate.votes,
                    counted,
                });
            }
        }

        Ok(())
    }

    /// Number of votes referencing candidates that are no longer in the dump.
    pub fn orphaned_votes(&self) -> usize {
        let candidate_ids = self
            .candidates
            .iter()
            .map(|c| c.id)
            .collect::<HashSet<_>>();
        self.votes
            .iter()
            .filter(|v| !candidate_ids.contains(&v.candidate_id))
            .count()
    }
}
