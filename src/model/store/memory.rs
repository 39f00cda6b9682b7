use log::debug;
use std::collections::{btree_map::Entry, BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Conflict, Error, Result};
use crate::model::{
    api::dump::TallyDump,
    ballot::{check_ballot, Ballot},
    common::{CandidateId, Identity, IdentityOwner, VoteId, VoterId},
    db::{Candidate, NewCandidate, NewVoter, TalliedCandidate, Vote, Voter},
};

use super::{CandidateDeletion, Store};

/// An in-process store.
///
/// Every operation holds a single lock for its whole duration, so operations
/// are serialisable and a failed operation never leaves partial writes.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    counters: Counters,
    voters: BTreeMap<VoterId, Voter>,
    candidates: BTreeMap<CandidateId, Candidate>,
    votes: BTreeMap<VoteId, Vote>,
    identities: HashMap<Identity, IdentityOwner>,
}

/// Auto-increment counters; the last ID handed out for each kind.
#[derive(Default)]
struct Counters {
    voter: VoterId,
    candidate: CandidateId,
    vote: VoteId,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| Error::Internal("Memory store lock poisoned".to_string()))
    }
}

impl Tables {
    fn tally(&self, candidate: &Candidate) -> TalliedCandidate {
        let votes = self
            .votes
            .values()
            .filter(|vote| vote.candidate_id == candidate.id)
            .count();
        TalliedCandidate {
            candidate: candidate.clone(),
            votes: votes as u32,
        }
    }

    /// Claim an identity, failing if anyone already holds it.
    fn claim(&mut self, identity: &Identity, owner: IdentityOwner) -> Result<()> {
        if let Some(holder) = self.identities.get(identity) {
            debug!("Identity '{identity}' already held by {holder}");
            return Err(Conflict::DuplicateIdentity(identity.clone()).into());
        }
        self.identities.insert(identity.clone(), owner);
        Ok(())
    }
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter> {
        let mut tables = self.lock()?;
        let id = tables.counters.voter + 1;
        tables.claim(&voter.email, IdentityOwner::Voter(id))?;
        tables.counters.voter = id;

        let voter = Voter::new(id, voter);
        tables.voters.insert(id, voter.clone());
        Ok(voter)
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<TalliedCandidate> {
        let mut tables = self.lock()?;
        let id = tables.counters.candidate + 1;
        tables.claim(&candidate.name, IdentityOwner::Candidate(id))?;
        tables.counters.candidate = id;

        let candidate = Candidate::new(id, candidate);
        tables.candidates.insert(id, candidate.clone());
        Ok(TalliedCandidate {
            candidate,
            votes: 0,
        })
    }

    async fn voter(&self, id: VoterId) -> Result<Option<Voter>> {
        Ok(self.lock()?.voters.get(&id).cloned())
    }

    async fn candidate(&self, id: CandidateId) -> Result<Option<TalliedCandidate>> {
        let tables = self.lock()?;
        Ok(tables.candidates.get(&id).map(|c| tables.tally(c)))
    }

    async fn voters(&self) -> Result<Vec<Voter>> {
        Ok(self.lock()?.voters.values().cloned().collect())
    }

    async fn candidates(&self) -> Result<Vec<TalliedCandidate>> {
        let tables = self.lock()?;
        Ok(tables.candidates.values().map(|c| tables.tally(c)).collect())
    }

    async fn votes(&self) -> Result<Vec<Vote>> {
        Ok(self.lock()?.votes.values().cloned().collect())
    }

    async fn voted_voter_count(&self) -> Result<u64> {
        let tables = self.lock()?;
        Ok(tables.voters.values().filter(|v| v.has_voted).count() as u64)
    }

    async fn delete_voter(&self, id: VoterId) -> Result<Voter> {
        let mut tables = self.lock()?;
        let voter = match tables.voters.entry(id) {
            Entry::Vacant(_) => return Err(Error::not_found(format!("Voter {id}"))),
            Entry::Occupied(entry) if entry.get().has_voted => {
                return Err(Conflict::HasVoted(id).into())
            }
            Entry::Occupied(entry) => entry.remove(),
        };
        tables.identities.remove(&voter.email);
        Ok(voter)
    }

    async fn delete_candidate(
        &self,
        id: CandidateId,
        deletion: CandidateDeletion,
    ) -> Result<Candidate> {
        let mut tables = self.lock()?;
        let has_votes = tables.votes.values().any(|vote| vote.candidate_id == id);
        let candidate = match tables.candidates.entry(id) {
            Entry::Vacant(_) => return Err(Error::not_found(format!("Candidate {id}"))),
            Entry::Occupied(_) if deletion == CandidateDeletion::Guarded && has_votes => {
                return Err(Conflict::CandidateHasVotes(id).into())
            }
            Entry::Occupied(entry) => entry.remove(),
        };
        tables.identities.remove(&candidate.name);
        Ok(candidate)
    }

    async fn cast_vote(&self, ballot: Ballot) -> Result<Vote> {
        let mut tables = self.lock()?;
        let voter = tables.voters.get(&ballot.voter_id);
        let clashing = voter.and_then(|voter| {
            tables
                .candidates
                .values()
                .find(|candidate| candidate.name == voter.email)
        });
        check_ballot(
            &ballot,
            voter,
            tables.candidates.get(&ballot.candidate_id),
            clashing,
        )?;

        // Nothing below can fail, so the three writes land together.
        let id = tables.counters.vote + 1;
        tables.counters.vote = id;
        let vote = Vote::new(id, &ballot);
        tables.votes.insert(id, vote.clone());
        if let Some(voter) = tables.voters.get_mut(&ballot.voter_id) {
            voter.has_voted = true;
        }
        Ok(vote)
    }

    async fn dump(&self) -> Result<TallyDump> {
        let tables = self.lock()?;
        Ok(TallyDump {
            voters: tables.voters.values().cloned().map(Into::into).collect(),
            candidates: tables
                .candidates
                .values()
                .map(|c| tables.tally(c).into())
                .collect(),
            votes: tables.votes.values().cloned().map(Into::into).collect(),
        })
    }
}
