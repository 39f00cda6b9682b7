use log::debug;
use std::time::Duration;

use mongodb::{
    bson::{doc, from_document, Document},
    error::Error as DbError,
    options::SessionOptions,
    Client, ClientSession, Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Conflict, Error, Result};
use crate::model::{
    api::{
        candidate::CandidateDescription, dump::TallyDump, vote::VoteDescription,
        voter::VoterDescription,
    },
    ballot::{check_ballot, Ballot},
    common::{CandidateId, Identity, IdentityOwner, VoteId, VoterId},
    db::{Candidate, IdentityClaim, NewCandidate, NewVoter, TalliedCandidate, Vote, Voter},
    store::{CandidateDeletion, Store},
};

use super::{
    collection::{ensure_indexes_exist, Coll},
    counter::{
        ensure_counters_exist, Counter, CANDIDATE_ID_COUNTER, VOTER_ID_COUNTER, VOTE_ID_COUNTER,
    },
    errors::{is_duplicate_key_error, is_write_conflict},
    u32_id_filter,
};

/// A store backed by MongoDB.
///
/// Multi-document writes run in a transaction. If anything fails before the
/// commit, the session is dropped and the driver aborts the transaction.
/// Transactions need a replica set deployment.
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connect to the given database, creating indexes and counters as needed.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        Self::from_client(client, db_name).await
    }

    /// Use an existing client, creating indexes and counters as needed.
    pub async fn from_client(client: Client, db_name: &str) -> Result<Self> {
        let db = client.database(db_name);
        ensure_indexes_exist(&db).await?;
        ensure_counters_exist(&Coll::from_db(&db)).await?;
        Ok(Self { client, db })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn voter_coll(&self) -> Coll<Voter> {
        Coll::from_db(&self.db)
    }

    fn candidate_coll(&self) -> Coll<Candidate> {
        Coll::from_db(&self.db)
    }

    fn vote_coll(&self) -> Coll<Vote> {
        Coll::from_db(&self.db)
    }

    fn identity_coll(&self) -> Coll<IdentityClaim> {
        Coll::from_db(&self.db)
    }

    fn counter_coll(&self) -> Coll<Counter> {
        Coll::from_db(&self.db)
    }

    async fn start_transaction(&self) -> Result<ClientSession> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        Ok(session)
    }

    /// Claim `identity` for `owner` within the session's transaction.
    async fn claim_identity(
        &self,
        identity: &Identity,
        owner: IdentityOwner,
        session: &mut ClientSession,
    ) -> Result<()> {
        let claim = IdentityClaim::new(identity.clone(), owner);
        self.identity_coll()
            .insert_one_with_session(&claim, None, session)
            .await
            .map_err(|e| identity_error(e, identity))?;
        Ok(())
    }

    async fn release_identity(
        &self,
        identity: &Identity,
        session: &mut ClientSession,
    ) -> Result<()> {
        self.identity_coll()
            .delete_one_with_session(doc! { "_id": identity }, None, session)
            .await?;
        Ok(())
    }

    /// Cast a ballot in one transaction.
    ///
    /// Returns `None` if another transaction wrote the candidate first, in
    /// which case nothing was committed and the cast may be tried again.
    async fn try_cast_vote(&self, ballot: &Ballot, vote_id: VoteId) -> Result<Option<Vote>> {
        let mut session = self.start_transaction().await?;

        // Preconditions.
        let voter = self
            .voter_coll()
            .find_one_with_session(u32_id_filter(ballot.voter_id), None, &mut session)
            .await?;
        let candidate = self
            .candidate_coll()
            .find_one_with_session(u32_id_filter(ballot.candidate_id), None, &mut session)
            .await?;
        let clashing = match &voter {
            Some(voter) => {
                self.candidate_coll()
                    .find_one_with_session(doc! { "name": &voter.email }, None, &mut session)
                    .await?
            }
            None => None,
        };
        check_ballot(
            ballot,
            voter.as_ref(),
            candidate.as_ref(),
            clashing.as_ref(),
        )?;

        // Flip the voter, guarding against a concurrent vote that committed
        // after our read.
        let filter = doc! {
            "_id": ballot.voter_id,
            "has_voted": false,
        };
        let update = doc! {
            "$set": { "has_voted": true }
        };
        let result = self
            .voter_coll()
            .update_one_with_session(filter, update, None, &mut session)
            .await
            .map_err(|e| vote_error(e, ballot.voter_id))?;
        if result.modified_count != 1 {
            return Err(Conflict::AlreadyVoted(ballot.voter_id).into());
        }

        // Write the candidate, so that a concurrent deletion conflicts with
        // this transaction rather than orphaning the vote.
        let update = doc! {
            "$set": { "last_vote_id": vote_id }
        };
        let result = match self
            .candidate_coll()
            .update_one_with_session(u32_id_filter(ballot.candidate_id), update, None, &mut session)
            .await
        {
            Ok(result) => result,
            Err(e) if is_write_conflict(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if result.matched_count != 1 {
            return Err(Error::not_found(format!("Candidate {}", ballot.candidate_id)));
        }

        // Record the vote. The candidate's tally is counted from these.
        let vote = Vote::new(vote_id, ballot);
        self.vote_coll()
            .insert_one_with_session(&vote, None, &mut session)
            .await
            .map_err(|e| vote_error(e, ballot.voter_id))?;

        session
            .commit_transaction()
            .await
            .map_err(|e| vote_error(e, ballot.voter_id))?;

        Ok(Some(vote))
    }

    /// Pipeline joining every candidate with the number of votes referencing it.
    fn tally_pipeline(filter: Document) -> Vec<Document> {
        vec![
            doc! { "$match": filter },
            doc! {
                "$lookup": {
                    "from": "votes",
                    "localField": "_id",
                    "foreignField": "candidate_id",
                    "as": "votes",
                }
            },
            doc! { "$set": { "votes": { "$size": "$votes" } } },
            doc! { "$sort": { "_id": 1 } },
        ]
    }

    async fn tallied_candidates(&self, filter: Document) -> Result<Vec<TalliedCandidate>> {
        let docs: Vec<Document> = self
            .candidate_coll()
            .aggregate(Self::tally_pipeline(filter), None)
            .await?
            .try_collect()
            .await?;
        docs.into_iter()
            .map(|d| from_document(d).map_err(Error::from))
            .collect()
    }
}

/// How many times a cast is attempted while its candidate is contended by
/// other transactions.
const CAST_ATTEMPTS: u32 = 10;

/// Pause before the next attempt, grown linearly per attempt.
const CAST_BACKOFF: Duration = Duration::from_millis(5);

/// Map a failed identity claim to a conflict where appropriate.
fn identity_error(err: DbError, identity: &Identity) -> Error {
    if is_duplicate_key_error(&err) || is_write_conflict(&err) {
        Conflict::DuplicateIdentity(identity.clone()).into()
    } else {
        err.into()
    }
}

/// Map a failed vote write to a conflict where appropriate. A second vote for
/// the same voter hits the unique index, or collides with the first in flight.
fn vote_error(err: DbError, voter_id: VoterId) -> Error {
    if is_duplicate_key_error(&err) || is_write_conflict(&err) {
        Conflict::AlreadyVoted(voter_id).into()
    } else {
        err.into()
    }
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter> {
        let id = Counter::next(&self.counter_coll(), VOTER_ID_COUNTER).await?;
        let voter = Voter::new(id, voter);

        let mut session = self.start_transaction().await?;
        self.claim_identity(&voter.email, IdentityOwner::Voter(id), &mut session)
            .await?;
        self.voter_coll()
            .insert_one_with_session(&voter, None, &mut session)
            .await
            .map_err(|e| identity_error(e, &voter.email))?;
        session.commit_transaction().await?;

        Ok(voter)
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<TalliedCandidate> {
        let id = Counter::next(&self.counter_coll(), CANDIDATE_ID_COUNTER).await?;
        let candidate = Candidate::new(id, candidate);

        let mut session = self.start_transaction().await?;
        self.claim_identity(&candidate.name, IdentityOwner::Candidate(id), &mut session)
            .await?;
        self.candidate_coll()
            .insert_one_with_session(&candidate, None, &mut session)
            .await
            .map_err(|e| identity_error(e, &candidate.name))?;
        session.commit_transaction().await?;

        Ok(TalliedCandidate {
            candidate,
            votes: 0,
        })
    }

    async fn voter(&self, id: VoterId) -> Result<Option<Voter>> {
        Ok(self.voter_coll().find_one(u32_id_filter(id), None).await?)
    }

    async fn candidate(&self, id: CandidateId) -> Result<Option<TalliedCandidate>> {
        Ok(self
            .tallied_candidates(u32_id_filter(id))
            .await?
            .into_iter()
            .next())
    }

    async fn voters(&self) -> Result<Vec<Voter>> {
        let options = mongodb::options::FindOptions::builder()
            .sort(doc! { "_id": 1 })
            .build();
        Ok(self
            .voter_coll()
            .find(None, options)
            .await?
            .try_collect()
            .await?)
    }

    async fn candidates(&self) -> Result<Vec<TalliedCandidate>> {
        self.tallied_candidates(doc! {}).await
    }

    async fn votes(&self) -> Result<Vec<Vote>> {
        let options = mongodb::options::FindOptions::builder()
            .sort(doc! { "_id": 1 })
            .build();
        Ok(self
            .vote_coll()
            .find(None, options)
            .await?
            .try_collect()
            .await?)
    }

    async fn voted_voter_count(&self) -> Result<u64> {
        Ok(self
            .voter_coll()
            .count_documents(doc! { "has_voted": true }, None)
            .await?)
    }

    async fn delete_voter(&self, id: VoterId) -> Result<Voter> {
        let mut session = self.start_transaction().await?;

        let voter = self
            .voter_coll()
            .find_one_with_session(u32_id_filter(id), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter {id}")))?;
        if voter.has_voted {
            return Err(Conflict::HasVoted(id).into());
        }

        // Only delete if they still haven't voted.
        let filter = doc! {
            "_id": id,
            "has_voted": false,
        };
        let result = self
            .voter_coll()
            .delete_one_with_session(filter, None, &mut session)
            .await
            .map_err(|e| {
                if is_write_conflict(&e) {
                    Conflict::HasVoted(id).into()
                } else {
                    Error::from(e)
                }
            })?;
        if result.deleted_count != 1 {
            return Err(Conflict::HasVoted(id).into());
        }
        self.release_identity(&voter.email, &mut session).await?;
        session.commit_transaction().await?;

        Ok(voter)
    }

    async fn delete_candidate(
        &self,
        id: CandidateId,
        deletion: CandidateDeletion,
    ) -> Result<Candidate> {
        let mut session = self.start_transaction().await?;

        let candidate = self
            .candidate_coll()
            .find_one_with_session(u32_id_filter(id), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate {id}")))?;
        if deletion == CandidateDeletion::Guarded {
            let votes = self
                .vote_coll()
                .count_documents_with_session(doc! { "candidate_id": id }, None, &mut session)
                .await?;
            if votes > 0 {
                return Err(Conflict::CandidateHasVotes(id).into());
            }
        }

        // A vote cast concurrently writes the candidate too, so exactly one of
        // the two transactions commits.
        self.candidate_coll()
            .delete_one_with_session(u32_id_filter(id), None, &mut session)
            .await
            .map_err(|e| match deletion {
                CandidateDeletion::Guarded if is_write_conflict(&e) => {
                    Conflict::CandidateHasVotes(id).into()
                }
                _ => Error::from(e),
            })?;
        self.release_identity(&candidate.name, &mut session).await?;
        session.commit_transaction().await?;

        Ok(candidate)
    }

    async fn cast_vote(&self, ballot: Ballot) -> Result<Vote> {
        let vote_id = Counter::next(&self.counter_coll(), VOTE_ID_COUNTER).await?;
        for attempt in 1..=CAST_ATTEMPTS {
            if let Some(vote) = self.try_cast_vote(&ballot, vote_id).await? {
                return Ok(vote);
            }
            debug!(
                "Candidate {} contended, retrying ballot {ballot:?} (attempt {attempt})",
                ballot.candidate_id
            );
            rocket::tokio::time::sleep(CAST_BACKOFF * attempt).await;
        }
        Err(Error::Internal(format!(
            "Candidate {} stayed contended for {CAST_ATTEMPTS} attempts",
            ballot.candidate_id
        )))
    }

    async fn dump(&self) -> Result<TallyDump> {
        // Ensure we read a consistent snapshot of the records.
        let session_options = SessionOptions::builder().snapshot(true).build();
        let mut session = self.client.start_session(Some(session_options)).await?;

        let mut voters: Vec<VoterDescription> = Vec::new();
        let mut cursor = self
            .voter_coll()
            .find_with_session(None, None, &mut session)
            .await?;
        while let Some(voter) = cursor.next(&mut session).await {
            voters.push(voter?.into());
        }

        let mut candidates: Vec<CandidateDescription> = Vec::new();
        let mut cursor = self
            .candidate_coll()
            .aggregate_with_session(Self::tally_pipeline(doc! {}), None, &mut session)
            .await?;
        while let Some(candidate) = cursor.next(&mut session).await {
            let candidate: TalliedCandidate = from_document(candidate?)?;
            candidates.push(candidate.into());
        }

        let mut votes: Vec<VoteDescription> = Vec::new();
        let mut cursor = self
            .vote_coll()
            .find_with_session(None, None, &mut session)
            .await?;
        while let Some(vote) = cursor.next(&mut session).await {
            votes.push(vote?.into());
        }

        let mut dump = TallyDump {
            voters,
            candidates,
            votes,
        };
        dump.voters.sort_by_key(|v| v.id);
        dump.votes.sort_by_key(|v| v.id);
        Ok(dump)
    }
}

#[cfg(test)]
mod tests {
    use rocket::futures::future::join_all;

    use crate::model::store::DynStore;

    use super::*;

    async fn register_voters(store: &DynStore, count: usize) -> Vec<VoterId> {
        let mut voters = Vec::new();
        for i in 0..count {
            let email = Identity::parse(&format!("voter{i}@x.com")).unwrap();
            let voter = store
                .insert_voter(NewVoter::new(format!("Voter {i}"), email))
                .await
                .unwrap();
            voters.push(voter.id);
        }
        voters
    }

    #[backend_test(mongodb)]
    async fn mongo_cast_vote(store: DynStore) {
        let voter = store.insert_voter(NewVoter::example()).await.unwrap();
        let candidate = store
            .insert_candidate(NewCandidate::example())
            .await
            .unwrap();

        let vote = store
            .cast_vote(Ballot::new(voter.id, candidate.id))
            .await
            .unwrap();
        assert_eq!(vote.voter_id, voter.id);

        let err = store
            .cast_vote(Ballot::new(voter.id, candidate.id))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(Conflict::AlreadyVoted(_))));

        let candidate = store.candidate(candidate.id).await.unwrap().unwrap();
        assert_eq!(candidate.votes, 1);
        assert_eq!(store.voted_voter_count().await.unwrap(), 1);
        store.dump().await.unwrap().verify().unwrap();
    }

    #[backend_test(mongodb)]
    async fn mongo_identity_claims(store: DynStore) {
        let voter = store.insert_voter(NewVoter::example()).await.unwrap();
        let clash = NewCandidate::new(voter.email.clone(), None);
        let err = store.insert_candidate(clash.clone()).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(Conflict::DuplicateIdentity(_))));

        // Deleting the voter frees the identity.
        store.delete_voter(voter.id).await.unwrap();
        store.insert_candidate(clash).await.unwrap();
        assert!(store.voters().await.unwrap().is_empty());
    }

    #[backend_test(mongodb)]
    async fn mongo_deletion_guards(store: DynStore) {
        let voter = store.insert_voter(NewVoter::example()).await.unwrap();
        let candidate = store
            .insert_candidate(NewCandidate::example())
            .await
            .unwrap();
        store
            .cast_vote(Ballot::new(voter.id, candidate.id))
            .await
            .unwrap();

        let err = store.delete_voter(voter.id).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(Conflict::HasVoted(_))));
        let err = store
            .delete_candidate(candidate.id, CandidateDeletion::Guarded)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(Conflict::CandidateHasVotes(_))));
        store
            .delete_candidate(candidate.id, CandidateDeletion::Permissive)
            .await
            .unwrap();
        assert_eq!(store.votes().await.unwrap().len(), 1);
    }

    #[backend_test(mongodb)]
    async fn mongo_concurrent_registrations_of_one_identity(store: DynStore) {
        let identity = NewVoter::example().email;
        let voters = (0..4).map(|i| {
            store.insert_voter(NewVoter::new(format!("Voter {i}"), identity.clone()))
        });
        let candidates = (0..4).map(|_| store.insert_candidate(NewCandidate::new(identity.clone(), None)));
        let (voters, candidates) =
            rocket::tokio::join!(join_all(voters), join_all(candidates));

        let registered = voters.iter().filter(|r| r.is_ok()).count()
            + candidates.iter().filter(|r| r.is_ok()).count();
        assert_eq!(registered, 1);
        for err in voters
            .iter()
            .filter_map(|r| r.as_ref().err())
            .chain(candidates.iter().filter_map(|r| r.as_ref().err()))
        {
            assert!(matches!(err, Error::Conflict(Conflict::DuplicateIdentity(_))));
        }
        let stored = store.voters().await.unwrap().len() + store.candidates().await.unwrap().len();
        assert_eq!(stored, 1);
    }

    #[backend_test(mongodb)]
    async fn mongo_votes_for_one_candidate_all_count(store: DynStore) {
        let candidate = store
            .insert_candidate(NewCandidate::example())
            .await
            .unwrap();
        let voters = register_voters(&store, 6).await;

        let casts = voters
            .iter()
            .map(|voter_id| store.cast_vote(Ballot::new(*voter_id, candidate.id)));
        for result in join_all(casts).await {
            result.unwrap();
        }

        let candidate = store.candidate(candidate.id).await.unwrap().unwrap();
        assert_eq!(candidate.votes, 6);
        store.dump().await.unwrap().verify().unwrap();
    }

    #[backend_test(mongodb)]
    async fn mongo_guarded_deletion_races_with_votes(store: DynStore) {
        let candidate = store
            .insert_candidate(NewCandidate::example())
            .await
            .unwrap();
        let voters = register_voters(&store, 6).await;

        let casts = voters
            .iter()
            .map(|voter_id| store.cast_vote(Ballot::new(*voter_id, candidate.id)));
        let deletion = store.delete_candidate(candidate.id, CandidateDeletion::Guarded);
        let (casts, deletion) = rocket::tokio::join!(join_all(casts), deletion);
        let cast = casts.iter().filter(|r| r.is_ok()).count();

        let dump = store.dump().await.unwrap();
        dump.verify().unwrap();
        assert_eq!(dump.orphaned_votes(), 0);
        match deletion {
            Ok(_) => {
                assert_eq!(cast, 0);
                assert!(dump.candidates.is_empty());
            }
            Err(err) => {
                assert!(matches!(err, Error::Conflict(Conflict::CandidateHasVotes(_))));
                assert_eq!(dump.candidates[0].votes as usize, cast);
            }
        }
    }
}
