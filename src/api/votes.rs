use log::{error, info, warn};
use rocket::{
    response::status::Created,
    serde::json::{Error as JsonError, Json},
    Route, State,
};

use crate::chart;
use crate::error::{Error, Result};
use crate::logging::RequestId;
use crate::model::{
    api::{
        statistics::StatisticsReport,
        vote::{VoteDescription, VoteReceipt, VoteSpec},
    },
    ballot::Ballot,
    statistics::Statistics,
    store::DynStore,
};
use crate::Config;

pub fn routes() -> Vec<Route> {
    routes![cast_vote, list_votes, compute_statistics]
}

#[post("/votes", data = "<spec>")]
async fn cast_vote(
    spec: std::result::Result<Json<VoteSpec>, JsonError<'_>>,
    store: &State<DynStore>,
    request_id: &RequestId,
) -> Result<Created<Json<VoteReceipt>>> {
    let ballot = Ballot::try_from(spec?.into_inner())?;

    let vote = match store.cast_vote(ballot).await {
        Ok(vote) => vote,
        Err(err @ (Error::NotFound(_) | Error::Conflict(_))) => {
            warn!("req{request_id} rejected ballot {ballot:?}: {err}");
            return Err(err);
        }
        Err(err) => return Err(err),
    };
    info!(
        "req{request_id} recorded vote {} from voter {} for candidate {}",
        vote.id, vote.voter_id, vote.candidate_id
    );

    let location = uri!("/api", list_votes).to_string();
    Ok(Created::new(location).body(Json(vote.into())))
}

#[get("/votes")]
async fn list_votes(store: &State<DynStore>) -> Result<Json<Vec<VoteDescription>>> {
    let votes = store.votes().await?;
    Ok(Json(votes.into_iter().map(Into::into).collect()))
}

#[get("/votes/statistics")]
async fn compute_statistics(
    store: &State<DynStore>,
    config: &State<Config>,
) -> Result<Json<StatisticsReport>> {
    let candidates = store.candidates().await?;
    let voted_voters = store.voted_voter_count().await?;
    let statistics = Statistics::compute(&candidates, voted_voters);

    // Chart failures do not fail the request.
    let path = config.chart_path();
    let chart_generated = match chart::write_chart(&statistics, path).await {
        Ok(written) => written,
        Err(e) => {
            error!("Failed to write chart to {}: {e}", path.display());
            false
        }
    };

    Ok(Json(StatisticsReport {
        statistics,
        chart_generated,
        chart_path: config.chart_url().to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use rocket::{
        futures::future::join_all,
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::json,
    };

    use crate::error::ErrorBody;
    use crate::model::{
        api::{
            candidate::{CandidateDescription, CandidateSpec},
            voter::{VoterDescription, VoterSpec},
        },
        common::Identity,
        db::{NewCandidate, NewVoter},
        store::DynStore,
    };

    use super::*;

    async fn post_json<T: serde::Serialize>(client: &Client, path: &str, body: &T) -> Status {
        client
            .post(path)
            .header(ContentType::JSON)
            .body(json!(body).to_string())
            .dispatch()
            .await
            .status()
    }

    async fn cast(client: &Client, voter_id: u32, candidate_id: u32) -> (Status, String) {
        let spec = VoteSpec {
            voter_id: Some(voter_id),
            candidate_id: Some(candidate_id),
        };
        let response = client
            .post(uri!("/api", cast_vote))
            .header(ContentType::JSON)
            .body(json!(spec).to_string())
            .dispatch()
            .await;
        let status = response.status();
        (status, response.into_string().await.unwrap_or_default())
    }

    async fn report(client: &Client) -> StatisticsReport {
        let response = client.get(uri!("/api", compute_statistics)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        response.into_json().await.unwrap()
    }

    #[backend_test]
    async fn register_and_cast(client: Client) {
        assert_eq!(
            Status::Created,
            post_json(&client, "/api/voters", &VoterSpec::example()).await
        );
        assert_eq!(
            Status::Created,
            post_json(&client, "/api/candidates", &CandidateSpec::example()).await
        );

        let (status, raw) = cast(&client, 1, 1).await;
        assert_eq!(Status::Created, status);
        let receipt = rocket::serde::json::serde_json::from_str::<VoteReceipt>(&raw).unwrap();
        assert_eq!(receipt.message, "Vote recorded successfully");
        assert_eq!(receipt.vote.voter_id, 1);
        assert_eq!(receipt.vote.candidate_id, 1);

        let voter = client
            .get("/api/voters/1")
            .dispatch()
            .await
            .into_json::<VoterDescription>()
            .await
            .unwrap();
        assert!(voter.has_voted);
        let candidate = client
            .get("/api/candidates/1")
            .dispatch()
            .await
            .into_json::<CandidateDescription>()
            .await
            .unwrap();
        assert_eq!(candidate.votes, 1);

        let votes = client
            .get(uri!("/api", list_votes))
            .dispatch()
            .await
            .into_json::<Vec<VoteDescription>>()
            .await
            .unwrap();
        assert_eq!(votes, vec![receipt.vote]);
    }

    #[backend_test]
    async fn unknown_voter(client: Client, store: DynStore) {
        let candidate = store
            .insert_candidate(NewCandidate::example())
            .await
            .unwrap();

        let (status, raw) = cast(&client, 99, candidate.id).await;
        assert_eq!(Status::NotFound, status);
        assert!(raw.contains("Voter 99"));
        assert!(store.votes().await.unwrap().is_empty());
        assert_eq!(store.candidate(candidate.id).await.unwrap().unwrap().votes, 0);
    }

    #[backend_test]
    async fn unknown_candidate(client: Client, store: DynStore) {
        let voter = store.insert_voter(NewVoter::example()).await.unwrap();

        let (status, raw) = cast(&client, voter.id, 42).await;
        assert_eq!(Status::NotFound, status);
        assert!(raw.contains("Candidate 42"));
        assert!(!store.voter(voter.id).await.unwrap().unwrap().has_voted);
    }

    #[backend_test]
    async fn second_vote_rejected(client: Client, store: DynStore) {
        let voter = store.insert_voter(NewVoter::example()).await.unwrap();
        let bob = store
            .insert_candidate(NewCandidate::example())
            .await
            .unwrap();
        let dave = store
            .insert_candidate(NewCandidate::example2())
            .await
            .unwrap();

        let (status, _) = cast(&client, voter.id, bob.id).await;
        assert_eq!(Status::Created, status);

        // Rejected the same way every time, for any candidate.
        for candidate_id in [bob.id, dave.id, bob.id] {
            let (status, raw) = cast(&client, voter.id, candidate_id).await;
            assert_eq!(Status::Conflict, status);
            let body = rocket::serde::json::serde_json::from_str::<ErrorBody>(&raw).unwrap();
            assert_eq!(body.error, format!("Voter {} has already voted", voter.id));
        }

        assert_eq!(store.votes().await.unwrap().len(), 1);
        assert_eq!(store.candidate(bob.id).await.unwrap().unwrap().votes, 1);
        assert_eq!(store.candidate(dave.id).await.unwrap().unwrap().votes, 0);
    }

    #[backend_test]
    async fn concurrent_votes_counted_once(client: Client, store: DynStore) {
        let voter = store.insert_voter(NewVoter::example()).await.unwrap();
        let candidate = store
            .insert_candidate(NewCandidate::example())
            .await
            .unwrap();

        let attempts = (0..8).map(|_| cast(&client, voter.id, candidate.id));
        let statuses = join_all(attempts)
            .await
            .into_iter()
            .map(|(status, _)| status)
            .collect::<Vec<_>>();

        let created = statuses.iter().filter(|s| **s == Status::Created).count();
        let conflicts = statuses.iter().filter(|s| **s == Status::Conflict).count();
        assert_eq!(created, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(store.candidate(candidate.id).await.unwrap().unwrap().votes, 1);
        assert_eq!(store.dump().await.unwrap().verify(), Ok(()));
    }

    #[backend_test]
    async fn invalid_ballots(client: Client) {
        let response = client
            .post(uri!("/api", cast_vote))
            .header(ContentType::JSON)
            .body(json!({ "voter_id": 1 }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        let body = response.into_json::<ErrorBody>().await.unwrap();
        assert_eq!(body.error, "Bad request: voter_id and candidate_id are required");

        let response = client
            .post(uri!("/api", cast_vote))
            .header(ContentType::JSON)
            .body(json!({ "voter_id": "one", "candidate_id": 1 }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        let body = response.into_json::<ErrorBody>().await.unwrap();
        assert!(body.error.starts_with("Bad request: Invalid JSON"));

        let response = client
            .post(uri!("/api", cast_vote))
            .header(ContentType::JSON)
            .body("{\"voter_id\": 1,")
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        assert!(response.into_json::<ErrorBody>().await.is_some());
    }

    #[backend_test]
    async fn statistics_with_chart(client: Client, store: DynStore) {
        let empty = report(&client).await;
        assert_eq!(empty.statistics.total_votes, 0);
        assert!(empty.statistics.statistics.is_empty());
        assert!(!empty.chart_generated);

        let candidates = [
            NewCandidate::new(Identity::parse("A").unwrap(), None),
            NewCandidate::new(Identity::parse("B").unwrap(), None),
            NewCandidate::new(Identity::parse("C").unwrap(), None),
        ];
        let mut ids = Vec::new();
        for candidate in candidates {
            ids.push(store.insert_candidate(candidate).await.unwrap().id);
        }

        // No votes yet: every share is zero.
        let zero = report(&client).await;
        assert_eq!(zero.statistics.total_votes, 0);
        assert!(zero.statistics.statistics.iter().all(|s| s.percentage == 0.0));
        assert!(zero.chart_generated);

        for (i, candidate_id) in [ids[0], ids[0], ids[0], ids[1]].into_iter().enumerate() {
            let email = Identity::parse(&format!("voter{i}@x.com")).unwrap();
            let voter = store
                .insert_voter(NewVoter::new(format!("Voter {i}"), email))
                .await
                .unwrap();
            store
                .cast_vote(Ballot::new(voter.id, candidate_id))
                .await
                .unwrap();
        }
        // A registered voter who has not voted.
        store
            .insert_voter(NewVoter::example())
            .await
            .unwrap();

        let stats = report(&client).await;
        assert_eq!(stats.statistics.total_votes, 4);
        assert_eq!(stats.statistics.voted_voters, 4);
        let percentages = stats
            .statistics
            .statistics
            .iter()
            .map(|s| (s.candidate_name.as_str(), s.votes, s.percentage))
            .collect::<Vec<_>>();
        assert_eq!(percentages, vec![("A", 3, 75.0), ("B", 1, 25.0), ("C", 0, 0.0)]);
        assert!(stats.chart_generated);
        assert_eq!(stats.chart_path, "/static/votes_chart.svg");

        let config = client.rocket().state::<Config>().unwrap();
        let svg = std::fs::read_to_string(config.chart_path()).unwrap();
        assert_eq!(svg.matches("<rect").count(), 3);
    }
}
