use log::info;
use rocket::{
    response::status::Created,
    serde::json::{Error as JsonError, Json},
    Route, State,
};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        candidate::{CandidateDescription, CandidateSpec},
        message::Message,
    },
    common::CandidateId,
    db::NewCandidate,
    store::DynStore,
};
use crate::Config;

pub fn routes() -> Vec<Route> {
    routes![
        register_candidate,
        list_candidates,
        get_candidate,
        delete_candidate
    ]
}

#[post("/candidates", data = "<spec>")]
async fn register_candidate(
    spec: std::result::Result<Json<CandidateSpec>, JsonError<'_>>,
    store: &State<DynStore>,
) -> Result<Created<Json<CandidateDescription>>> {
    let candidate = NewCandidate::try_from(spec?.into_inner())?;
    let candidate = store.insert_candidate(candidate).await?;
    info!("Registered candidate {} '{}'", candidate.id, candidate.name);

    let location = uri!("/api", get_candidate(candidate.id)).to_string();
    Ok(Created::new(location).body(Json(candidate.into())))
}

#[get("/candidates")]
async fn list_candidates(store: &State<DynStore>) -> Result<Json<Vec<CandidateDescription>>> {
    let candidates = store.candidates().await?;
    Ok(Json(candidates.into_iter().map(Into::into).collect()))
}

#[get("/candidates/<candidate_id>")]
async fn get_candidate(
    candidate_id: CandidateId,
    store: &State<DynStore>,
) -> Result<Json<CandidateDescription>> {
    let candidate = store
        .candidate(candidate_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate {candidate_id}")))?;
    Ok(Json(candidate.into()))
}

#[delete("/candidates/<candidate_id>")]
async fn delete_candidate(
    candidate_id: CandidateId,
    store: &State<DynStore>,
    config: &State<Config>,
) -> Result<Json<Message>> {
    let candidate = store
        .delete_candidate(candidate_id, config.candidate_deletion())
        .await?;
    info!("Deleted candidate {} '{}'", candidate.id, candidate.name);
    Ok(Json(Message::new("Candidate deleted successfully")))
}
