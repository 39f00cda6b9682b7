use log::info;
use rocket::{
    response::status::Created,
    serde::json::{Error as JsonError, Json},
    Route, State,
};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        message::Message,
        voter::{VoterDescription, VoterSpec},
    },
    common::VoterId,
    db::NewVoter,
    store::DynStore,
};

pub fn routes() -> Vec<Route> {
    routes![register_voter, list_voters, get_voter, delete_voter]
}

#[post("/voters", data = "<spec>")]
async fn register_voter(
    spec: std::result::Result<Json<VoterSpec>, JsonError<'_>>,
    store: &State<DynStore>,
) -> Result<Created<Json<VoterDescription>>> {
    let voter = NewVoter::try_from(spec?.into_inner())?;
    let voter = store.insert_voter(voter).await?;
    info!("Registered voter {} <{}>", voter.id, voter.email);

    let location = uri!("/api", get_voter(voter.id)).to_string();
    Ok(Created::new(location).body(Json(voter.into())))
}

#[get("/voters")]
async fn list_voters(store: &State<DynStore>) -> Result<Json<Vec<VoterDescription>>> {
    let voters = store.voters().await?;
    Ok(Json(voters.into_iter().map(Into::into).collect()))
}

#[get("/voters/<voter_id>")]
async fn get_voter(voter_id: VoterId, store: &State<DynStore>) -> Result<Json<VoterDescription>> {
    let voter = store
        .voter(voter_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Voter {voter_id}")))?;
    Ok(Json(voter.into()))
}

#[delete("/voters/<voter_id>")]
async fn delete_voter(voter_id: VoterId, store: &State<DynStore>) -> Result<Json<Message>> {
    let voter = store.delete_voter(voter_id).await?;
    info!("Deleted voter {} <{}>", voter.id, voter.email);
    Ok(Json(Message::new("Voter deleted successfully")))
}
