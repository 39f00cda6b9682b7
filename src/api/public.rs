use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{api::dump::TallyDump, store::DynStore};

pub fn routes() -> Vec<Route> {
    routes![health, info, dump]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
}

#[get("/health")]
fn health() -> Json<Health> {
    Json(Health {
        status: "OK".to_string(),
    })
}

/// One entry of the endpoint listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub method: String,
    pub path: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiInfo {
    pub name: String,
    pub version: String,
    pub endpoints: Vec<Endpoint>,
}

const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("POST", "/api/voters", "Register a voter"),
    ("GET", "/api/voters", "List voters"),
    ("GET", "/api/voters/<id>", "Get a voter"),
    ("DELETE", "/api/voters/<id>", "Delete a voter who has not voted"),
    ("POST", "/api/candidates", "Register a candidate"),
    ("GET", "/api/candidates", "List candidates with their tallies"),
    ("GET", "/api/candidates/<id>", "Get a candidate"),
    ("DELETE", "/api/candidates/<id>", "Delete a candidate"),
    ("POST", "/api/votes", "Cast a vote"),
    ("GET", "/api/votes", "List votes"),
    ("GET", "/api/votes/statistics", "Compute statistics and render the chart"),
    ("GET", "/api/dump", "Snapshot of every record, for verification"),
    ("GET", "/api/health", "Health check"),
];

#[get("/info")]
fn info() -> Json<ApiInfo> {
    let endpoints = ENDPOINTS
        .iter()
        .map(|(method, path, description)| Endpoint {
            method: method.to_string(),
            path: path.to_string(),
            description: description.to_string(),
        })
        .collect();
    Json(ApiInfo {
        name: "Voting Tracker API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints,
    })
}

/// Get a consistent snapshot of every record, which can be checked offline
/// with the verification tool.
#[get("/dump")]
async fn dump(store: &State<DynStore>) -> Result<Json<TallyDump>> {
    Ok(Json(store.dump().await?))
}
