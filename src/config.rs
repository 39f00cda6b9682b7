use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    mongodb::MongoStore,
    store::{CandidateDeletion, DynStore, MemoryStore},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_chart_path")]
    chart_path: PathBuf,
    #[serde(default = "default_chart_url")]
    chart_url: String,
    #[serde(default = "default_allow_voted_candidate_deletion")]
    allow_voted_candidate_deletion: bool,
}

fn default_chart_path() -> PathBuf {
    PathBuf::from("static/votes_chart.svg")
}

fn default_chart_url() -> String {
    "/static/votes_chart.svg".to_string()
}

fn default_allow_voted_candidate_deletion() -> bool {
    true
}

impl Config {
    /// Where on disk the statistics chart is written.
    pub fn chart_path(&self) -> &Path {
        &self.chart_path
    }

    /// The public path of the chart, as reported to clients.
    pub fn chart_url(&self) -> &str {
        &self.chart_url
    }

    /// How to treat the deletion of candidates who have received votes.
    pub fn candidate_deletion(&self) -> CandidateDeletion {
        if self.allow_voted_candidate_deletion {
            CandidateDeletion::Permissive
        } else {
            CandidateDeletion::Guarded
        }
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with [`StoreFairing`] and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if !config.allow_voted_candidate_deletion {
            info!("Candidates who have received votes cannot be deleted");
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Which store backs the server.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Mongodb,
    Memory,
}

/// Configuration for the store.
#[derive(Debug, Deserialize)]
struct StoreConfig {
    storage: StorageKind,
    // secrets
    db_uri: Option<String>,
    #[serde(default = "default_db_name")]
    db_name: String,
}

fn default_db_name() -> String {
    "tally".to_string()
}

/// A fairing that loads the store config, connects to the database if
/// needed, performs any setup necessary, and places a [`DynStore`] into
/// managed state.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<StoreConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load store config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let store: DynStore = match config.storage {
            StorageKind::Memory => {
                warn!("Using in-memory storage, records will be lost on shutdown");
                Arc::new(MemoryStore::default())
            }
            StorageKind::Mongodb => {
                let Some(db_uri) = config.db_uri else {
                    error!("`db_uri` must be set when using MongoDB storage");
                    return Err(rocket);
                };
                info!("Loaded database config, connecting...");
                // Connect and ensure indexes and counters exist.
                match MongoStore::connect(&db_uri, &config.db_name).await {
                    Ok(store) => Arc::new(store),
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                }
            }
        };
        info!("...store online!");

        // Manage the state.
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}
