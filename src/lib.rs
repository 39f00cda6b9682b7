#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{figment::Figment, Build, Rocket};

use crate::config::{ConfigFairing, StoreFairing};
use crate::logging::LoggerFairing;
use crate::model::store::DynStore;

pub mod api;
pub mod chart;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

pub use config::Config;

/// Build the server, with the store chosen by configuration.
pub fn build() -> Rocket<Build> {
    mount(rocket::build()).attach(StoreFairing)
}

/// Build the server over an existing store, ignoring any store configuration.
pub fn rocket_for_store(figment: Figment, store: DynStore) -> Rocket<Build> {
    mount(rocket::custom(figment)).manage(store)
}

fn mount(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/api", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
}
