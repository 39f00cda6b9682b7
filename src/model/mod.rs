pub mod api;
pub mod ballot;
pub mod common;
pub mod db;
pub mod mongodb;
pub mod statistics;
pub mod store;
