pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod poller;
pub mod rank;
pub mod remote;
pub mod source;
pub mod standings;
