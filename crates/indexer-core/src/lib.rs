//! Keeps a remote archive in sync with a relational catalog via a durable
//! Postgres-backed event queue and a worker loop that drains it.

pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod queue;
pub mod worker;

pub use error::{IndexerError, IndexerResult};
