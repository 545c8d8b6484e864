//! Shared database configuration and migration infrastructure.
//! Used by the backend word service and the word-import CLI.

pub mod config;
pub mod error;
pub mod infra;

pub use config::db;
pub use error::DbInfraError;
pub use infra::db::core::{bootstrap_db, connect_db, orchestrate_migration};
