//! Real-time multiplayer drawing and guessing game server.
//!
//! Rooms are coordinated through a shared store (Redis in production), so
//! any number of server processes can host players of the same room.

pub mod config;
pub mod entities;
pub mod error;
pub mod game;
pub mod infra;
pub mod routes;
pub mod state;
pub mod store;
pub mod words;
pub mod ws;

pub use config::Config;
pub use error::AppError;
pub use game::{Directory, GameRules};
pub use infra::state::{build_state, StateBuilder};
pub use state::app_state::AppState;

#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    backend_test_support::logging::init();
}
