//! Process wiring: picks the store and word backends and builds state.

pub mod state;
