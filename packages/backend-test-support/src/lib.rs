//! Backend test support utilities
//!
//! Shared by the backend's unit and integration tests: one logging
//! initializer so every test binary installs the same subscriber.

pub mod logging;
