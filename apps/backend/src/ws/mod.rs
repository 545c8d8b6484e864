pub mod connection;
pub mod protocol;

pub use connection::{upgrade, PlayerConnection};
