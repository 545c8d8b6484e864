//! Room coordination: sessions, turn order, scoring and the round timer.

pub mod directory;
pub mod keys;
pub mod member;
pub mod room;
pub mod rules;

pub use directory::Directory;
pub use keys::RoomKeys;
pub use member::{Member, Outbound};
pub use room::{guess_matches, RoomSession};
pub use rules::{skip_majority, GameRules};
