//! Wire protocol: a flat JSON object with a mandatory `verb` and an open
//! set of verb-specific fields.
//!
//! Fields this server does not know about are kept in the envelope and
//! written back out unchanged, so newer clients can attach data that
//! older servers relay verbatim.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const PLAYER_NAME: &str = "player_name";
pub const TABLE: &str = "table";
pub const WORD: &str = "word";
pub const POINTS: &str = "points";
pub const END_TIME: &str = "end_time";
pub const GUESSER: &str = "guesser";
pub const SCORE: &str = "score";
pub const CORRECT: &str = "correct";
pub const DISCONNECTED: &str = "disconnected";

const VERB: &str = "verb";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    // client → server
    Connect,
    Join,
    Leave,
    Pass,
    Skip,
    Draw,
    Guess,
    // either direction
    Keepalive,
    // server → client
    Joined,
    Departed,
    Passed,
    Skipped,
    Drawn,
    Guessed,
    Won,
    Ended,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Connect => "CONNECT",
            Verb::Join => "JOIN",
            Verb::Leave => "LEAVE",
            Verb::Pass => "PASS",
            Verb::Skip => "SKIP",
            Verb::Draw => "DRAW",
            Verb::Guess => "GUESS",
            Verb::Keepalive => "KEEPALIVE",
            Verb::Joined => "JOINED",
            Verb::Departed => "DEPARTED",
            Verb::Passed => "PASSED",
            Verb::Skipped => "SKIPPED",
            Verb::Drawn => "DRAWN",
            Verb::Guessed => "GUESSED",
            Verb::Won => "WON",
            Verb::Ended => "ENDED",
        }
    }

    /// Whether a client may send this verb.
    pub fn is_client_command(&self) -> bool {
        matches!(
            self,
            Verb::Connect
                | Verb::Join
                | Verb::Leave
                | Verb::Pass
                | Verb::Skip
                | Verb::Draw
                | Verb::Guess
                | Verb::Keepalive
        )
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown verb '{0}'")]
pub struct UnknownVerb(pub String);

impl FromStr for Verb {
    type Err = UnknownVerb;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let verb = match raw.trim().to_ascii_uppercase().as_str() {
            "CONNECT" => Verb::Connect,
            "JOIN" => Verb::Join,
            "LEAVE" => Verb::Leave,
            "PASS" => Verb::Pass,
            "SKIP" => Verb::Skip,
            "DRAW" => Verb::Draw,
            "GUESS" => Verb::Guess,
            "KEEPALIVE" => Verb::Keepalive,
            "JOINED" => Verb::Joined,
            "DEPARTED" => Verb::Departed,
            "PASSED" => Verb::Passed,
            "SKIPPED" => Verb::Skipped,
            "DRAWN" => Verb::Drawn,
            "GUESSED" => Verb::Guessed,
            "WON" => Verb::Won,
            "ENDED" => Verb::Ended,
            _ => return Err(UnknownVerb(raw.to_string())),
        };
        Ok(verb)
    }
}

impl Serialize for Verb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Verb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("{verb} is missing required field '{field}'")]
    MissingField { verb: Verb, field: &'static str },
    #[error("{verb} field '{field}' has an invalid value")]
    InvalidField { verb: Verb, field: &'static str },
    #[error("{0} is not accepted from clients")]
    ServerOnly(Verb),
}

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub verb: Verb,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Envelope {
    pub fn new(verb: Verb) -> Self {
        Self {
            verb,
            fields: Map::new(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Builder-style field setter. The discriminator cannot be overwritten.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        if key != VERB {
            self.fields.insert(key.to_string(), value.into());
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(Value::as_bool)
    }

    pub fn i64_field(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(Value::as_i64)
    }

    pub fn player_name(&self) -> Option<&str> {
        self.str_field(PLAYER_NAME)
    }

    pub fn keepalive() -> Self {
        Self::new(Verb::Keepalive)
    }

    pub fn joined(player: &str) -> Self {
        Self::new(Verb::Joined).with(PLAYER_NAME, player)
    }

    pub fn departed(player: &str, disconnected: bool) -> Self {
        Self::new(Verb::Departed)
            .with(PLAYER_NAME, player)
            .with(DISCONNECTED, disconnected)
    }

    /// `end_time` is the round deadline in Unix epoch milliseconds.
    pub fn passed(artist: &str, end_time: i64) -> Self {
        Self::new(Verb::Passed)
            .with(PLAYER_NAME, artist)
            .with(END_TIME, end_time)
    }

    pub fn skipped(voter: &str) -> Self {
        Self::new(Verb::Skipped).with(PLAYER_NAME, voter)
    }

    pub fn drawn(points: Value) -> Self {
        Self::new(Verb::Drawn).with(POINTS, points)
    }

    pub fn guessed(player: &str, word: &str) -> Self {
        Self::new(Verb::Guessed)
            .with(PLAYER_NAME, player)
            .with(WORD, word)
    }

    pub fn won(player: &str) -> Self {
        Self::new(Verb::Won).with(PLAYER_NAME, player)
    }

    pub fn ended(artist: &str) -> Self {
        Self::new(Verb::Ended).with(PLAYER_NAME, artist)
    }
}

/// A decoded client command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Keepalive,
    Connect { player_name: String },
    Join { table: String },
    Leave,
    Pass,
    Skip,
    Draw { points: Value },
    Guess { word: String },
}

fn required_str(
    envelope: &Envelope,
    field: &'static str,
) -> Result<String, ProtocolError> {
    let value = envelope.field(field).ok_or(ProtocolError::MissingField {
        verb: envelope.verb,
        field,
    })?;
    let text = value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ProtocolError::InvalidField {
            verb: envelope.verb,
            field,
        })?;
    Ok(text.to_string())
}

impl TryFrom<Envelope> for Command {
    type Error = ProtocolError;

    fn try_from(mut envelope: Envelope) -> Result<Self, Self::Error> {
        let command = match envelope.verb {
            Verb::Keepalive => Command::Keepalive,
            Verb::Connect => Command::Connect {
                player_name: required_str(&envelope, PLAYER_NAME)?,
            },
            Verb::Join => Command::Join {
                table: required_str(&envelope, TABLE)?,
            },
            Verb::Leave => Command::Leave,
            Verb::Pass => Command::Pass,
            Verb::Skip => Command::Skip,
            Verb::Draw => Command::Draw {
                points: envelope.remove(POINTS).ok_or(ProtocolError::MissingField {
                    verb: Verb::Draw,
                    field: POINTS,
                })?,
            },
            Verb::Guess => Command::Guess {
                word: required_str(&envelope, WORD)?,
            },
            verb => return Err(ProtocolError::ServerOnly(verb)),
        };
        Ok(command)
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Command::try_from(Envelope::from_json(text)?)
    }
}
