//! Process configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::game::GameRules;

/// Where the word corpus comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordSource {
    Database(String),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Unset means an in-process store, usable by a single process only.
    pub redis_url: Option<String>,
    pub words: WordSource,
    pub rules: GameRules,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("SKETCH_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&var, "SKETCH_PORT", 5000u16)?;

        let words = match (var("DATABASE_URL"), var("WORDS_FILE")) {
            (Some(url), _) => WordSource::Database(url),
            (None, Some(path)) => WordSource::File(PathBuf::from(path)),
            (None, None) => {
                return Err(AppError::config(
                    "either DATABASE_URL or WORDS_FILE must be set",
                ))
            }
        };

        let defaults = GameRules::default();
        let rules = GameRules {
            turn_duration: Duration::from_secs(positive(&var, "TURN_SECONDS", 120)?),
            keepalive_interval: Duration::from_secs(positive(&var, "KEEPALIVE_SECONDS", 30)?),
            client_timeout: Duration::from_secs(positive(&var, "CLIENT_TIMEOUT_SECONDS", 90)?),
            win_score: positive(&var, "WIN_SCORE", 10)? as i64,
            timer_poll_interval: Duration::from_millis(positive(&var, "TIMER_POLL_MS", 1000)?),
            ..defaults
        };

        Ok(Self {
            host,
            port,
            redis_url: var("REDIS_URL"),
            words,
            rules,
        })
    }
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError> {
    match var(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number, got '{raw}'"))),
    }
}

fn positive(var: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64, AppError> {
    let value = parse_or(var, key, default)?;
    if value == 0 {
        return Err(AppError::config(format!("{key} must be greater than zero")));
    }
    Ok(value)
}
