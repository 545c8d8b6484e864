//! Word corpus: selection of the next secret word and win bookkeeping.

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod sea;

pub use memory::InMemoryWordService;
pub use sea::SeaWordService;

#[derive(Debug, Error)]
pub enum WordError {
    #[error("database: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("the word corpus is empty")]
    EmptyCorpus,
    #[error("reading word list '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait WordService: Send + Sync {
    /// Pick a word among the least played ones and count it as played.
    ///
    /// Words in `excluding` are skipped unless that would leave nothing to
    /// pick, in which case the exclusion is ignored.
    async fn next_word(&self, excluding: &HashSet<String>) -> Result<String, WordError>;

    /// Count a correct guess of `word`.
    async fn record_win(&self, word: &str) -> Result<(), WordError>;

    /// Backend probe for health checks.
    async fn ping(&self) -> Result<(), WordError>;

    /// Short backend label reported by `/health`.
    fn backend(&self) -> &'static str;
}

/// Lowercase and trim a newline-delimited word list, dropping blanks and
/// repeats while keeping first-seen order.
pub fn normalize_words(input: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    input
        .lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|word| !word.is_empty())
        .filter(|word| seen.insert(word.clone()))
        .collect()
}
