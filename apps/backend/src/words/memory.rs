use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{normalize_words, WordError, WordService};

struct Entry {
    text: String,
    plays: u32,
    wins: u32,
}

/// Word service over a fixed in-process list.
///
/// Selection is deterministic: the least played word wins and ties go to
/// the earliest entry in the list.
pub struct InMemoryWordService {
    entries: Mutex<Vec<Entry>>,
}

impl InMemoryWordService {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = words
            .into_iter()
            .map(|text| Entry {
                text: text.into(),
                plays: 0,
                wins: 0,
            })
            .collect();
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, WordError> {
        let raw = std::fs::read_to_string(path).map_err(|source| WordError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(normalize_words(&raw)))
    }

    pub fn plays(&self, word: &str) -> Option<u32> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.text == word)
            .map(|e| e.plays)
    }

    pub fn wins(&self, word: &str) -> Option<u32> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.text == word)
            .map(|e| e.wins)
    }
}

fn least_played<'a>(
    entries: &'a mut [Entry],
    excluding: &HashSet<String>,
) -> Option<&'a mut Entry> {
    // min_by_key keeps the first of equal keys
    entries
        .iter_mut()
        .filter(|e| !excluding.contains(&e.text))
        .min_by_key(|e| e.plays)
}

#[async_trait]
impl WordService for InMemoryWordService {
    async fn next_word(&self, excluding: &HashSet<String>) -> Result<String, WordError> {
        let mut entries = self.entries.lock();
        if entries.is_empty() {
            return Err(WordError::EmptyCorpus);
        }
        let no_exclusion = HashSet::new();
        let filter = if entries.iter().all(|e| excluding.contains(&e.text)) {
            &no_exclusion
        } else {
            excluding
        };
        let entry = least_played(&mut entries, filter).ok_or(WordError::EmptyCorpus)?;
        entry.plays += 1;
        Ok(entry.text.clone())
    }

    async fn record_win(&self, word: &str) -> Result<(), WordError> {
        if let Some(entry) = self.entries.lock().iter_mut().find(|e| e.text == word) {
            entry.wins += 1;
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), WordError> {
        if self.entries.lock().is_empty() {
            return Err(WordError::EmptyCorpus);
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
