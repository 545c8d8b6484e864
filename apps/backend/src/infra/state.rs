use std::sync::Arc;

use db_infra::bootstrap_db;
use db_infra::db::DbSettings;
use tracing::info;

use crate::config::{Config, WordSource};
use crate::error::AppError;
use crate::game::{Directory, GameRules};
use crate::state::app_state::AppState;
use crate::store::{CoordinationStore, MemoryStore, RedisStore};
use crate::words::{InMemoryWordService, SeaWordService, WordService};

/// Builder for [`AppState`], used by `main` and by tests.
pub struct StateBuilder {
    store: Option<(Arc<dyn CoordinationStore>, &'static str)>,
    words: Option<Arc<dyn WordService>>,
    rules: GameRules,
}

impl StateBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            words: None,
            rules: GameRules::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn CoordinationStore>, backend: &'static str) -> Self {
        self.store = Some((store, backend));
        self
    }

    pub fn with_words(mut self, words: Arc<dyn WordService>) -> Self {
        self.words = Some(words);
        self
    }

    pub fn with_rules(mut self, rules: GameRules) -> Self {
        self.rules = rules;
        self
    }

    /// Connect the backends named by `config`.
    pub async fn from_config(config: &Config) -> Result<Self, AppError> {
        let builder = Self::new().with_rules(config.rules.clone());

        let builder = match &config.redis_url {
            Some(url) => {
                let store = RedisStore::connect(url).await?;
                builder.with_store(Arc::new(store), "redis")
            }
            None => {
                info!("REDIS_URL not set, using the in-process store");
                builder.with_store(Arc::new(MemoryStore::new()), "memory")
            }
        };

        let words: Arc<dyn WordService> = match &config.words {
            WordSource::Database(url) => {
                let settings = DbSettings::from_url(url.clone())?;
                let db = bootstrap_db(&settings).await?;
                Arc::new(SeaWordService::new(db))
            }
            WordSource::File(path) => Arc::new(InMemoryWordService::from_file(path)?),
        };

        Ok(builder.with_words(words))
    }

    pub fn build(self) -> Result<AppState, AppError> {
        let (store, backend) = self
            .store
            .unwrap_or_else(|| {
                let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
                (store, "memory")
            });
        let words = self
            .words
            .ok_or_else(|| AppError::config("no word service configured"))?;
        Ok(AppState::new(Directory::new(store, words, self.rules), backend))
    }
}

impl Default for StateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn build_state() -> StateBuilder {
    StateBuilder::new()
}
