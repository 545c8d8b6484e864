//! SeaORM-backed word service.

use std::collections::HashSet;

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use tracing::{debug, info, warn};

use super::{WordError, WordService};
use crate::entities::words;

/// Number of least-played rows fetched per selection; the pick is random
/// among those tied for the lowest play count.
const CANDIDATE_POOL: u64 = 32;

/// Rows per INSERT during bulk import.
pub const IMPORT_BATCH_SIZE: usize = 1000;

pub struct SeaWordService {
    db: DatabaseConnection,
}

impl SeaWordService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn least_played(&self, excluding: &HashSet<String>) -> Result<Vec<words::Model>, WordError> {
        let mut query = words::Entity::find()
            .order_by_asc(words::Column::Plays)
            .order_by_asc(words::Column::Id)
            .limit(CANDIDATE_POOL);
        if !excluding.is_empty() {
            query = query.filter(words::Column::Text.is_not_in(excluding.iter().cloned()));
        }
        Ok(query.all(&self.db).await?)
    }
}

#[async_trait]
impl WordService for SeaWordService {
    async fn next_word(&self, excluding: &HashSet<String>) -> Result<String, WordError> {
        let mut pool = self.least_played(excluding).await?;
        if pool.is_empty() && !excluding.is_empty() {
            debug!("Exclusion covers the whole corpus, ignoring it");
            pool = self.least_played(&HashSet::new()).await?;
        }

        let Some(min_plays) = pool.first().map(|w| w.plays) else {
            return Err(WordError::EmptyCorpus);
        };
        let tied: Vec<&words::Model> = pool.iter().filter(|w| w.plays == min_plays).collect();
        let picked = tied
            .choose(&mut rand::rng())
            .copied()
            .ok_or(WordError::EmptyCorpus)?;

        words::Entity::update_many()
            .col_expr(words::Column::Plays, Expr::col(words::Column::Plays).add(1))
            .filter(words::Column::Id.eq(picked.id))
            .exec(&self.db)
            .await?;

        Ok(picked.text.clone())
    }

    async fn record_win(&self, word: &str) -> Result<(), WordError> {
        let result = words::Entity::update_many()
            .col_expr(words::Column::Wins, Expr::col(words::Column::Wins).add(1))
            .filter(words::Column::Text.eq(word))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            warn!(word, "Win recorded for a word missing from the corpus");
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), WordError> {
        Ok(self.db.ping().await?)
    }

    fn backend(&self) -> &'static str {
        "database"
    }
}

/// Insert normalized words with zero counts, skipping ones already present.
///
/// Runs in a single transaction, [`IMPORT_BATCH_SIZE`] rows per statement.
/// Returns the number of rows actually inserted.
pub async fn import_words(db: &DatabaseConnection, words: &[String]) -> Result<u64, WordError> {
    let txn = db.begin().await?;
    let mut inserted = 0u64;

    for (batch_no, batch) in words.chunks(IMPORT_BATCH_SIZE).enumerate() {
        let rows = batch.iter().map(|text| words::ActiveModel {
            text: Set(text.clone()),
            plays: Set(0),
            wins: Set(0),
            ..Default::default()
        });
        let affected = words::Entity::insert_many(rows)
            .on_conflict(
                OnConflict::column(words::Column::Text)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;
        debug!(batch = batch_no, rows = batch.len(), affected, "Inserted word batch");
        inserted += affected;
    }

    txn.commit().await?;
    info!(inserted, total = words.len(), "Word import committed");
    Ok(inserted)
}
