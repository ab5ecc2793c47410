/// Completion leaderboards
///
/// Every task completion is counted into three counter documents at once:
/// one for the day, one for the ISO week, and one for the month of the
/// completion instant. The three writes are independent merge-upserts with
/// no transaction around them; when some succeed and some fail the counters
/// are left as they are (the completion itself has already committed) and
/// the caller gets a [`crate::error::Error::PartialAggregation`] naming the
/// periods on each side.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use chrono::Utc;
/// use taskrank::config::AppConfig;
/// use taskrank::leaderboard::{LeaderboardAggregator, LeaderboardReader};
/// use taskrank::periods::Granularity;
/// use taskrank::session::UserId;
/// use taskrank::store::MemoryStore;
///
/// # async fn example() -> taskrank::error::Result<()> {
/// let store = Arc::new(MemoryStore::new());
/// let config = AppConfig::default();
///
/// let aggregator = LeaderboardAggregator::new(store.clone(), &config);
/// let reader = LeaderboardReader::new(store, &config);
///
/// let now = Utc::now();
/// aggregator.record_completion(&UserId::from("alice"), now).await?;
///
/// let board = reader.get_leaderboard(Granularity::Day, now).await?;
/// assert_eq!(board[0].count, 1);
/// # Ok(())
/// # }
/// ```

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::models::leaderboard::{CounterDoc, LeaderboardEntry};
use crate::periods::{self, Granularity};
use crate::session::UserId;
use crate::store::{DocumentStore, MergePatch, StoreError};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Writes completion counters
pub struct LeaderboardAggregator {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl LeaderboardAggregator {
    /// Creates an aggregator writing to the configured counter collection
    pub fn new(store: Arc<dyn DocumentStore>, config: &AppConfig) -> Self {
        LeaderboardAggregator {
            store,
            collection: config.leaderboards_collection.clone(),
        }
    }

    /// Counts one completion by `user` at instant `at`
    ///
    /// Upserts the day, week and month counter for the period containing
    /// `at`, incrementing `counts.{user}` and stamping the document with
    /// the ISO date. All three counters are attempted even if an earlier
    /// one fails.
    ///
    /// # Errors
    ///
    /// [`Error::PartialAggregation`] when at least one counter write
    /// failed; the increments that did land are kept.
    pub async fn record_completion(&self, user: &UserId, at: DateTime<Utc>) -> Result<()> {
        let counts_field = format!("counts.{}", user);

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for granularity in Granularity::ALL {
            let doc_id = granularity.counter_doc_id(at);
            let patch = MergePatch::new()
                .increment(&counts_field, 1)
                .set("date", periods::iso_date(at));

            match self.store.upsert_merge(&self.collection, &doc_id, patch).await {
                Ok(()) => succeeded.push(granularity),
                Err(err) => {
                    tracing::warn!(
                        granularity = granularity.as_str(),
                        doc = %doc_id,
                        error = %err,
                        "leaderboard counter update failed"
                    );
                    failed.push(granularity);
                }
            }
        }

        if failed.is_empty() {
            tracing::debug!(user = %user, "completion counted");
            Ok(())
        } else {
            Err(Error::PartialAggregation { succeeded, failed })
        }
    }
}

/// Reads ranked completion counts
pub struct LeaderboardReader {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl LeaderboardReader {
    /// Creates a reader over the configured counter collection
    pub fn new(store: Arc<dyn DocumentStore>, config: &AppConfig) -> Self {
        LeaderboardReader {
            store,
            collection: config.leaderboards_collection.clone(),
        }
    }

    /// Returns the ranked board for the period containing `at`
    ///
    /// Entries are sorted by count descending, ties broken by user id so
    /// the order is stable. An empty board means no completions have
    /// landed in the period yet.
    pub async fn get_leaderboard(
        &self,
        granularity: Granularity,
        at: DateTime<Utc>,
    ) -> Result<Vec<LeaderboardEntry>> {
        let doc_id = granularity.counter_doc_id(at);
        let Some(doc) = self.store.get(&self.collection, &doc_id).await? else {
            return Ok(Vec::new());
        };

        let counter: CounterDoc =
            serde_json::from_value(doc.data).map_err(StoreError::from)?;

        let mut entries: Vec<LeaderboardEntry> = counter
            .counts
            .into_iter()
            .map(|(user, count)| LeaderboardEntry { user, count })
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.user.cmp(&b.user)));

        Ok(entries)
    }
}
