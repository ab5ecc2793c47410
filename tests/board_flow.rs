/// End-to-end flows over the in-memory store
///
/// Exercises the task lifecycle, the live feeds, and the leaderboard
/// counters together, the way a client session would drive them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::Value as JsonValue;
use taskrank::config::AppConfig;
use taskrank::error::Error;
use taskrank::leaderboard::LeaderboardReader;
use taskrank::models::task::{Priority, TaskDraft, TaskPatch};
use taskrank::periods::Granularity;
use taskrank::session::{Session, UserId};
use taskrank::store::{
    Document, DocumentStore, Filter, MemoryStore, MergePatch, OrderBy, StoreError, Subscription,
};
use taskrank::tasks::TaskRepository;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn repo_for(store: Arc<dyn DocumentStore>, user: &str) -> TaskRepository {
    TaskRepository::new(
        store,
        Session::begin(UserId::from(user)),
        &AppConfig::default(),
    )
}

fn draft(title: &str) -> TaskDraft {
    TaskDraft {
        title: title.to_string(),
        description: None,
        due_date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
        priority: Priority::Mid,
    }
}

#[tokio::test]
async fn create_update_read_round_trip() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let repo = repo_for(store, "alice");

    let created = repo.create_task(draft("write report")).await.unwrap();
    assert!(created.updated_at.is_none());

    let new_due = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
    let patch = TaskPatch {
        due_date: Some(new_due),
        ..TaskPatch::default()
    };
    let updated = repo.update_task(&created.id, patch).await.unwrap();
    assert_eq!(updated.due_date, new_due);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at.unwrap() >= created.created_at);

    // Read back through the live query, not the local copy
    let mut pending = repo.subscribe_pending().await.unwrap();
    let snapshot = pending.next_snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].due_date, new_due);
    assert_eq!(snapshot[0].created_at, created.created_at);
}

#[tokio::test]
async fn completion_feeds_the_day_leaderboard() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let repo = repo_for(store.clone(), "alice");
    let reader = LeaderboardReader::new(store, &AppConfig::default());

    let now = Utc::now();
    assert!(reader
        .get_leaderboard(Granularity::Day, now)
        .await
        .unwrap()
        .is_empty());

    let task = repo.create_task(draft("ship release")).await.unwrap();
    repo.complete_task(&task.id).await.unwrap();

    let board = reader.get_leaderboard(Granularity::Day, now).await.unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].user, UserId::from("alice"));
    assert_eq!(board[0].count, 1);
}

#[tokio::test]
async fn double_completion_fails_and_counts_once() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let repo = repo_for(store.clone(), "alice");
    let reader = LeaderboardReader::new(store, &AppConfig::default());

    let task = repo.create_task(draft("ship release")).await.unwrap();
    repo.complete_task(&task.id).await.unwrap();

    let err = repo.complete_task(&task.id).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyCompleted(_)));

    let board = reader
        .get_leaderboard(Granularity::Day, Utc::now())
        .await
        .unwrap();
    assert_eq!(board[0].count, 1);
}

#[tokio::test]
async fn two_completions_in_one_period_count_two() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let repo = repo_for(store.clone(), "alice");
    let reader = LeaderboardReader::new(store, &AppConfig::default());

    for title in ["first", "second"] {
        let task = repo.create_task(draft(title)).await.unwrap();
        repo.complete_task(&task.id).await.unwrap();
    }

    for granularity in Granularity::ALL {
        let board = reader
            .get_leaderboard(granularity, Utc::now())
            .await
            .unwrap();
        assert_eq!(board[0].count, 2, "count under {}", granularity);
    }
}

#[tokio::test]
async fn delete_is_idempotent() {
    init_tracing();
    let repo = repo_for(Arc::new(MemoryStore::new()), "alice");

    let task = repo.create_task(draft("throwaway")).await.unwrap();
    repo.delete_task(&task.id).await.unwrap();
    repo.delete_task(&task.id).await.unwrap();
    repo.delete_task("never-existed").await.unwrap();
}

#[tokio::test]
async fn completed_feed_is_newest_first() {
    init_tracing();
    let repo = repo_for(Arc::new(MemoryStore::new()), "alice");

    let first = repo.create_task(draft("first")).await.unwrap();
    let second = repo.create_task(draft("second")).await.unwrap();
    repo.complete_task(&first.id).await.unwrap();
    // Later completion must sort first
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    repo.complete_task(&second.id).await.unwrap();

    let mut completed = repo.subscribe_completed().await.unwrap();
    let snapshot = completed.next_snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].id, second.id);
    assert_eq!(snapshot[1].id, first.id);
}

#[tokio::test]
async fn feeds_track_mutations_and_stop_on_cancel() {
    init_tracing();
    let repo = repo_for(Arc::new(MemoryStore::new()), "alice");

    let mut pending = repo.subscribe_pending().await.unwrap();
    assert!(pending.next_snapshot().await.unwrap().is_empty());

    let task = repo.create_task(draft("watch me")).await.unwrap();
    assert_eq!(pending.next_snapshot().await.unwrap().len(), 1);

    repo.complete_task(&task.id).await.unwrap();
    assert!(pending.next_snapshot().await.unwrap().is_empty());

    pending.cancel();
    repo.create_task(draft("unseen")).await.unwrap();
    assert!(pending.next_snapshot().await.is_none());
}

#[tokio::test]
async fn feeds_are_scoped_to_the_owner() {
    init_tracing();
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let alice = repo_for(store.clone(), "alice");
    let bob = repo_for(store, "bob");

    alice.create_task(draft("alice's task")).await.unwrap();
    bob.create_task(draft("bob's task")).await.unwrap();

    let mut feed = alice.subscribe_pending().await.unwrap();
    let snapshot = feed.next_snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].owner, UserId::from("alice"));
}

/// Store wrapper that refuses counter writes for chosen document ids
///
/// Used to observe the no-rollback policy when one of the three period
/// counters cannot be written.
struct FailingCounters {
    inner: MemoryStore,
    reject_prefix: String,
}

#[async_trait]
impl DocumentStore for FailingCounters {
    async fn create(&self, collection: &str, data: JsonValue) -> Result<String, StoreError> {
        self.inner.create(collection, data).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: JsonValue,
    ) -> Result<(), StoreError> {
        self.inner.update(collection, id, fields).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.inner.delete(collection, id).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.inner.get(collection, id).await
    }

    async fn subscribe(
        &self,
        collection: &str,
        filter: Filter,
        order: Option<OrderBy>,
    ) -> Result<Subscription, StoreError> {
        self.inner.subscribe(collection, filter, order).await
    }

    async fn upsert_merge(
        &self,
        collection: &str,
        id: &str,
        patch: MergePatch,
    ) -> Result<(), StoreError> {
        if id.starts_with(&self.reject_prefix) {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        self.inner.upsert_merge(collection, id, patch).await
    }
}

#[tokio::test]
async fn partial_counter_failure_keeps_the_completion() {
    init_tracing();
    let store = Arc::new(FailingCounters {
        inner: MemoryStore::new(),
        reject_prefix: "leaderboard-week-".to_string(),
    });
    let repo = repo_for(store.clone(), "alice");
    let reader = LeaderboardReader::new(store, &AppConfig::default());

    let task = repo.create_task(draft("ship release")).await.unwrap();
    let err = repo.complete_task(&task.id).await.unwrap_err();

    match err {
        Error::PartialAggregation { succeeded, failed } => {
            assert_eq!(succeeded, vec![Granularity::Day, Granularity::Month]);
            assert_eq!(failed, vec![Granularity::Week]);
        }
        other => panic!("expected PartialAggregation, got {other}"),
    }

    // The completion itself committed: a retry is rejected as a double
    // completion, and the day counter kept its increment
    let err = repo.complete_task(&task.id).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyCompleted(_)));

    let now = Utc::now();
    let day = reader.get_leaderboard(Granularity::Day, now).await.unwrap();
    assert_eq!(day[0].count, 1);
    let week = reader.get_leaderboard(Granularity::Week, now).await.unwrap();
    assert!(week.is_empty());
}
