/// Task repository
///
/// CRUD and completion over the task collection, scoped to the signed-in
/// owner. Every operation is a single request to the backing store; there
/// is no local cache and no retry. Completing a task is what feeds the
/// leaderboards: the repository owns a [`LeaderboardAggregator`] and
/// increments the caller's counters as part of [`TaskRepository::complete_task`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use chrono::NaiveDate;
/// use taskrank::config::AppConfig;
/// use taskrank::models::task::{Priority, TaskDraft};
/// use taskrank::session::{Session, UserId};
/// use taskrank::store::MemoryStore;
/// use taskrank::tasks::TaskRepository;
///
/// # async fn example() -> taskrank::error::Result<()> {
/// let store = Arc::new(MemoryStore::new());
/// let session = Session::begin(UserId::from("alice"));
/// let repo = TaskRepository::new(store, session, &AppConfig::default());
///
/// let task = repo
///     .create_task(TaskDraft {
///         title: "water plants".to_string(),
///         description: None,
///         due_date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
///         priority: Priority::Low,
///     })
///     .await?;
///
/// let completed = repo.complete_task(&task.id).await?;
/// assert!(completed.completed);
/// # Ok(())
/// # }
/// ```

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::leaderboard::LeaderboardAggregator;
use crate::models::task::{Task, TaskDraft, TaskPatch};
use crate::session::Session;
use crate::store::{Document, DocumentStore, Filter, OrderBy, StoreError, Subscription};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use validator::Validate;

/// Task CRUD scoped to one owner
pub struct TaskRepository {
    store: Arc<dyn DocumentStore>,
    session: Session,
    collection: String,
    aggregator: LeaderboardAggregator,
}

impl TaskRepository {
    /// Creates a repository for the signed-in session
    pub fn new(store: Arc<dyn DocumentStore>, session: Session, config: &AppConfig) -> Self {
        let aggregator = LeaderboardAggregator::new(Arc::clone(&store), config);
        TaskRepository {
            store,
            session,
            collection: config.tasks_collection.clone(),
            aggregator,
        }
    }

    /// Creates a pending task owned by the session user
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when the draft violates the boundary rules
    /// (empty title, oversized description).
    pub async fn create_task(&self, draft: TaskDraft) -> Result<Task> {
        draft.validate()?;

        let mut task = Task {
            id: String::new(),
            owner: self.session.user().clone(),
            title: draft.title,
            description: draft.description,
            due_date: draft.due_date,
            priority: draft.priority,
            completed: false,
            created_at: Utc::now(),
            updated_at: None,
            completed_at: None,
        };
        task.id = self.store.create(&self.collection, task.to_value()?).await?;

        tracing::debug!(task = %task.id, owner = %task.owner, "task created");
        Ok(task)
    }

    /// Applies a partial update to a pending task
    ///
    /// Stamps `updatedAt`. The creation timestamp and the owner are never
    /// touched.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown id, [`Error::Forbidden`] when the
    /// session user is not the owner, [`Error::AlreadyCompleted`] when the
    /// task has been completed (completed tasks are read-only).
    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        patch.validate()?;

        let mut task = self.fetch_owned(id).await?;
        if task.completed {
            return Err(Error::AlreadyCompleted(id.to_string()));
        }

        let now = Utc::now();
        let mut fields = Map::new();
        if let Some(title) = patch.title {
            fields.insert("title".to_string(), JsonValue::String(title.clone()));
            task.title = title;
        }
        if let Some(description) = patch.description {
            fields.insert(
                "description".to_string(),
                JsonValue::String(description.clone()),
            );
            task.description = Some(description);
        }
        if let Some(due_date) = patch.due_date {
            fields.insert("dueDate".to_string(), encode(&due_date)?);
            task.due_date = due_date;
        }
        if let Some(priority) = patch.priority {
            fields.insert("priority".to_string(), encode(&priority)?);
            task.priority = priority;
        }
        fields.insert("updatedAt".to_string(), encode(&now)?);
        task.updated_at = Some(now);

        self.apply_update(id, fields).await?;

        tracing::debug!(task = %id, "task updated");
        Ok(task)
    }

    /// Deletes a task
    ///
    /// Deleting an id that no longer exists is a no-op success, so repeated
    /// deletes (a swipe delivered twice) stay quiet.
    pub async fn delete_task(&self, id: &str) -> Result<()> {
        let Some(doc) = self.store.get(&self.collection, id).await? else {
            return Ok(());
        };

        let task = Task::from_document(doc)?;
        if task.owner != *self.session.user() {
            return Err(Error::Forbidden(id.to_string()));
        }

        self.store.delete(&self.collection, id).await?;
        tracing::debug!(task = %id, "task deleted");
        Ok(())
    }

    /// Completes a task and counts it on the leaderboards
    ///
    /// Sets `completed` and stamps `completedAt` exactly once, then
    /// increments the owner's day/week/month counters for the completion
    /// instant.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyCompleted`] on a second completion, which is what
    /// keeps the counters from double counting. A
    /// [`Error::PartialAggregation`] means the completion itself committed
    /// but one or more counters did not take the increment.
    pub async fn complete_task(&self, id: &str) -> Result<Task> {
        let mut task = self.fetch_owned(id).await?;
        if task.completed {
            return Err(Error::AlreadyCompleted(id.to_string()));
        }

        let now = Utc::now();
        let mut fields = Map::new();
        fields.insert("completed".to_string(), JsonValue::Bool(true));
        fields.insert("completedAt".to_string(), encode(&now)?);
        self.apply_update(id, fields).await?;

        task.completed = true;
        task.completed_at = Some(now);
        tracing::debug!(task = %id, owner = %task.owner, "task completed");

        self.aggregator.record_completion(&task.owner, now).await?;
        Ok(task)
    }

    /// Opens a live feed of the owner's pending tasks
    ///
    /// Snapshot order within the feed is store-defined but stable.
    pub async fn subscribe_pending(&self) -> Result<TaskFeed> {
        let filter = Filter::new()
            .field_eq("uid", self.session.user().as_str())
            .field_eq("completed", false);
        let sub = self.store.subscribe(&self.collection, filter, None).await?;
        Ok(TaskFeed::new(sub))
    }

    /// Opens a live feed of the owner's completed tasks, newest first
    pub async fn subscribe_completed(&self) -> Result<TaskFeed> {
        let filter = Filter::new()
            .field_eq("uid", self.session.user().as_str())
            .field_eq("completed", true);
        let order = OrderBy::desc("completedAt");
        let sub = self
            .store
            .subscribe(&self.collection, filter, Some(order))
            .await?;
        Ok(TaskFeed::new(sub))
    }

    /// Fetches a task, enforcing existence and ownership
    async fn fetch_owned(&self, id: &str) -> Result<Task> {
        let doc = self
            .store
            .get(&self.collection, id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let task = Task::from_document(doc)?;
        if task.owner != *self.session.user() {
            return Err(Error::Forbidden(id.to_string()));
        }
        Ok(task)
    }

    /// Writes a field update, mapping a store miss to [`Error::NotFound`]
    ///
    /// The task was fetched just before, so a miss here means it was
    /// deleted in between.
    async fn apply_update(&self, id: &str, fields: Map<String, JsonValue>) -> Result<()> {
        self.store
            .update(&self.collection, id, JsonValue::Object(fields))
            .await
            .map_err(|err| match err {
                StoreError::NotFound { id, .. } => Error::NotFound(id),
                other => Error::Store(other),
            })
    }
}

fn encode<T: Serialize>(value: &T) -> Result<JsonValue> {
    Ok(serde_json::to_value(value).map_err(StoreError::from)?)
}

/// A live feed of task-list snapshots
///
/// Wraps a store [`Subscription`]; yields the full decoded task list on
/// every change. Cancel (or drop) to stop delivery — nothing is yielded
/// afterwards. Documents that fail to decode are skipped with a warning
/// rather than poisoning the feed.
pub struct TaskFeed {
    sub: Subscription,
}

impl TaskFeed {
    fn new(sub: Subscription) -> Self {
        TaskFeed { sub }
    }

    /// Waits for the next task-list snapshot
    pub async fn next_snapshot(&mut self) -> Option<Vec<Task>> {
        self.sub.next_snapshot().await.map(decode_snapshot)
    }

    /// Stops delivery
    pub fn cancel(&self) {
        self.sub.cancel();
    }
}

impl futures::Stream for TaskFeed {
    type Item = Vec<Task>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.sub)
            .poll_next(cx)
            .map(|snapshot| snapshot.map(decode_snapshot))
    }
}

fn decode_snapshot(docs: Vec<Document>) -> Vec<Task> {
    docs.into_iter()
        .filter_map(|doc| match Task::from_document(doc) {
            Ok(task) => Some(task),
            Err(err) => {
                tracing::warn!(error = %err, "skipping undecodable task document");
                None
            }
        })
        .collect()
}
