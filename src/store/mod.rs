/// Document store boundary
///
/// This module defines the seam between the crate's logic and the managed
/// document database it delegates persistence to. The [`DocumentStore`]
/// trait mirrors the primitives the backing service offers: create, update,
/// idempotent delete, point reads, live filtered queries, and merge-upsert
/// with atomic field increments.
///
/// Each trait call is a single request to the store; the store is expected
/// to apply a whole [`MergePatch`] atomically, which is what lets counter
/// increments race across callers without losing updates.
///
/// # Example
///
/// ```
/// use taskrank::store::{DocumentStore, Filter, MemoryStore};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), taskrank::store::StoreError> {
/// let store = MemoryStore::new();
/// let id = store.create("tasks", json!({"title": "water plants"})).await?;
///
/// let doc = store.get("tasks", &id).await?.unwrap();
/// assert_eq!(doc.data["title"], "water plants");
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

pub mod memory;

pub use memory::MemoryStore;

/// Store-level errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// The addressed document does not exist
    #[error("document not found: {collection}/{id}")]
    NotFound {
        /// Collection that was addressed
        collection: String,

        /// Document id that was addressed
        id: String,
    },

    /// The store could not be reached or refused the request
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A document could not be encoded or decoded
    #[error("document serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A stored document: opaque id plus JSON payload
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Store-assigned document id
    pub id: String,

    /// Document payload
    pub data: JsonValue,
}

/// Equality filter over top-level document fields
///
/// The backing service only needs equality clauses for this system
/// (owner and completion-status scoping), so that is all the boundary
/// models. Clauses are ANDed together.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<(String, JsonValue)>,
}

impl Filter {
    /// Creates an empty filter matching every document
    pub fn new() -> Self {
        Filter::default()
    }

    /// Adds an equality clause on a top-level field
    pub fn field_eq(mut self, field: &str, value: impl Into<JsonValue>) -> Self {
        self.clauses.push((field.to_string(), value.into()));
        self
    }

    /// Checks whether a document payload satisfies every clause
    ///
    /// A missing field only matches an explicit JSON null.
    pub fn matches(&self, data: &JsonValue) -> bool {
        self.clauses.iter().all(|(field, expected)| {
            data.get(field).unwrap_or(&JsonValue::Null) == expected
        })
    }
}

/// Snapshot ordering for subscriptions
#[derive(Debug, Clone)]
pub struct OrderBy {
    /// Top-level field to order by
    pub field: String,

    /// Whether to order descending
    pub descending: bool,
}

impl OrderBy {
    /// Ascending order on `field`
    pub fn asc(field: &str) -> Self {
        OrderBy {
            field: field.to_string(),
            descending: false,
        }
    }

    /// Descending order on `field`
    pub fn desc(field: &str) -> Self {
        OrderBy {
            field: field.to_string(),
            descending: true,
        }
    }
}

/// One field operation within a merge-upsert
#[derive(Debug, Clone)]
enum MergeOp {
    /// Overwrite the field with a value
    Set(JsonValue),

    /// Atomically add to a numeric field, treating an absent field as zero
    Increment(i64),
}

/// A merge-upsert payload: field path → operation
///
/// Paths are dotted (`counts.uid-1`) and intermediate objects are created
/// as needed. Applying a patch to a missing document creates it, matching
/// the merge-write primitive of the backing service.
///
/// # Example
///
/// ```
/// use taskrank::store::MergePatch;
/// use serde_json::json;
///
/// let mut doc = json!({});
/// let patch = MergePatch::new()
///     .increment("counts.alice", 1)
///     .set("date", "2024-03-07");
/// patch.apply(&mut doc);
/// assert_eq!(doc, json!({"counts": {"alice": 1}, "date": "2024-03-07"}));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MergePatch {
    ops: Vec<(String, MergeOp)>,
}

impl MergePatch {
    /// Creates an empty patch
    pub fn new() -> Self {
        MergePatch::default()
    }

    /// Sets the field at `path` to `value`
    pub fn set(mut self, path: &str, value: impl Into<JsonValue>) -> Self {
        self.ops.push((path.to_string(), MergeOp::Set(value.into())));
        self
    }

    /// Increments the numeric field at `path` by `by`
    pub fn increment(mut self, path: &str, by: i64) -> Self {
        self.ops.push((path.to_string(), MergeOp::Increment(by)));
        self
    }

    /// Applies the patch to a document payload in place
    ///
    /// Store implementations call this under their own per-document
    /// atomicity guarantee.
    pub fn apply(&self, target: &mut JsonValue) {
        if !target.is_object() {
            *target = JsonValue::Object(Map::new());
        }
        for (path, op) in &self.ops {
            let node = slot(target, path);
            match op {
                MergeOp::Set(value) => *node = value.clone(),
                MergeOp::Increment(by) => {
                    let current = node.as_i64().unwrap_or(0);
                    *node = JsonValue::from(current + by);
                }
            }
        }
    }
}

/// Resolves a dotted path to a mutable slot, creating objects along the way
fn slot<'a>(root: &'a mut JsonValue, path: &str) -> &'a mut JsonValue {
    let mut node = root;
    for segment in path.split('.') {
        if !node.is_object() {
            *node = JsonValue::Object(Map::new());
        }
        let JsonValue::Object(map) = node else {
            unreachable!("node was just coerced to an object");
        };
        node = map.entry(segment).or_insert(JsonValue::Null);
    }
    node
}

/// A live query handle
///
/// Yields a full snapshot of the matching documents on every change to the
/// collection, starting with an immediate snapshot of the current state.
/// Implements [`futures::Stream`]; [`Subscription::cancel`] (or dropping
/// the handle) stops delivery, and no snapshot is yielded after
/// cancellation.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Vec<Document>>,
    token: CancellationToken,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl Subscription {
    /// Builds a subscription from a snapshot channel and its cancel token
    ///
    /// Store implementations hold the sending half and the same token, and
    /// are expected to stop publishing once the token is cancelled.
    pub fn new(rx: mpsc::UnboundedReceiver<Vec<Document>>, token: CancellationToken) -> Self {
        let cancelled = Box::pin(token.clone().cancelled_owned());
        Subscription {
            rx,
            token,
            cancelled,
        }
    }

    /// Waits for the next snapshot
    ///
    /// Returns `None` once the subscription is cancelled or the store side
    /// has gone away.
    pub async fn next_snapshot(&mut self) -> Option<Vec<Document>> {
        use tokio_stream::StreamExt;
        self.next().await
    }

    /// Stops delivery; the in-flight and any later snapshots are dropped
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl futures::Stream for Subscription {
    type Item = Vec<Document>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.token.is_cancelled() {
            return Poll::Ready(None);
        }
        if this.cancelled.as_mut().poll(cx).is_ready() {
            return Poll::Ready(None);
        }
        this.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Abstract document store
///
/// The concrete protocol behind this trait is out of scope for the crate;
/// [`MemoryStore`] implements it in-process for tests and demos.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates a document with a store-assigned id and returns the id
    async fn create(&self, collection: &str, data: JsonValue) -> Result<String, StoreError>;

    /// Merges top-level `fields` into an existing document
    ///
    /// Fails with [`StoreError::NotFound`] if the document is absent.
    async fn update(&self, collection: &str, id: &str, fields: JsonValue)
        -> Result<(), StoreError>;

    /// Deletes a document; deleting an absent id is a no-op success
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Fetches a document, or `None` if absent
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Opens a live query over `collection`
    ///
    /// The subscription yields filtered, ordered snapshots, beginning with
    /// the current state.
    async fn subscribe(
        &self,
        collection: &str,
        filter: Filter,
        order: Option<OrderBy>,
    ) -> Result<Subscription, StoreError>;

    /// Creates or merges a document at a caller-chosen id
    ///
    /// The whole patch is applied atomically; increments never lose racing
    /// updates.
    async fn upsert_merge(
        &self,
        collection: &str,
        id: &str,
        patch: MergePatch,
    ) -> Result<(), StoreError>;
}
