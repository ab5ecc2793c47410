/// In-memory document store
///
/// Implements [`DocumentStore`] against process-local maps. It exists to
/// exercise the system without an external service: unit tests, the
/// integration flows, and demos all run on it.
///
/// Every operation takes the store mutex for its whole duration, which
/// gives this implementation the per-call atomicity the boundary demands —
/// a [`MergePatch`] is applied as one unit, so racing increments cannot
/// lose updates.
///
/// Subscriptions receive a full filtered snapshot after every mutation of
/// their collection, starting with one at subscribe time. Cancelled
/// watchers are pruned on the next publish.

use crate::store::{
    Document, DocumentStore, Filter, MergePatch, OrderBy, StoreError, Subscription,
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Process-local document store
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    /// collection name → (document id → payload)
    collections: HashMap<String, BTreeMap<String, JsonValue>>,
    watchers: Vec<Watcher>,
}

struct Watcher {
    collection: String,
    filter: Filter,
    order: Option<OrderBy>,
    tx: mpsc::UnboundedSender<Vec<Document>>,
    token: CancellationToken,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        MemoryStore {
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means another test panicked mid-operation
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

/// Collects the filtered, ordered snapshot a watcher should see
fn snapshot(
    collections: &HashMap<String, BTreeMap<String, JsonValue>>,
    collection: &str,
    filter: &Filter,
    order: Option<&OrderBy>,
) -> Vec<Document> {
    let mut docs: Vec<Document> = collections
        .get(collection)
        .map(|docs| {
            docs.iter()
                .filter(|(_, data)| filter.matches(data))
                .map(|(id, data)| Document {
                    id: id.clone(),
                    data: data.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    if let Some(order) = order {
        docs.sort_by(|a, b| {
            let left = a.data.get(&order.field).unwrap_or(&JsonValue::Null);
            let right = b.data.get(&order.field).unwrap_or(&JsonValue::Null);
            let ord = compare_values(left, right);
            if order.descending {
                ord.reverse()
            } else {
                ord
            }
        });
    }
    docs
}

/// Total order over the JSON values this system sorts by
///
/// RFC 3339 timestamps are strings, so lexicographic string order is
/// chronological order. Mixed types compare equal rather than panic.
fn compare_values(a: &JsonValue, b: &JsonValue) -> Ordering {
    match (a, b) {
        (JsonValue::Null, JsonValue::Null) => Ordering::Equal,
        (JsonValue::Null, _) => Ordering::Less,
        (_, JsonValue::Null) => Ordering::Greater,
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
        (JsonValue::Number(x), JsonValue::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (JsonValue::String(x), JsonValue::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// Pushes fresh snapshots to every live watcher of `collection`
fn publish(inner: &mut Inner, collection: &str) {
    inner
        .watchers
        .retain(|w| !w.token.is_cancelled() && !w.tx.is_closed());

    let collections = &inner.collections;
    for watcher in inner.watchers.iter().filter(|w| w.collection == collection) {
        let docs = snapshot(collections, collection, &watcher.filter, watcher.order.as_ref());
        let _ = watcher.tx.send(docs);
    }
}

/// Merges top-level fields of `fields` into `target`
fn merge_top_level(target: &mut JsonValue, fields: JsonValue) {
    match fields {
        JsonValue::Object(new_fields) => {
            if let Some(map) = target.as_object_mut() {
                for (key, value) in new_fields {
                    map.insert(key, value);
                }
            } else {
                *target = JsonValue::Object(new_fields);
            }
        }
        other => *target = other,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, data: JsonValue) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let mut inner = self.lock();
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), data);
        publish(&mut inner, collection);
        Ok(id)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: JsonValue,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let existing = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        merge_top_level(existing, fields);
        publish(&mut inner, collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let removed = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            publish(&mut inner, collection);
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    async fn subscribe(
        &self,
        collection: &str,
        filter: Filter,
        order: Option<OrderBy>,
    ) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();

        let mut inner = self.lock();
        let initial = snapshot(&inner.collections, collection, &filter, order.as_ref());
        let _ = tx.send(initial);
        inner.watchers.push(Watcher {
            collection: collection.to_string(),
            filter,
            order,
            tx,
            token: token.clone(),
        });

        Ok(Subscription::new(rx, token))
    }

    async fn upsert_merge(
        &self,
        collection: &str,
        id: &str,
        patch: MergePatch,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let doc = inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .entry(id.to_string())
            .or_insert_with(|| serde_json::json!({}));
        patch.apply(doc);
        publish(&mut inner, collection);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_then_get() {
        let store = MemoryStore::new();
        let id = store
            .create("tasks", json!({"title": "water plants"}))
            .await
            .unwrap();

        let doc = store.get("tasks", &id).await.unwrap().unwrap();
        assert_eq!(doc.id, id);
        assert_eq!(doc.data["title"], "water plants");
    }

    #[tokio::test]
    async fn test_get_absent_is_none() {
        let store = MemoryStore::new();
        assert!(store.get("tasks", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryStore::new();
        let id = store
            .create("tasks", json!({"title": "a", "completed": false}))
            .await
            .unwrap();

        store
            .update("tasks", &id, json!({"completed": true}))
            .await
            .unwrap();

        let doc = store.get("tasks", &id).await.unwrap().unwrap();
        assert_eq!(doc.data["title"], "a");
        assert_eq!(doc.data["completed"], true);
    }

    #[tokio::test]
    async fn test_update_absent_fails() {
        let store = MemoryStore::new();
        let err = store
            .update("tasks", "missing", json!({"completed": true}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        let id = store.create("tasks", json!({"title": "a"})).await.unwrap();

        store.delete("tasks", &id).await.unwrap();
        assert!(store.get("tasks", &id).await.unwrap().is_none());

        // Second delete of the same id is a no-op success
        store.delete("tasks", &id).await.unwrap();
        store.delete("tasks", "never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_merge_creates_then_increments() {
        let store = MemoryStore::new();
        let patch = || MergePatch::new().increment("counts.alice", 1).set("date", "2024-03-07");

        store.upsert_merge("leaderboards", "lb-1", patch()).await.unwrap();
        store.upsert_merge("leaderboards", "lb-1", patch()).await.unwrap();

        let doc = store.get("leaderboards", "lb-1").await.unwrap().unwrap();
        assert_eq!(doc.data["counts"]["alice"], 2);
        assert_eq!(doc.data["date"], "2024-03-07");
    }

    #[tokio::test]
    async fn test_subscribe_sends_initial_snapshot() {
        let store = MemoryStore::new();
        store.create("tasks", json!({"uid": "a"})).await.unwrap();

        let mut sub = store
            .subscribe("tasks", Filter::new(), None)
            .await
            .unwrap();
        let first = sub.next_snapshot().await.unwrap();
        assert_eq!(first.len(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_filters_and_tracks_changes() {
        let store = MemoryStore::new();
        let mut sub = store
            .subscribe("tasks", Filter::new().field_eq("uid", "a"), None)
            .await
            .unwrap();
        assert!(sub.next_snapshot().await.unwrap().is_empty());

        store.create("tasks", json!({"uid": "a"})).await.unwrap();
        assert_eq!(sub.next_snapshot().await.unwrap().len(), 1);

        // A document for another user still triggers a publish, but the
        // snapshot stays filtered
        store.create("tasks", json!({"uid": "b"})).await.unwrap();
        assert_eq!(sub.next_snapshot().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_orders_descending() {
        let store = MemoryStore::new();
        store
            .create("tasks", json!({"completedAt": "2024-03-07T10:00:00Z"}))
            .await
            .unwrap();
        store
            .create("tasks", json!({"completedAt": "2024-03-08T10:00:00Z"}))
            .await
            .unwrap();

        let mut sub = store
            .subscribe("tasks", Filter::new(), Some(OrderBy::desc("completedAt")))
            .await
            .unwrap();
        let docs = sub.next_snapshot().await.unwrap();
        assert_eq!(docs[0].data["completedAt"], "2024-03-08T10:00:00Z");
        assert_eq!(docs[1].data["completedAt"], "2024-03-07T10:00:00Z");
    }

    #[tokio::test]
    async fn test_cancelled_subscription_yields_nothing() {
        let store = MemoryStore::new();
        let mut sub = store
            .subscribe("tasks", Filter::new(), None)
            .await
            .unwrap();
        assert!(sub.next_snapshot().await.is_some());

        sub.cancel();
        store.create("tasks", json!({"uid": "a"})).await.unwrap();
        assert!(sub.next_snapshot().await.is_none());
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(compare_values(&json!(1), &json!(2)), Ordering::Less);
        assert_eq!(compare_values(&json!("a"), &json!("b")), Ordering::Less);
        assert_eq!(compare_values(&JsonValue::Null, &json!("a")), Ordering::Less);
        assert_eq!(compare_values(&json!(true), &json!(true)), Ordering::Equal);
    }
}
