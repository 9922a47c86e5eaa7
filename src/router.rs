//! Maps `(event, id)` subscriptions to local listeners.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::event::Reply;

/// Callback invoked with the `data` of a matching subscription push.
pub type Listener = Arc<dyn Fn(Value) + Send + Sync>;

struct SubscriptionRecord {
    event: String,
    id: String,
    listener: Listener,
}

impl SubscriptionRecord {
    fn matches(&self, event: &str, id: &str) -> bool {
        self.event == event && self.id == id
    }
}

/// Registered subscriptions, in registration order.
///
/// Several listeners may share one `(event, id)` pair; all of them fire.
#[derive(Default)]
pub struct SubscriptionRouter {
    records: Mutex<Vec<Arc<SubscriptionRecord>>>,
}

impl SubscriptionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, event: &str, id: &str, listener: Listener) {
        self.records.lock().await.push(Arc::new(SubscriptionRecord {
            event: event.to_string(),
            id: id.to_string(),
            listener,
        }));
    }

    /// Drops every record for `(event, id)`; returns how many were removed.
    pub async fn remove(&self, event: &str, id: &str) -> usize {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|record| !record.matches(event, id));
        before - records.len()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Distinct `(event, id)` pairs, in first-registration order.
    pub async fn topics(&self) -> Vec<(String, String)> {
        let records = self.records.lock().await;
        let mut topics: Vec<(String, String)> = Vec::new();
        for record in records.iter() {
            if !topics.iter().any(|(e, i)| record.matches(e, i)) {
                topics.push((record.event.clone(), record.id.clone()));
            }
        }
        topics
    }

    pub async fn clear(&self) {
        self.records.lock().await.clear();
    }

    /// Invokes every listener whose `(event, id)` matches a successful push.
    ///
    /// The record list is snapshotted first, so listeners may subscribe or
    /// unsubscribe while being called. Returns the number of listeners invoked.
    pub async fn deliver(&self, reply: &Reply) -> usize {
        if !reply.is_success() {
            debug!(status = reply.status, "Ignoring unsuccessful subscription push");
            return 0;
        }
        let (Some(event), Some(id)) = (
            reply.data.get("event").and_then(Value::as_str),
            reply.data.get("id").and_then(Value::as_str),
        ) else {
            debug!(data = %reply.data, "Subscription push without event/id");
            return 0;
        };
        let payload = reply.data.get("data").cloned().unwrap_or(Value::Null);

        let snapshot: Vec<Arc<SubscriptionRecord>> = self
            .records
            .lock()
            .await
            .iter()
            .filter(|record| record.matches(event, id))
            .cloned()
            .collect();

        for record in &snapshot {
            (record.listener)(payload.clone());
        }
        snapshot.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    fn recorder() -> (Listener, Arc<StdMutex<Vec<Value>>>) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let listener: Listener = Arc::new(move |value| sink.lock().unwrap().push(value));
        (listener, seen)
    }

    fn push(event: &str, id: &str, data: Value) -> Reply {
        Reply {
            status: 200,
            data: json!({"event": event, "id": id, "data": data}),
        }
    }

    #[tokio::test]
    async fn delivers_only_to_matching_pair() {
        let router = SubscriptionRouter::new();
        let (listener, seen) = recorder();
        router.add("job", "42", listener).await;

        assert_eq!(router.deliver(&push("job", "42", json!({"progress": 50}))).await, 1);
        assert_eq!(router.deliver(&push("job", "43", json!({"progress": 10}))).await, 0);
        assert_eq!(router.deliver(&push("task", "42", json!({"progress": 10}))).await, 0);

        assert_eq!(*seen.lock().unwrap(), vec![json!({"progress": 50})]);
    }

    #[tokio::test]
    async fn unsuccessful_status_is_ignored() {
        let router = SubscriptionRouter::new();
        let (listener, seen) = recorder();
        router.add("job", "42", listener).await;

        let mut reply = push("job", "42", json!(1));
        reply.status = 500;
        assert_eq!(router.deliver(&reply).await, 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_data_is_delivered_as_null() {
        let router = SubscriptionRouter::new();
        let (listener, seen) = recorder();
        router.add("job", "42", listener).await;

        let reply = Reply {
            status: 200,
            data: json!({"event": "job", "id": "42"}),
        };
        router.deliver(&reply).await;
        assert_eq!(*seen.lock().unwrap(), vec![Value::Null]);
    }

    #[tokio::test]
    async fn all_listeners_fire_in_registration_order() {
        let router = SubscriptionRouter::new();
        let order = Arc::new(StdMutex::new(Vec::new()));
        for n in 0..3 {
            let order = order.clone();
            router
                .add("job", "42", Arc::new(move |_| order.lock().unwrap().push(n)))
                .await;
        }
        assert_eq!(router.deliver(&push("job", "42", json!(null))).await, 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn remove_drops_every_match_and_is_idempotent() {
        let router = SubscriptionRouter::new();
        let (a, _) = recorder();
        let (b, _) = recorder();
        let (c, _) = recorder();
        router.add("job", "42", a).await;
        router.add("job", "42", b).await;
        router.add("job", "43", c).await;

        assert_eq!(router.remove("job", "42").await, 2);
        assert_eq!(router.remove("job", "42").await, 0);
        assert_eq!(router.len().await, 1);
        assert_eq!(router.topics().await, vec![("job".to_string(), "43".to_string())]);
    }

    #[tokio::test]
    async fn topics_are_distinct() {
        let router = SubscriptionRouter::new();
        for id in ["1", "2", "1"] {
            let (listener, _) = recorder();
            router.add("job", id, listener).await;
        }
        assert_eq!(
            router.topics().await,
            vec![("job".to_string(), "1".to_string()), ("job".to_string(), "2".to_string())]
        );
    }

    #[tokio::test]
    async fn listener_may_touch_router_during_delivery() {
        let router = Arc::new(SubscriptionRouter::new());
        let inner = router.clone();
        router
            .add(
                "job",
                "42",
                Arc::new(move |_| {
                    let inner = inner.clone();
                    tokio::spawn(async move {
                        inner.remove("job", "42").await;
                    });
                }),
            )
            .await;

        assert_eq!(router.deliver(&push("job", "42", json!(1))).await, 1);
        tokio::task::yield_now().await;
        for _ in 0..10 {
            if router.is_empty().await {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(router.is_empty().await);
    }
}
