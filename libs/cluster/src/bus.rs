//! Message Bus
//!
//! Topic-addressed transport between nodes. Each node subscribes exactly
//! one handler to its own topic; publishes are fire-and-forget, requests
//! carry a one-shot reply path. Delivery within a topic is FIFO: the
//! in-memory backend runs one worker task per topic, which is also the
//! ordering model real brokers (one consumer per subject) provide.

use async_trait::async_trait;
use futures::future::BoxFuture;
use hive_types::{HiveError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

/// One-shot reply path handed to the subscriber of a request
pub type ReplyFn = Box<dyn FnOnce(Vec<u8>) -> Result<()> + Send>;

/// Subscriber callback; `reply` is `Some` exactly for requests
pub type BusHandler =
    Arc<dyn Fn(Vec<u8>, Option<ReplyFn>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Transport backend carrying serialized messages between nodes
#[async_trait]
pub trait MessageQueue: Send + Sync + 'static {
    /// Attach the single handler for a topic.
    async fn subscribe(&self, topic: &str, handler: BusHandler) -> Result<()>;

    /// Detach a topic's handler; unknown topics are a no-op.
    async fn unsubscribe(&self, topic: &str) -> Result<()>;

    /// Fire-and-forget delivery to a topic.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Deliver to a topic and wait for the subscriber's reply.
    async fn request(&self, topic: &str, payload: Vec<u8>, timeout: Duration) -> Result<Vec<u8>>;
}

struct BusItem {
    payload: Vec<u8>,
    reply: Option<ReplyFn>,
}

/// Process-local bus; clones share the topic table, so a multi-node test
/// wires every node to clones of the same instance.
#[derive(Clone, Default)]
pub struct MemoryBus {
    topics: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<BusItem>>>>,
}

impl MemoryBus {
    fn sender(&self, topic: &str) -> Result<mpsc::UnboundedSender<BusItem>> {
        self.topics
            .lock()
            .get(topic)
            .cloned()
            .ok_or_else(|| HiveError::bus(topic, "no subscriber"))
    }

    fn deliver(&self, topic: &str, item: BusItem) -> Result<()> {
        self.sender(topic)?
            .send(item)
            .map_err(|_| HiveError::bus(topic, "subscriber gone"))
    }
}

#[async_trait]
impl MessageQueue for MemoryBus {
    async fn subscribe(&self, topic: &str, handler: BusHandler) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<BusItem>();
        {
            let mut topics = self.topics.lock();
            if topics.contains_key(topic) {
                return Err(HiveError::bus(topic, "topic already has a subscriber"));
            }
            topics.insert(topic.to_string(), tx);
        }
        // one worker per topic keeps delivery FIFO
        let topic = topic.to_string();
        tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                if let Err(e) = handler(item.payload, item.reply).await {
                    warn!(topic = %topic, error = %e, "bus handler failed");
                }
            }
        });
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<()> {
        // dropping the sender ends the worker once the queue drains
        self.topics.lock().remove(topic);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.deliver(
            topic,
            BusItem {
                payload,
                reply: None,
            },
        )
    }

    async fn request(&self, topic: &str, payload: Vec<u8>, timeout: Duration) -> Result<Vec<u8>> {
        let (tx, rx) = oneshot::channel::<Vec<u8>>();
        let reply_topic = topic.to_string();
        let reply: ReplyFn = Box::new(move |bytes| {
            tx.send(bytes)
                .map_err(|_| HiveError::bus(reply_topic, "requester gone"))
        });
        self.deliver(
            topic,
            BusItem {
                payload,
                reply: Some(reply),
            },
        )?;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(_)) => Err(HiveError::bus(topic, "request dropped without a reply")),
            Err(_) => Err(HiveError::deadline(format!("request on {topic}"))),
        }
    }
}
