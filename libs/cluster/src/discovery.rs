//! Service Discovery
//!
//! A [`Discovery`] backend holds the live set of [`Member`] records.
//! Registration is an upsert: retracting or adding a tag re-registers the
//! whole record, so consumers always see a consistent snapshot.

use async_trait::async_trait;
use hive_types::{Member, NodeId, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Callback fired with the current set of members advertising a watched
/// tag whenever that set may have changed
pub type TagListener = Arc<dyn Fn(Vec<Member>) + Send + Sync>;

/// Membership registry backend
#[async_trait]
pub trait Discovery: Send + Sync + 'static {
    /// Insert or replace a member record.
    async fn register(&self, member: Member) -> Result<()>;

    /// Remove a node's record; unknown nodes are a no-op.
    async fn deregister(&self, node: NodeId) -> Result<()>;

    /// One node's record, if present.
    async fn member(&self, node: NodeId) -> Result<Option<Member>>;

    /// All records, ordered by node id.
    async fn members(&self) -> Result<Vec<Member>>;

    /// Watch a tag; the listener fires with the advertising set after
    /// every change that could affect it. Propagation is best-effort; a
    /// backend may fire the listener inline with the mutating call or
    /// later.
    async fn subscribe(&self, tag: &str, listener: TagListener) -> Result<()>;

    /// Records advertising a tag, ordered by node id.
    async fn members_with_tag(&self, tag: &str) -> Result<Vec<Member>> {
        Ok(self
            .members()
            .await?
            .into_iter()
            .filter(|m| m.has_tag(tag))
            .collect())
    }
}

/// Process-local registry; clones share one underlying member table, so a
/// multi-node test wires every node to clones of the same instance.
#[derive(Clone, Default)]
pub struct MemoryDiscovery {
    members: Arc<RwLock<BTreeMap<NodeId, Member>>>,
    listeners: Arc<RwLock<Vec<(String, TagListener)>>>,
}

impl MemoryDiscovery {
    /// Fire every listener whose tag appears in the touched set.
    fn notify(&self, touched: impl IntoIterator<Item = String>) {
        let touched: Vec<String> = touched.into_iter().collect();
        if touched.is_empty() {
            return;
        }
        let listeners = self.listeners.read();
        for (tag, listener) in listeners.iter() {
            if touched.iter().any(|t| t == tag) {
                let snapshot: Vec<Member> = self
                    .members
                    .read()
                    .values()
                    .filter(|m| m.has_tag(tag))
                    .cloned()
                    .collect();
                listener(snapshot);
            }
        }
    }
}

#[async_trait]
impl Discovery for MemoryDiscovery {
    async fn register(&self, member: Member) -> Result<()> {
        debug!(node = member.id, tags = ?member.tags, "member registered");
        let mut touched: Vec<String> = member.tags.iter().cloned().collect();
        let old = self.members.write().insert(member.id, member);
        if let Some(old) = old {
            touched.extend(old.tags);
        }
        self.notify(touched);
        Ok(())
    }

    async fn deregister(&self, node: NodeId) -> Result<()> {
        let old = self.members.write().remove(&node);
        if let Some(old) = old {
            self.notify(old.tags);
        }
        Ok(())
    }

    async fn member(&self, node: NodeId) -> Result<Option<Member>> {
        Ok(self.members.read().get(&node).cloned())
    }

    async fn members(&self) -> Result<Vec<Member>> {
        Ok(self.members.read().values().cloned().collect())
    }

    async fn subscribe(&self, tag: &str, listener: TagListener) -> Result<()> {
        self.listeners.write().push((tag.to_string(), listener));
        Ok(())
    }
}
