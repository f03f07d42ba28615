//! Cross-Node Transport Seam
//!
//! The actor engine is cluster-agnostic: messages addressed to another
//! node are handed to whatever [`Remote`] implementation was installed
//! via [`System::set_remote`]. The cluster overlay provides the real one;
//! tests install in-memory fakes.
//!
//! [`System::set_remote`]: crate::system::System::set_remote

use async_trait::async_trait;
use hive_types::{ActorMessage, Result};
use std::time::Duration;

/// Transport for messages whose target lives on another node
#[async_trait]
pub trait Remote: Send + Sync + 'static {
    /// Fire-and-forget delivery to the message's target node.
    async fn send(&self, msg: ActorMessage) -> Result<()>;

    /// Request/reply; resolves to the remote handler's raw payload.
    async fn call(&self, msg: ActorMessage, timeout: Duration) -> Result<Vec<u8>>;

    /// Advertise (or retract) a cluster-visible registration name so
    /// other nodes can route to it by tag.
    async fn update_tag(&self, name: &str, present: bool) -> Result<()>;
}
