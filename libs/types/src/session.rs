//! Gateway Session Metadata
//!
//! [`SessionInfo`] is the opaque routing metadata the network gateway
//! attaches to client-originated messages. It is deep-cloned whenever a
//! message is forwarded so an actor can never mutate a peer's copy.
//!
//! The [`Session`] trait is the write side the gateway provides to
//! client-kind handlers; the runtime only consumes it.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Client routing metadata carried with gateway-originated messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Identity of the frontend agent holding the connection
    pub agent_id: u64,
    /// Connection identifier within the agent
    pub session_id: u64,
    /// Client request sequence index, echoed back on responses
    pub seq: u32,
}

impl SessionInfo {
    pub fn new(agent_id: u64, session_id: u64, seq: u32) -> Self {
        Self {
            agent_id,
            session_id,
            seq,
        }
    }
}

/// Write side of a client connection, implemented by the gateway
pub trait Session: Send + Sync {
    /// Reply to the request the current handler is processing
    fn response(&self, payload: &[u8]) -> Result<()>;

    /// Push an unsolicited message to the client
    fn push(&self, cmd: &str, act: &str, payload: &[u8]) -> Result<()>;

    /// Tear the connection down
    fn close(&self);
}
