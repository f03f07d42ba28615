//! Process Identifiers
//!
//! A [`Pid`] addresses one actor process anywhere in the cluster. The
//! `service_id` is node-local and monotonically assigned at spawn; the
//! optional name is the primary addressing key once registered.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cluster-wide node identifier
pub type NodeId = u64;

/// Node-local process identifier, monotonically assigned at spawn
pub type ServiceId = u64;

/// Leading marker that flags a registration name as cluster-visible.
///
/// `named("@auth")` registers the canonical name `auth` and additionally
/// publishes it as a discovery tag so other nodes can route by it.
pub const GLOBAL_NAME_MARKER: char = '@';

/// Process identifier: `(node, service, optional name)`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pid {
    pub node_id: NodeId,
    pub service_id: ServiceId,
    #[serde(default)]
    pub name: Option<String>,
    /// Whether the name is published cluster-wide as a discovery tag
    #[serde(default)]
    pub global: bool,
}

impl Pid {
    /// Pid for a locally spawned process
    pub fn local(node_id: NodeId, service_id: ServiceId) -> Self {
        Self {
            node_id,
            service_id,
            name: None,
            global: false,
        }
    }

    /// Pid addressing a named service on a (possibly remote) node.
    ///
    /// `service_id` stays zero; the name is resolved by the target node.
    pub fn named(node_id: NodeId, name: impl Into<String>) -> Self {
        Self {
            node_id,
            service_id: 0,
            name: Some(name.into()),
            global: false,
        }
    }

    /// Whether this pid addresses a process on the given node.
    ///
    /// A zero node id means "unresolved" and is treated as local.
    pub fn is_local(&self, local: NodeId) -> bool {
        self.node_id == 0 || self.node_id == local
    }

    pub fn has_name(&self) -> bool {
        self.name.is_some()
    }

    /// Whether the pid carries any addressable component
    pub fn is_addressable(&self) -> bool {
        self.service_id > 0 || self.has_name()
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}/{}/{}", self.node_id, self.service_id, name),
            None => write!(f, "{}/{}", self.node_id, self.service_id),
        }
    }
}

/// Split a registration name into its canonical form and the global flag.
///
/// `"@auth"` -> `("auth", true)`; `"auth"` -> `("auth", false)`.
pub fn split_name(raw: &str) -> (&str, bool) {
    match raw.strip_prefix(GLOBAL_NAME_MARKER) {
        Some(rest) => (rest, true),
        None => (raw, false),
    }
}
