//! Node Membership Records
//!
//! A [`Member`] describes one node as published to service discovery.
//! Tags carry both the node kind and every globally registered actor name,
//! so routing by service name reduces to a tag filter.

use crate::pid::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Discovery record for a cluster node; equality over all fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: NodeId,
    pub kind: String,
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl Member {
    pub fn new(id: NodeId, kind: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, address: impl Into<String>, port: u16) -> Self {
        self.address = address.into();
        self.port = port;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_covers_tags() {
        let a = Member::new(1, "game").with_endpoint("10.0.0.1", 7000);
        let b = a.clone();
        assert_eq!(a, b);

        let c = b.with_tag("auth");
        assert_ne!(a, c);
        assert!(c.has_tag("auth"));
        assert!(!c.has_tag("chat"));
    }
}
