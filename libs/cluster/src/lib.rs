//! Cluster Overlay
//!
//! Bridges node-local actor systems into one addressable mesh. Two
//! pluggable backends do the heavy lifting:
//!
//! - a [`MessageQueue`] carries serialized actor messages between nodes,
//!   one point-to-point topic per node (`cluster.node.<id>` by default)
//! - a [`Discovery`] registry publishes each node's [`Member`] record,
//!   whose tags carry the node kind and every globally registered actor
//!   name
//!
//! [`Cluster::start`] subscribes the node topic, registers the member,
//! and installs itself as the system's [`Remote`] transport, after which
//! remote pids route transparently through the bus.
//!
//! In-memory backends ([`MemoryBus`], [`MemoryDiscovery`]) serve tests
//! and single-process topologies; production deployments plug in their
//! own implementations of the two traits.
//!
//! [`Member`]: hive_types::Member
//! [`Remote`]: hive_actors::Remote

pub mod bus;
pub mod cluster;
pub mod discovery;

pub use bus::{BusHandler, MemoryBus, MessageQueue, ReplyFn};
pub use cluster::{bus_from_settings, discovery_from_settings, Cluster, ClusterOptions};
pub use discovery::{Discovery, MemoryDiscovery, TagListener};
