//! Core Data Model for the Hive Actor Runtime
//!
//! Shared types used by every layer of the runtime: process identifiers,
//! actor messages, node membership records, gateway session metadata, and
//! the error taxonomy.
//!
//! This crate deliberately carries no runtime behavior. The execution
//! engine lives in `hive-actors` and the location-transparency overlay in
//! `hive-cluster`; both speak in terms of the types defined here.

pub mod error;
pub mod member;
pub mod message;
pub mod pid;
pub mod session;

pub use error::{HiveError, Result};
pub use member::Member;
pub use message::{unix_now_secs, ActorMessage, RespondFn, Response};
pub use pid::{split_name, NodeId, Pid, ServiceId, GLOBAL_NAME_MARKER};
pub use session::{Session, SessionInfo};
