//! Actor Execution Engine
//!
//! Node-local actor runtime: every actor is a single-threaded unit of
//! state fed by an unbounded mailbox, with at most one drain worker per
//! mailbox at any instant. Multiple mailboxes drain in parallel on the
//! tokio runtime, but handlers of one actor never overlap.
//!
//! ```text
//! ┌──────────────────────┐      ┌───────────────────────┐
//! │       System         │      │      Dispatcher       │
//! │  ServiceId → Process │      │                       │
//! │  Name      → Pid     │      │  drain ──► worker task│
//! │                      │      │  drain ──► worker task│
//! │  ┌────────────────┐  │      └───────────────────────┘
//! │  │ Process        │  │
//! │  │  mailbox ──────┼──┼────► Envelope{Task|Actor}
//! │  │  context/actor │  │
//! │  └────────────────┘  │      remote pids ──► Remote (cluster overlay)
//! └──────────────────────┘
//! ```
//!
//! Delivery is best-effort and in-order per producer→mailbox pair; there
//! is no persistence and no supervision tree. Remote pids are delegated
//! to the [`Remote`] overlay installed by the cluster layer.

pub mod actor;
pub mod context;
pub mod dispatch;
pub mod envelope;
pub mod mailbox;
pub mod process;
pub mod remote;
pub mod router;
pub mod strategy;
pub mod system;
pub mod waiter;

pub use actor::{Actor, ActorObj};
pub use context::{Context, TimerHandle};
pub use dispatch::{Dispatch, InlineDispatcher, PoolDispatcher};
pub use envelope::{Envelope, Task, TaskMessage};
pub use process::Process;
pub use remote::Remote;
pub use router::{router_for, HandlerKind, Router};
pub use strategy::RouteStrategy;
pub use system::{System, DEFAULT_CALL_TIMEOUT};

// Re-exported so downstream crates name message types from one place.
pub use hive_codec::Codec;
pub use hive_types::{ActorMessage, HiveError, Member, Pid, Response, Result, SessionInfo};
