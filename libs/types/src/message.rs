//! Actor Message Envelope and Wire Reply
//!
//! [`ActorMessage`] is the unit of delivery between actors, local or
//! remote. On the wire it is whatever the node codec produces from the
//! serializable fields; the response callback is local-only state and is
//! never serialized.

use crate::error::{HiveError, Result};
use crate::pid::Pid;
use crate::session::SessionInfo;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Local-only response callback for synchronous calls.
///
/// Fires exactly once: `FnOnce` by construction, held in an `Option` that
/// is taken before invocation. `Sync` so a message holding one can be
/// borrowed from inside a work-stealing executor's futures.
pub type RespondFn = Box<dyn FnOnce(Result<Vec<u8>>) + Send + Sync>;

/// Message addressed to an actor
#[derive(Serialize, Deserialize, Default)]
pub struct ActorMessage {
    pub from: Pid,
    pub to: Pid,
    pub method: String,
    #[serde(default)]
    pub data: Vec<u8>,
    #[serde(default)]
    pub session: Option<SessionInfo>,
    /// Absolute call deadline, unix seconds; zero means "use the default"
    #[serde(default)]
    pub deadline_unix_secs: u64,
    /// Fire-and-forget when true; request/reply when false
    pub is_async: bool,
    /// Local-only override for the call wait, with sub-second resolution.
    /// The wire carries only `deadline_unix_secs`.
    #[serde(skip)]
    pub timeout: Option<std::time::Duration>,
    #[serde(skip)]
    pub respond: Option<RespondFn>,
}

impl ActorMessage {
    /// Build a fire-and-forget message
    pub fn send(from: Pid, to: Pid, method: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            from,
            to,
            method: method.into(),
            data,
            session: None,
            deadline_unix_secs: 0,
            is_async: true,
            timeout: None,
            respond: None,
        }
    }

    /// Build a request/reply message with an absolute deadline
    pub fn call(
        from: Pid,
        to: Pid,
        method: impl Into<String>,
        data: Vec<u8>,
        deadline_unix_secs: u64,
    ) -> Self {
        Self {
            from,
            to,
            method: method.into(),
            data,
            session: None,
            deadline_unix_secs,
            is_async: false,
            timeout: None,
            respond: None,
        }
    }

    /// Fire the response callback, if any. Safe to call once; the callback
    /// slot is consumed so a second call is a no-op.
    pub fn complete(&mut self, outcome: Result<Vec<u8>>) {
        if let Some(respond) = self.respond.take() {
            respond(outcome);
        }
    }
}

// Manual Clone: the response callback never travels with a copy.
impl Clone for ActorMessage {
    fn clone(&self) -> Self {
        Self {
            from: self.from.clone(),
            to: self.to.clone(),
            method: self.method.clone(),
            data: self.data.clone(),
            session: self.session.clone(),
            deadline_unix_secs: self.deadline_unix_secs,
            is_async: self.is_async,
            timeout: self.timeout,
            respond: None,
        }
    }
}

impl fmt::Debug for ActorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorMessage")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("method", &self.method)
            .field("data_len", &self.data.len())
            .field("session", &self.session)
            .field("deadline_unix_secs", &self.deadline_unix_secs)
            .field("is_async", &self.is_async)
            .field("has_respond", &self.respond.is_some())
            .finish()
    }
}

/// Wire-level reply: empty `error` means success
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub data: Vec<u8>,
    #[serde(default)]
    pub error: String,
}

impl Response {
    pub fn ok(data: Vec<u8>) -> Self {
        Self {
            data,
            error: String::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            data: Vec::new(),
            error: error.into(),
        }
    }

    /// A non-empty error string is a failed call regardless of data
    pub fn into_result(self) -> Result<Vec<u8>> {
        if self.error.is_empty() {
            Ok(self.data)
        } else {
            Err(HiveError::remote(self.error))
        }
    }
}

/// Current wall-clock time as unix seconds
pub fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
