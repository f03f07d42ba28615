//! Hive Error Types
//!
//! Single error taxonomy for the runtime, grouped by concern: lifecycle,
//! validation, transport, codec, and router failures. Errors carry enough
//! context (node id, method, service name) to be actionable at the caller,
//! and cross-node errors preserve the remote side's error string.

use thiserror::Error;

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, HiveError>;

/// Main runtime error type
#[derive(Error, Debug, Clone)]
pub enum HiveError {
    // --- Lifecycle ---
    /// The node-local actor system is shutting down
    #[error("system shutting down (node {node})")]
    SystemShuttingDown { node: u64 },

    /// Target process has begun its exit sequence
    #[error("process exiting: {pid}")]
    ProcessExiting { pid: String },

    /// No process matches the addressed pid or name
    #[error("process not found: {target}")]
    ProcessNotFound { target: String },

    /// No cluster overlay has been attached to the system
    #[error("cluster not attached (node {node})")]
    ClusterNotAttached { node: u64 },

    // --- Validation ---
    /// Empty name passed to a naming operation
    #[error("empty name")]
    EmptyName,

    /// Empty method passed to registration or dispatch
    #[error("empty method")]
    EmptyMethod,

    /// Name already maps to a different process
    #[error("name already registered: {name}")]
    NameAlreadyRegistered { name: String },

    /// A pid's name slot may only be written once
    #[error("name change not allowed for {pid}: {current} -> {requested}")]
    NameChangeNotAllowed {
        pid: String,
        current: String,
        requested: String,
    },

    /// Method registered twice on the same router
    #[error("method already registered: {method}")]
    DuplicateMethod { method: String },

    /// Message target is missing or malformed
    #[error("invalid target: {reason}")]
    InvalidTarget { reason: String },

    // --- Transport ---
    /// Discovery has no member record for the target node
    #[error("no member found for node {node}")]
    NoMember { node: u64 },

    /// No cluster node advertises the requested service
    #[error("no nodes for service: {service}")]
    NoNodesForService { service: String },

    /// Publish or subscribe on the message bus failed
    #[error("bus error on topic {topic}: {message}")]
    Bus { topic: String, message: String },

    /// A call waiter expired before the reply arrived
    #[error("deadline exceeded: {operation}")]
    DeadlineExceeded { operation: String },

    /// The remote side reported a failure; its error string is preserved
    #[error("remote error: {message}")]
    Remote { message: String },

    // --- Codec ---
    /// Serialization failed
    #[error("{codec} marshal failed: {message}")]
    Marshal {
        codec: &'static str,
        message: String,
    },

    /// Deserialization failed
    #[error("{codec} unmarshal failed: {message}")]
    Unmarshal {
        codec: &'static str,
        message: String,
    },

    // --- Router ---
    /// No handler registered under the method name
    #[error("handler not found: {method}")]
    HandlerNotFound { method: String },

    /// Client-kind handler invoked without session metadata
    #[error("session required for method: {method}")]
    SessionRequired { method: String },

    /// Handler panicked; surfaced as a generic failure so callers never hang
    #[error("handler panicked: {method}")]
    HandlerPanic { method: String },
}

impl HiveError {
    /// Create an invalid-target validation error
    pub fn invalid_target(reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            reason: reason.into(),
        }
    }

    /// Create a deadline error for a named operation
    pub fn deadline(operation: impl Into<String>) -> Self {
        Self::DeadlineExceeded {
            operation: operation.into(),
        }
    }

    /// Create a remote error preserving the remote error string
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Create a bus transport error
    pub fn bus(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Bus {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a deadline/timeout kind
    pub fn is_deadline(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. })
    }

    /// Coarse error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            Self::SystemShuttingDown { .. }
            | Self::ProcessExiting { .. }
            | Self::ProcessNotFound { .. }
            | Self::ClusterNotAttached { .. } => "lifecycle",
            Self::EmptyName
            | Self::EmptyMethod
            | Self::NameAlreadyRegistered { .. }
            | Self::NameChangeNotAllowed { .. }
            | Self::DuplicateMethod { .. }
            | Self::InvalidTarget { .. } => "validation",
            Self::NoMember { .. }
            | Self::NoNodesForService { .. }
            | Self::Bus { .. }
            | Self::DeadlineExceeded { .. }
            | Self::Remote { .. } => "transport",
            Self::Marshal { .. } | Self::Unmarshal { .. } => "codec",
            Self::HandlerNotFound { .. }
            | Self::SessionRequired { .. }
            | Self::HandlerPanic { .. } => "router",
        }
    }
}
