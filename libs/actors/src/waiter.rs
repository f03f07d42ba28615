//! Call Waiters
//!
//! A waiter pairs a one-shot reply slot with a bounded wait. The reply
//! side plugs into [`ActorMessage::respond`]; the wait side is what a
//! synchronous caller parks on. Replies arriving after the deadline are
//! dropped on the floor when the receiver half is gone.
//!
//! [`ActorMessage::respond`]: hive_types::ActorMessage

use hive_types::{HiveError, RespondFn, Result};
use std::time::Duration;
use tokio::sync::oneshot;

/// Create a reply slot and the waiter parked on it.
///
/// `operation` labels the call in deadline errors, e.g. `"call login on 2/0/auth"`.
pub fn waiter(operation: impl Into<String>) -> (RespondFn, Waiter) {
    let (tx, rx) = oneshot::channel();
    let respond: RespondFn = Box::new(move |outcome| {
        // receiver gone means the caller timed out; drop the late reply
        let _ = tx.send(outcome);
    });
    (
        respond,
        Waiter {
            rx,
            operation: operation.into(),
        },
    )
}

/// Receiving half of a synchronous call
pub struct Waiter {
    rx: oneshot::Receiver<Result<Vec<u8>>>,
    operation: String,
}

impl Waiter {
    /// Park until the reply lands or the timeout expires.
    pub async fn wait(self, timeout: Duration) -> Result<Vec<u8>> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(HiveError::remote(format!(
                "{} dropped before a reply",
                self.operation
            ))),
            Err(_) => Err(HiveError::deadline(self.operation)),
        }
    }
}
