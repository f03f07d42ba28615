//! Mailbox Dispatchers
//!
//! A dispatcher decides where mailbox drains execute. The pool flavor
//! spawns each drain onto the tokio runtime so distinct mailboxes proceed
//! in parallel; the inline flavor runs the drain on the calling thread for
//! deterministic tests.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::error;

/// Default number of envelopes one drain processes before yielding so
/// other mailboxes get scheduled.
pub const DEFAULT_THROUGHPUT: usize = 1024;

/// Execution policy for mailbox drains
pub trait Dispatch: Send + Sync + 'static {
    /// Submit a drain for execution. Returns after submission, not
    /// completion. A panic escaping the drain must not poison the
    /// dispatcher.
    fn schedule(&self, drain: BoxFuture<'static, ()>);

    /// Per-drain quantum: envelopes processed before a cooperative yield.
    fn throughput(&self) -> usize;
}

/// Runs drains as tokio tasks; the runtime's worker pool bounds parallelism.
pub struct PoolDispatcher {
    throughput: usize,
}

impl PoolDispatcher {
    pub fn new(throughput: usize) -> Self {
        Self {
            throughput: throughput.max(1),
        }
    }
}

impl Default for PoolDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_THROUGHPUT)
    }
}

impl Dispatch for PoolDispatcher {
    fn schedule(&self, drain: BoxFuture<'static, ()>) {
        tokio::spawn(async move {
            if let Err(panic) = AssertUnwindSafe(drain).catch_unwind().await {
                error!(?panic, "mailbox drain panicked");
            }
        });
    }

    fn throughput(&self) -> usize {
        self.throughput
    }
}

/// Runs drains inline on the caller. Only for tests: handlers must not
/// depend on tokio timers or I/O since the calling thread is parked.
///
/// Drains scheduled from inside a running drain (quantum yields, the
/// release-and-recheck path) are queued in a thread-local and run by the
/// outermost `schedule` call, so `block_on` never nests.
pub struct InlineDispatcher {
    throughput: usize,
}

thread_local! {
    static INLINE_QUEUE: std::cell::RefCell<std::collections::VecDeque<BoxFuture<'static, ()>>> =
        std::cell::RefCell::new(std::collections::VecDeque::new());
    static INLINE_ACTIVE: std::cell::Cell<bool> = std::cell::Cell::new(false);
}

impl InlineDispatcher {
    pub fn new(throughput: usize) -> Self {
        Self {
            throughput: throughput.max(1),
        }
    }
}

impl Default for InlineDispatcher {
    fn default() -> Self {
        Self::new(16)
    }
}

impl Dispatch for InlineDispatcher {
    fn schedule(&self, drain: BoxFuture<'static, ()>) {
        INLINE_QUEUE.with(|q| q.borrow_mut().push_back(drain));
        if INLINE_ACTIVE.with(|a| a.replace(true)) {
            // an outer schedule call on this thread will pick it up
            return;
        }
        while let Some(next) = INLINE_QUEUE.with(|q| q.borrow_mut().pop_front()) {
            if let Err(panic) =
                futures::executor::block_on(AssertUnwindSafe(next).catch_unwind())
            {
                error!(?panic, "inline mailbox drain panicked");
            }
        }
        INLINE_ACTIVE.with(|a| a.set(false));
    }

    fn throughput(&self) -> usize {
        self.throughput
    }
}
