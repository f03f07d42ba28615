//! Actor Execution Context
//!
//! Every process owns one [`Context`]; handlers and lifecycle hooks borrow
//! it mutably, so context operations never race with each other. The
//! context holds weak references back to its process and system: a timer
//! or task that outlives the process simply stops firing.

use crate::envelope::{Envelope, TaskMessage};
use crate::process::Process;
use crate::system::{System, SystemInner};
use hive_codec::Codec;
use hive_types::{ActorMessage, HiveError, Pid, Result};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Handle to a scheduled timer; aborting it stops future firings
pub struct TimerHandle {
    handle: JoinHandle<()>,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Per-process runtime handle passed to every handler
pub struct Context {
    pid: Pid,
    codec: Codec,
    system: Weak<SystemInner>,
    process: Weak<Process>,
}

impl Context {
    pub(crate) fn new(
        pid: Pid,
        codec: Codec,
        system: Weak<SystemInner>,
        process: Weak<Process>,
    ) -> Self {
        Self {
            pid,
            codec,
            system,
            process,
        }
    }

    /// Context with no backing system or process, for driving handlers
    /// directly in tests.
    #[cfg(test)]
    pub(crate) fn detached(pid: Pid, codec: Codec) -> Self {
        Self {
            pid,
            codec,
            system: Weak::new(),
            process: Weak::new(),
        }
    }

    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// The owning system; fails once the system has been torn down.
    pub fn system(&self) -> Result<System> {
        self.system
            .upgrade()
            .map(System::from_inner)
            .ok_or(HiveError::SystemShuttingDown {
                node: self.pid.node_id,
            })
    }

    pub(crate) fn system_ref(&self) -> Option<Arc<SystemInner>> {
        self.system.upgrade()
    }

    fn process_ref(&self) -> Result<Arc<Process>> {
        self.process.upgrade().ok_or(HiveError::ProcessExiting {
            pid: self.pid.to_string(),
        })
    }

    /// Fire-and-forget a message from this actor.
    pub async fn send(&self, to: Pid, method: &str, data: Vec<u8>) -> Result<()> {
        self.system()?
            .route(ActorMessage::send(self.pid.clone(), to, method, data))
            .await
    }

    /// Call another actor and wait for its reply.
    ///
    /// The caller's own mailbox keeps draining other messages only after
    /// this handler returns; a call that loops back into this actor
    /// (directly or through intermediaries) therefore deadlocks until the
    /// timeout fires. Fan out through `send` when a cycle is possible.
    pub async fn call(
        &self,
        to: Pid,
        method: &str,
        data: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        self.system()?
            .call(self.pid.clone(), to, method, data, Some(timeout))
            .await
    }

    /// Re-address a message to a new target and method and route it
    /// onward. Payload, session metadata, the original sender, and the
    /// reply slot all travel with it.
    pub async fn forward(&self, mut msg: ActorMessage, to: Pid, method: &str) -> Result<()> {
        msg.to = to;
        msg.method = method.to_string();
        self.system()?.route(msg).await
    }

    /// Queue a task on this actor's own mailbox; it runs with exclusive
    /// access to the actor state after the current handler returns.
    pub fn submit(&self, task: TaskMessage) -> Result<()> {
        let proc = self.process_ref()?;
        proc.deliver(Envelope::Task(task));
        Ok(())
    }

    /// Run a task on this actor's mailbox once, after a delay.
    pub fn schedule_once(&self, delay: Duration, task: TaskMessage) -> TimerHandle {
        let process = self.process.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(proc) = process.upgrade() {
                proc.deliver(Envelope::Task(task));
            }
        });
        TimerHandle { handle }
    }

    /// Run a freshly built task on this actor's mailbox every `period`.
    /// The timer stops by itself once the process is gone.
    pub fn schedule_interval<F>(&self, period: Duration, make_task: F) -> TimerHandle
    where
        F: Fn() -> TaskMessage + Send + 'static,
    {
        let process = self.process.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // the first tick fires immediately
            loop {
                ticker.tick().await;
                match process.upgrade() {
                    Some(proc) if !proc.is_exiting() => proc.deliver(Envelope::Task(make_task())),
                    _ => break,
                }
            }
        });
        TimerHandle { handle }
    }

    /// Register a name for this process. A leading `@` publishes the name
    /// cluster-wide.
    pub fn register_name(&self, name: &str) -> Result<()> {
        self.system()?.register_name(&self.pid, name)
    }

    /// Drop this process's registered name, if any.
    pub fn unname(&self) -> Result<()> {
        self.system()?.unname(&self.pid)
    }

    /// Begin this actor's exit sequence. Queued and future messages fail
    /// with a process-exiting error; `on_stop` runs as the final item.
    pub fn exit(&self) {
        if let Ok(proc) = self.process_ref() {
            proc.request_stop(None);
        }
    }
}
