//! Actor Processes
//!
//! A [`Process`] binds one actor instance to its mailbox, context, and
//! route table. The mailbox's claim flag guarantees at most one drain is
//! active, so the actor cell is only ever locked by that drain; the mutex
//! exists to carry the cell across await points, not to arbitrate.
//!
//! Lifecycle: spawn queues an init task as the first mailbox item; exit
//! flips the `exiting` flag and queues a stop task. Once exiting, actor
//! messages fail fast with `ProcessExiting` while tasks still run, so the
//! stop hook and shutdown acks always complete.

use crate::actor::ActorObj;
use crate::context::Context;
use crate::dispatch::Dispatch;
use crate::envelope::{Envelope, Task, TaskMessage};
use crate::mailbox::Mailbox;
use crate::router::Router;
use crate::system::SystemInner;
use futures::future::BoxFuture;
use futures::FutureExt;
use hive_types::{unix_now_secs, HiveError, Pid, Result};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use tracing::{debug, warn};

struct ActorCell {
    actor: Box<dyn ActorObj>,
    ctx: Context,
}

/// One spawned actor: state, mailbox, and drain bookkeeping
pub struct Process {
    pid: Pid,
    mailbox: Mailbox,
    cell: tokio::sync::Mutex<ActorCell>,
    exiting: AtomicBool,
    router: Arc<Router>,
    dispatcher: Arc<dyn Dispatch>,
}

impl Process {
    pub(crate) fn spawn(
        system: &Arc<SystemInner>,
        pid: Pid,
        actor: Box<dyn ActorObj>,
        router: Arc<Router>,
    ) -> Arc<Self> {
        let codec = system.codec();
        let dispatcher = system.dispatcher();
        let proc = Arc::new_cyclic(|weak: &Weak<Process>| {
            let ctx = Context::new(pid.clone(), codec, Arc::downgrade(system), weak.clone());
            Process {
                pid,
                mailbox: Mailbox::new(),
                cell: tokio::sync::Mutex::new(ActorCell { actor, ctx }),
                exiting: AtomicBool::new(false),
                router,
                dispatcher,
            }
        });
        proc.deliver(Envelope::Task(TaskMessage::new(InitTask)));
        proc
    }

    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    pub fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::Acquire)
    }

    /// Enqueue one envelope and make sure a drain is (or becomes) active.
    pub(crate) fn deliver(self: &Arc<Self>, env: Envelope) {
        match env {
            Envelope::Actor(mut msg) if self.is_exiting() => {
                if msg.is_async {
                    debug!(pid = %self.pid, method = %msg.method, "dropping message for exiting process");
                }
                msg.complete(Err(HiveError::ProcessExiting {
                    pid: self.pid.to_string(),
                }));
            }
            env => {
                self.mailbox.push(env);
                self.try_schedule();
            }
        }
    }

    /// Flip to exiting and queue the stop task. Returns false when the
    /// exit sequence was already underway (the ack is dropped, which a
    /// waiter observes as a closed channel).
    pub(crate) fn request_stop(self: &Arc<Self>, ack: Option<oneshot::Sender<()>>) -> bool {
        if self
            .exiting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.mailbox.push(Envelope::Task(TaskMessage::new(StopTask { ack })));
        self.try_schedule();
        true
    }

    fn try_schedule(self: &Arc<Self>) {
        if self.mailbox.try_claim() {
            self.dispatcher.schedule(Arc::clone(self).drain());
        }
    }

    /// One drain pass: pop and handle up to a quantum of envelopes while
    /// holding the actor cell, then yield the worker.
    fn drain(self: Arc<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let quantum = self.dispatcher.throughput();
            let mut cell = self.cell.lock().await;
            for _ in 0..quantum {
                match self.mailbox.try_pop() {
                    Some(env) => self.handle(&mut cell, env).await,
                    None => {
                        drop(cell);
                        self.mailbox.release();
                        // a producer may have pushed between the failed pop
                        // and the release; re-claim so nothing strands
                        if !self.mailbox.is_empty() && self.mailbox.try_claim() {
                            self.dispatcher.schedule(Arc::clone(&self).drain());
                        }
                        return;
                    }
                }
            }
            // quantum exhausted: yield the worker, keep the claim
            drop(cell);
            self.dispatcher.schedule(Arc::clone(&self).drain());
        })
    }

    async fn handle(self: &Arc<Self>, cell: &mut ActorCell, env: Envelope) {
        match env {
            Envelope::Task(task) => {
                let ActorCell { actor, ctx } = cell;
                // a panicking task must not unwind out of the drain, or the
                // claim flag would stay set and the mailbox would never run
                // again
                match AssertUnwindSafe(task.task.run(actor.as_mut(), ctx))
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(pid = %self.pid, error = %e, "mailbox task failed"),
                    Err(_) => warn!(pid = %self.pid, "mailbox task panicked"),
                }
            }
            Envelope::Actor(mut msg) => {
                if self.is_exiting() {
                    msg.complete(Err(HiveError::ProcessExiting {
                        pid: self.pid.to_string(),
                    }));
                    return;
                }
                if !msg.is_async
                    && msg.deadline_unix_secs != 0
                    && unix_now_secs() > msg.deadline_unix_secs
                {
                    warn!(pid = %self.pid, method = %msg.method, "dropping expired call");
                    msg.complete(Err(HiveError::deadline(msg.method.clone())));
                    return;
                }
                let ActorCell { actor, ctx } = cell;
                self.router.dispatch(actor.as_mut(), ctx, msg).await;
            }
        }
    }
}

/// First mailbox item of every process; a failed init stops the actor.
struct InitTask;

impl Task for InitTask {
    fn run<'a>(
        self: Box<Self>,
        actor: &'a mut dyn ActorObj,
        ctx: &'a mut Context,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if let Err(e) = actor.init(ctx).await {
                warn!(pid = %ctx.pid(), error = %e, "actor init failed, stopping");
                ctx.exit();
            }
            Ok(())
        })
    }
}

/// Final mailbox item: run the stop hook, unregister, ack.
struct StopTask {
    ack: Option<oneshot::Sender<()>>,
}

impl Task for StopTask {
    fn run<'a>(
        mut self: Box<Self>,
        actor: &'a mut dyn ActorObj,
        ctx: &'a mut Context,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if let Err(e) = actor.stop(ctx).await {
                warn!(pid = %ctx.pid(), error = %e, "actor stop hook failed");
            }
            if let Some(system) = ctx.system_ref() {
                system.remove_process(ctx.pid());
            }
            if let Some(ack) = self.ack.take() {
                let _ = ack.send(());
            }
            Ok(())
        })
    }
}
