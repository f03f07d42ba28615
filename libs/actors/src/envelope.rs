//! Mailbox Envelopes
//!
//! A mailbox carries two kinds of items: [`ActorMessage`]s addressed to
//! the actor, and [`TaskMessage`]s wrapping closures that must run on the
//! actor's execution context (init, timers, submitted tasks).

use crate::actor::ActorObj;
use crate::context::Context;
use futures::future::BoxFuture;
use hive_types::{ActorMessage, Result};
use std::fmt;

/// A unit of work executed on the owning actor's worker, with exclusive
/// access to the actor state and its context.
pub trait Task: Send + 'static {
    fn run<'a>(
        self: Box<Self>,
        actor: &'a mut dyn ActorObj,
        ctx: &'a mut Context,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Closure carrier posted through the mailbox
pub struct TaskMessage {
    pub(crate) task: Box<dyn Task>,
}

impl TaskMessage {
    pub fn new(task: impl Task) -> Self {
        Self {
            task: Box::new(task),
        }
    }

    /// Task from a synchronous closure. This is the common form for timer
    /// callbacks and submitted tasks that mutate actor state in place.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce(&mut dyn ActorObj, &mut Context) -> Result<()> + Send + 'static,
    {
        struct FnTask<F>(F);
        impl<F> Task for FnTask<F>
        where
            F: FnOnce(&mut dyn ActorObj, &mut Context) -> Result<()> + Send + 'static,
        {
            fn run<'a>(
                self: Box<Self>,
                actor: &'a mut dyn ActorObj,
                ctx: &'a mut Context,
            ) -> BoxFuture<'a, Result<()>> {
                Box::pin(async move { (self.0)(actor, ctx) })
            }
        }
        Self::new(FnTask(f))
    }

    /// Task from a higher-ranked async function. Use a `fn` item with the
    /// signature `fn task<'a>(&'a mut dyn ActorObj, &'a mut Context) ->
    /// BoxFuture<'a, Result<()>>`.
    pub fn from_async<F>(f: F) -> Self
    where
        F: for<'a> FnOnce(&'a mut dyn ActorObj, &'a mut Context) -> BoxFuture<'a, Result<()>>
            + Send
            + 'static,
    {
        struct AsyncTask<F>(F);
        impl<F> Task for AsyncTask<F>
        where
            F: for<'a> FnOnce(&'a mut dyn ActorObj, &'a mut Context) -> BoxFuture<'a, Result<()>>
                + Send
                + 'static,
        {
            fn run<'a>(
                self: Box<Self>,
                actor: &'a mut dyn ActorObj,
                ctx: &'a mut Context,
            ) -> BoxFuture<'a, Result<()>> {
                (self.0)(actor, ctx)
            }
        }
        Self::new(AsyncTask(f))
    }
}

impl fmt::Debug for TaskMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TaskMessage")
    }
}

/// Item queued in a mailbox
pub enum Envelope {
    Task(TaskMessage),
    Actor(ActorMessage),
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Envelope::Task(_) => f.write_str("Envelope::Task"),
            Envelope::Actor(msg) => f.debug_tuple("Envelope::Actor").field(msg).finish(),
        }
    }
}
