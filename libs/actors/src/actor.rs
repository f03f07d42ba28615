//! Actor Traits
//!
//! [`Actor`] is the user-facing trait: implement lifecycle hooks and
//! declare message routes in [`Actor::register`]. [`ActorObj`] is the
//! object-safe erasure the runtime stores and drives; it is blanket
//! implemented for every `Actor`, so user code never touches it directly.

use crate::context::Context;
use crate::router::Router;
use async_trait::async_trait;
use futures::future::BoxFuture;
use hive_types::{ActorMessage, HiveError, Result};
use std::any::Any;

/// A unit of single-threaded state driven by its mailbox.
///
/// All hooks and handlers run on the actor's drain worker with exclusive
/// access to `self`; they never overlap with each other.
#[async_trait]
pub trait Actor: Send + 'static {
    /// Declare the message routes for this actor type. Called once per
    /// type; the resulting router is cached and shared by every instance.
    fn register(router: &mut Router) -> Result<()>
    where
        Self: Sized,
    {
        let _ = router;
        Ok(())
    }

    /// Runs as the first mailbox item, before any message is handled.
    async fn on_init(&mut self, ctx: &mut Context) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Fallback for messages whose method has no registered route. The
    /// returned bytes answer a synchronous caller; the default rejects
    /// the message so callers never hang on a typo'd method.
    async fn on_message(&mut self, ctx: &mut Context, msg: &ActorMessage) -> Result<Vec<u8>> {
        let _ = ctx;
        Err(HiveError::HandlerNotFound {
            method: msg.method.clone(),
        })
    }

    /// Runs as the last mailbox item, after the exit was requested and
    /// before the process is unregistered.
    async fn on_stop(&mut self, ctx: &mut Context) -> Result<()> {
        let _ = ctx;
        Ok(())
    }
}

/// Object-safe view of an actor held by its process
pub trait ActorObj: Send + 'static {
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn init<'a>(&'a mut self, ctx: &'a mut Context) -> BoxFuture<'a, Result<()>>;

    fn message<'a>(
        &'a mut self,
        ctx: &'a mut Context,
        msg: &'a ActorMessage,
    ) -> BoxFuture<'a, Result<Vec<u8>>>;

    fn stop<'a>(&'a mut self, ctx: &'a mut Context) -> BoxFuture<'a, Result<()>>;
}

impl<A: Actor> ActorObj for A {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn init<'a>(&'a mut self, ctx: &'a mut Context) -> BoxFuture<'a, Result<()>> {
        self.on_init(ctx)
    }

    fn message<'a>(
        &'a mut self,
        ctx: &'a mut Context,
        msg: &'a ActorMessage,
    ) -> BoxFuture<'a, Result<Vec<u8>>> {
        self.on_message(ctx, msg)
    }

    fn stop<'a>(&'a mut self, ctx: &'a mut Context) -> BoxFuture<'a, Result<()>> {
        self.on_stop(ctx)
    }
}
