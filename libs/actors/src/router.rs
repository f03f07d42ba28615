//! Typed Message Routing
//!
//! Each actor type declares its methods once in [`Actor::register`]; the
//! resulting [`Router`] is built lazily and cached per `TypeId`, so every
//! instance of the type shares one route table. Handlers are plain
//! functions over the concrete actor type; the router erases them behind
//! a downcast and drives the codec at the boundary, so handler bodies see
//! typed requests and return typed responses.
//!
//! Handler functions are written as `fn` items so the higher-ranked
//! signature coerces without inference trouble:
//!
//! ```ignore
//! fn add<'a>(actor: &'a mut Calc, ctx: &'a mut Context, req: Add)
//!     -> BoxFuture<'a, Result<Sum>>
//! {
//!     Box::pin(async move { Ok(Sum { value: req.a + req.b }) })
//! }
//! ```

use crate::actor::{Actor, ActorObj};
use crate::context::Context;
use futures::future::BoxFuture;
use futures::FutureExt;
use hive_types::{ActorMessage, HiveError, Result, SessionInfo};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, warn};

/// How a registered method expects to be invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Fire-and-forget; any return payload is discarded
    Async,
    /// Request/reply; the return payload answers the call
    Sync,
}

trait ErasedHandler: Send + Sync {
    fn invoke<'a>(
        &'a self,
        actor: &'a mut dyn ActorObj,
        ctx: &'a mut Context,
        msg: &'a ActorMessage,
    ) -> BoxFuture<'a, Result<Vec<u8>>>;
}

fn downcast<'a, A: Actor>(actor: &'a mut dyn ActorObj, msg: &ActorMessage) -> Result<&'a mut A> {
    actor.as_any_mut().downcast_mut::<A>().ok_or_else(|| {
        HiveError::invalid_target(format!("{} routed to {}", msg.to, type_name::<A>()))
    })
}

struct AsyncHandler<A, Req, F> {
    f: F,
    _marker: PhantomData<fn(A, Req)>,
}

impl<A, Req, F> ErasedHandler for AsyncHandler<A, Req, F>
where
    A: Actor,
    Req: DeserializeOwned + Default + Send + 'static,
    F: for<'a> Fn(&'a mut A, &'a mut Context, Req) -> BoxFuture<'a, Result<()>>
        + Send
        + Sync
        + 'static,
{
    fn invoke<'a>(
        &'a self,
        actor: &'a mut dyn ActorObj,
        ctx: &'a mut Context,
        msg: &'a ActorMessage,
    ) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            let req: Req = ctx.codec().unmarshal(&msg.data)?;
            let actor = downcast::<A>(actor, msg)?;
            (self.f)(actor, ctx, req).await?;
            Ok(Vec::new())
        })
    }
}

struct SyncHandler<A, Req, Resp, F> {
    f: F,
    _marker: PhantomData<fn(A, Req) -> Resp>,
}

impl<A, Req, Resp, F> ErasedHandler for SyncHandler<A, Req, Resp, F>
where
    A: Actor,
    Req: DeserializeOwned + Default + Send + 'static,
    Resp: Serialize + Send + 'static,
    F: for<'a> Fn(&'a mut A, &'a mut Context, Req) -> BoxFuture<'a, Result<Resp>>
        + Send
        + Sync
        + 'static,
{
    fn invoke<'a>(
        &'a self,
        actor: &'a mut dyn ActorObj,
        ctx: &'a mut Context,
        msg: &'a ActorMessage,
    ) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            let codec = ctx.codec();
            let req: Req = codec.unmarshal(&msg.data)?;
            let actor = downcast::<A>(actor, msg)?;
            let resp = (self.f)(actor, ctx, req).await?;
            codec.marshal(&resp)
        })
    }
}

struct SessionHandler<A, Req, Resp, F> {
    f: F,
    _marker: PhantomData<fn(A, Req) -> Resp>,
}

impl<A, Req, Resp, F> ErasedHandler for SessionHandler<A, Req, Resp, F>
where
    A: Actor,
    Req: DeserializeOwned + Default + Send + 'static,
    Resp: Serialize + Send + 'static,
    F: for<'a> Fn(&'a mut A, &'a mut Context, SessionInfo, Req) -> BoxFuture<'a, Result<Resp>>
        + Send
        + Sync
        + 'static,
{
    fn invoke<'a>(
        &'a self,
        actor: &'a mut dyn ActorObj,
        ctx: &'a mut Context,
        msg: &'a ActorMessage,
    ) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            let session = msg.session.clone().ok_or_else(|| HiveError::SessionRequired {
                method: msg.method.clone(),
            })?;
            let codec = ctx.codec();
            let req: Req = codec.unmarshal(&msg.data)?;
            let actor = downcast::<A>(actor, msg)?;
            let resp = (self.f)(actor, ctx, session, req).await?;
            codec.marshal(&resp)
        })
    }
}

/// Handler over the raw message envelope; owns the reply slot, so it can
/// forward the message wholesale instead of answering it.
trait ErasedRawHandler: Send + Sync {
    fn invoke<'a>(
        &'a self,
        actor: &'a mut dyn ActorObj,
        ctx: &'a mut Context,
        msg: ActorMessage,
    ) -> BoxFuture<'a, Result<()>>;
}

struct RawHandler<A, F> {
    f: F,
    _marker: PhantomData<fn(A)>,
}

impl<A, F> ErasedRawHandler for RawHandler<A, F>
where
    A: Actor,
    F: for<'a> Fn(&'a mut A, &'a mut Context, ActorMessage) -> BoxFuture<'a, Result<()>>
        + Send
        + Sync
        + 'static,
{
    fn invoke<'a>(
        &'a self,
        actor: &'a mut dyn ActorObj,
        ctx: &'a mut Context,
        msg: ActorMessage,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut msg = msg;
            let actor = match downcast::<A>(actor, &msg) {
                Ok(actor) => actor,
                Err(e) => {
                    msg.complete(Err(e.clone()));
                    return Err(e);
                }
            };
            (self.f)(actor, ctx, msg).await
        })
    }
}

enum HandlerBody {
    Typed(Box<dyn ErasedHandler>),
    Raw(Box<dyn ErasedRawHandler>),
}

struct Entry {
    kind: HandlerKind,
    require_session: bool,
    handler: HandlerBody,
}

/// Route table for one actor type
pub struct Router {
    actor_type: &'static str,
    handlers: HashMap<String, Entry>,
}

impl Router {
    pub fn new(actor_type: &'static str) -> Self {
        Self {
            actor_type,
            handlers: HashMap::new(),
        }
    }

    pub fn actor_type(&self) -> &'static str {
        self.actor_type
    }

    pub fn kind_of(&self, method: &str) -> Option<HandlerKind> {
        self.handlers.get(method).map(|e| e.kind)
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    fn insert(&mut self, method: &str, entry: Entry) -> Result<()> {
        if method.is_empty() {
            return Err(HiveError::EmptyMethod);
        }
        if self.handlers.contains_key(method) {
            return Err(HiveError::DuplicateMethod {
                method: method.to_string(),
            });
        }
        self.handlers.insert(method.to_string(), entry);
        Ok(())
    }

    /// Register a fire-and-forget method
    pub fn handle_async<A, Req, F>(&mut self, method: &str, f: F) -> Result<()>
    where
        A: Actor,
        Req: DeserializeOwned + Default + Send + 'static,
        F: for<'a> Fn(&'a mut A, &'a mut Context, Req) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.insert(
            method,
            Entry {
                kind: HandlerKind::Async,
                require_session: false,
                handler: HandlerBody::Typed(Box::new(AsyncHandler {
                    f,
                    _marker: PhantomData,
                })),
            },
        )
    }

    /// Register a request/reply method
    pub fn handle_sync<A, Req, Resp, F>(&mut self, method: &str, f: F) -> Result<()>
    where
        A: Actor,
        Req: DeserializeOwned + Default + Send + 'static,
        Resp: Serialize + Send + 'static,
        F: for<'a> Fn(&'a mut A, &'a mut Context, Req) -> BoxFuture<'a, Result<Resp>>
            + Send
            + Sync
            + 'static,
    {
        self.insert(
            method,
            Entry {
                kind: HandlerKind::Sync,
                require_session: false,
                handler: HandlerBody::Typed(Box::new(SyncHandler {
                    f,
                    _marker: PhantomData,
                })),
            },
        )
    }

    /// Register a request/reply method that only accepts client-originated
    /// messages carrying gateway session metadata
    pub fn handle_session<A, Req, Resp, F>(&mut self, method: &str, f: F) -> Result<()>
    where
        A: Actor,
        Req: DeserializeOwned + Default + Send + 'static,
        Resp: Serialize + Send + 'static,
        F: for<'a> Fn(&'a mut A, &'a mut Context, SessionInfo, Req) -> BoxFuture<'a, Result<Resp>>
            + Send
            + Sync
            + 'static,
    {
        self.insert(
            method,
            Entry {
                kind: HandlerKind::Sync,
                require_session: true,
                handler: HandlerBody::Typed(Box::new(SessionHandler {
                    f,
                    _marker: PhantomData,
                })),
            },
        )
    }

    /// Register a method over the raw message envelope. The handler owns
    /// the reply slot: it may answer via `complete`, forward the message
    /// onward, or drop it (the caller then times out).
    pub fn handle_raw<A, F>(&mut self, method: &str, f: F) -> Result<()>
    where
        A: Actor,
        F: for<'a> Fn(&'a mut A, &'a mut Context, ActorMessage) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.insert(
            method,
            Entry {
                kind: HandlerKind::Sync,
                require_session: false,
                handler: HandlerBody::Raw(Box::new(RawHandler {
                    f,
                    _marker: PhantomData,
                })),
            },
        )
    }

    /// Run the handler for one message and settle its reply slot.
    ///
    /// A handler panic is caught here and surfaced as an error response so
    /// the caller never hangs and the process survives.
    pub(crate) async fn dispatch(
        &self,
        actor: &mut dyn ActorObj,
        ctx: &mut Context,
        mut msg: ActorMessage,
    ) {
        let entry = match self.handlers.get(&msg.method) {
            Some(entry) => entry,
            None => {
                // unrouted method: fall through to the actor's generic
                // message hook, which by default rejects the message
                warn!(
                    actor = self.actor_type,
                    method = %msg.method,
                    from = %msg.from,
                    "no route for method, using the fallback"
                );
                let outcome = match AssertUnwindSafe(actor.message(ctx, &msg))
                    .catch_unwind()
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        error!(actor = self.actor_type, method = %msg.method, "fallback panicked");
                        Err(HiveError::HandlerPanic {
                            method: msg.method.clone(),
                        })
                    }
                };
                if msg.is_async {
                    if let Err(e) = outcome {
                        warn!(
                            actor = self.actor_type,
                            method = %msg.method,
                            error = %e,
                            "fallback failed"
                        );
                    }
                } else {
                    msg.complete(outcome);
                }
                return;
            }
        };

        if entry.require_session && msg.session.is_none() {
            let err = HiveError::SessionRequired {
                method: msg.method.clone(),
            };
            warn!(actor = self.actor_type, method = %msg.method, "message lacks session metadata");
            msg.complete(Err(err));
            return;
        }

        match &entry.handler {
            HandlerBody::Typed(handler) => {
                let outcome = match AssertUnwindSafe(handler.invoke(actor, ctx, &msg))
                    .catch_unwind()
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        error!(actor = self.actor_type, method = %msg.method, "handler panicked");
                        Err(HiveError::HandlerPanic {
                            method: msg.method.clone(),
                        })
                    }
                };

                if msg.is_async {
                    if let Err(e) = outcome {
                        warn!(
                            actor = self.actor_type,
                            method = %msg.method,
                            category = e.category(),
                            error = %e,
                            "async handler failed"
                        );
                    }
                } else {
                    msg.complete(outcome);
                }
            }
            HandlerBody::Raw(handler) => {
                let method = msg.method.clone();
                // the envelope moves into the handler; a panic here loses
                // the reply slot and the caller times out
                match AssertUnwindSafe(handler.invoke(actor, ctx, msg))
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(
                            actor = self.actor_type,
                            method = %method,
                            category = e.category(),
                            error = %e,
                            "raw handler failed"
                        );
                    }
                    Err(_) => {
                        error!(actor = self.actor_type, method = %method, "raw handler panicked");
                    }
                }
            }
        }
    }
}

static ROUTERS: Lazy<RwLock<HashMap<TypeId, Arc<Router>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Router for an actor type, built on first use and cached process-wide
pub fn router_for<A: Actor>() -> Arc<Router> {
    let id = TypeId::of::<A>();
    if let Some(router) = ROUTERS.read().get(&id) {
        return Arc::clone(router);
    }
    let mut routers = ROUTERS.write();
    Arc::clone(routers.entry(id).or_insert_with(|| {
        let mut router = Router::new(type_name::<A>());
        if let Err(e) = A::register(&mut router) {
            error!(actor = router.actor_type, error = %e, "route registration failed");
        }
        Arc::new(router)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hive_codec::Codec;
    use hive_types::Pid;
    use serde::Deserialize;

    #[derive(Default)]
    struct Counter {
        total: i64,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Add {
        n: i64,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Total {
        total: i64,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct WhoAmI {
        agent_id: u64,
        session_id: u64,
    }

    fn add<'a>(
        actor: &'a mut Counter,
        _ctx: &'a mut Context,
        req: Add,
    ) -> BoxFuture<'a, Result<Total>> {
        Box::pin(async move {
            actor.total += req.n;
            Ok(Total { total: actor.total })
        })
    }

    fn bump<'a>(
        actor: &'a mut Counter,
        _ctx: &'a mut Context,
        req: Add,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            actor.total += req.n;
            Ok(())
        })
    }

    fn explode<'a>(
        _actor: &'a mut Counter,
        _ctx: &'a mut Context,
        _req: Add,
    ) -> BoxFuture<'a, Result<Total>> {
        Box::pin(async move { panic!("kaboom") })
    }

    fn raw_echo<'a>(
        _actor: &'a mut Counter,
        _ctx: &'a mut Context,
        mut msg: ActorMessage,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let data = msg.data.clone();
            msg.complete(Ok(data));
            Ok(())
        })
    }

    fn whoami<'a>(
        _actor: &'a mut Counter,
        _ctx: &'a mut Context,
        session: SessionInfo,
        _req: Add,
    ) -> BoxFuture<'a, Result<WhoAmI>> {
        Box::pin(async move {
            Ok(WhoAmI {
                agent_id: session.agent_id,
                session_id: session.session_id,
            })
        })
    }

    #[async_trait]
    impl Actor for Counter {
        fn register(router: &mut Router) -> Result<()> {
            router.handle_sync::<Counter, Add, Total, _>("add", add)?;
            router.handle_async::<Counter, Add, _>("bump", bump)?;
            router.handle_sync::<Counter, Add, Total, _>("explode", explode)?;
            router.handle_session::<Counter, Add, WhoAmI, _>("whoami", whoami)?;
            router.handle_raw::<Counter, _>("raw_echo", raw_echo)?;
            Ok(())
        }

        async fn on_message(&mut self, _ctx: &mut Context, msg: &ActorMessage) -> Result<Vec<u8>> {
            if msg.method == "echo" {
                return Ok(msg.data.clone());
            }
            Err(HiveError::HandlerNotFound {
                method: msg.method.clone(),
            })
        }
    }

    fn call_msg(method: &str, data: Vec<u8>) -> ActorMessage {
        ActorMessage::call(Pid::local(1, 2), Pid::local(1, 1), method, data, 0)
    }

    async fn dispatch_and_collect(
        router: &Router,
        actor: &mut Counter,
        mut msg: ActorMessage,
    ) -> Result<Vec<u8>> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        msg.respond = Some(Box::new(move |out| {
            let _ = tx.send(out);
        }));
        let mut ctx = Context::detached(Pid::local(1, 1), Codec::Json);
        router.dispatch(actor, &mut ctx, msg).await;
        rx.await.expect("reply slot settled")
    }

    #[tokio::test]
    async fn sync_handler_round_trip() {
        let router = router_for::<Counter>();
        let mut actor = Counter::default();

        let data = serde_json::to_vec(&Add { n: 4 }).unwrap();
        let out = dispatch_and_collect(&router, &mut actor, call_msg("add", data))
            .await
            .unwrap();
        let total: Total = serde_json::from_slice(&out).unwrap();
        assert_eq!(total.total, 4);
        assert_eq!(actor.total, 4);
    }

    #[tokio::test]
    async fn async_handler_mutates_without_reply() {
        let router = router_for::<Counter>();
        let mut actor = Counter::default();
        let mut ctx = Context::detached(Pid::local(1, 1), Codec::Json);

        let msg = ActorMessage::send(
            Pid::local(1, 2),
            Pid::local(1, 1),
            "bump",
            serde_json::to_vec(&Add { n: 7 }).unwrap(),
        );
        router.dispatch(&mut actor, &mut ctx, msg).await;
        assert_eq!(actor.total, 7);
    }

    #[tokio::test]
    async fn unknown_method_settles_with_error() {
        let router = router_for::<Counter>();
        let mut actor = Counter::default();

        let err = dispatch_and_collect(&router, &mut actor, call_msg("missing", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, HiveError::HandlerNotFound { .. }));
    }

    #[tokio::test]
    async fn unrouted_method_falls_through_to_the_message_hook() {
        let router = router_for::<Counter>();
        let mut actor = Counter::default();

        let out = dispatch_and_collect(&router, &mut actor, call_msg("echo", b"back".to_vec()))
            .await
            .unwrap();
        assert_eq!(out, b"back");
    }

    #[tokio::test]
    async fn panicking_handler_settles_with_error() {
        let router = router_for::<Counter>();
        let mut actor = Counter::default();

        let err = dispatch_and_collect(&router, &mut actor, call_msg("explode", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, HiveError::HandlerPanic { .. }));
    }

    #[tokio::test]
    async fn session_method_rejects_bare_messages() {
        let router = router_for::<Counter>();
        let mut actor = Counter::default();

        let err = dispatch_and_collect(&router, &mut actor, call_msg("whoami", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, HiveError::SessionRequired { .. }));
    }

    #[tokio::test]
    async fn session_method_sees_metadata() {
        let router = router_for::<Counter>();
        let mut actor = Counter::default();

        let mut msg = call_msg("whoami", vec![]);
        msg.session = Some(SessionInfo::new(11, 42, 1));
        let out = dispatch_and_collect(&router, &mut actor, msg).await.unwrap();
        let who: WhoAmI = serde_json::from_slice(&out).unwrap();
        assert_eq!((who.agent_id, who.session_id), (11, 42));
    }

    #[tokio::test]
    async fn raw_handler_owns_the_reply_slot() {
        let router = router_for::<Counter>();
        let mut actor = Counter::default();

        let out = dispatch_and_collect(&router, &mut actor, call_msg("raw_echo", b"asis".to_vec()))
            .await
            .unwrap();
        assert_eq!(out, b"asis");
    }

    #[test]
    fn duplicate_method_rejected() {
        let mut router = Router::new("test");
        router.handle_sync::<Counter, Add, Total, _>("add", add).unwrap();
        let err = router
            .handle_sync::<Counter, Add, Total, _>("add", add)
            .unwrap_err();
        assert!(matches!(err, HiveError::DuplicateMethod { .. }));
    }

    #[test]
    fn empty_method_rejected() {
        let mut router = Router::new("test");
        let err = router
            .handle_sync::<Counter, Add, Total, _>("", add)
            .unwrap_err();
        assert!(matches!(err, HiveError::EmptyMethod));
    }

    #[test]
    fn router_cache_is_per_type() {
        let a = router_for::<Counter>();
        let b = router_for::<Counter>();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.kind_of("add"), Some(HandlerKind::Sync));
        assert_eq!(a.kind_of("bump"), Some(HandlerKind::Async));
        assert_eq!(a.kind_of("missing"), None);
    }
}
