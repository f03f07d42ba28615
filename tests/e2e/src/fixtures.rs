//! Test Mesh and Actors
//!
//! A [`Mesh`] is one in-memory discovery registry plus one in-memory bus;
//! every node started from it joins the same overlay. The actors here
//! cover the message shapes the scenarios need: fire-and-forget state
//! mutation, request/reply, slow handlers, session inspection, and raw
//! forwarding.

use futures::future::BoxFuture;
use hive_actors::{Actor, Context, Router, System};
use hive_cluster::{Cluster, ClusterOptions, MemoryBus, MemoryDiscovery};
use hive_codec::Codec;
use hive_types::{ActorMessage, Member, NodeId, Pid, Result, SessionInfo};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Shared backends for one test topology
#[derive(Clone, Default)]
pub struct Mesh {
    pub discovery: MemoryDiscovery,
    pub bus: MemoryBus,
}

/// One node: its actor system joined to the mesh
pub struct Node {
    pub system: System,
    pub cluster: Cluster,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn node(&self, id: NodeId, kind: &str) -> Node {
        self.node_with_codec(id, kind, Codec::Json).await
    }

    pub async fn node_with_codec(&self, id: NodeId, kind: &str, codec: Codec) -> Node {
        let system = System::new(id, codec);
        let member = Member::new(id, kind).with_endpoint("127.0.0.1", 7000 + id as u16);
        let cluster = Cluster::start(
            system.clone(),
            member,
            Arc::new(self.discovery.clone()),
            Arc::new(self.bus.clone()),
            ClusterOptions::default(),
        )
        .await
        .expect("cluster start");
        Node { system, cluster }
    }
}

/// Tag publications run off the spawn path; wait for them to land.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// --- Greeter: fire-and-forget counting ---

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Greet {
    pub who: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GreetStats {
    pub greeted: u32,
    pub last: String,
}

#[derive(Default)]
pub struct Greeter {
    greeted: u32,
    last: String,
}

fn greet<'a>(actor: &'a mut Greeter, _ctx: &'a mut Context, req: Greet) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        actor.greeted += 1;
        actor.last = req.who;
        Ok(())
    })
}

fn greet_stats<'a>(
    actor: &'a mut Greeter,
    _ctx: &'a mut Context,
    _req: Greet,
) -> BoxFuture<'a, Result<GreetStats>> {
    Box::pin(async move {
        Ok(GreetStats {
            greeted: actor.greeted,
            last: actor.last.clone(),
        })
    })
}

impl Actor for Greeter {
    fn register(router: &mut Router) -> Result<()> {
        router.handle_async::<Greeter, Greet, _>("greet", greet)?;
        router.handle_sync::<Greeter, Greet, GreetStats, _>("stats", greet_stats)?;
        Ok(())
    }
}

// --- Calc: request/reply, with a deliberately slow variant ---

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AddReq {
    pub a: i64,
    pub b: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AddResp {
    pub sum: i64,
}

#[derive(Default)]
pub struct Calc;

fn add<'a>(_actor: &'a mut Calc, _ctx: &'a mut Context, req: AddReq) -> BoxFuture<'a, Result<AddResp>> {
    Box::pin(async move {
        Ok(AddResp {
            sum: req.a + req.b,
        })
    })
}

fn slow_add<'a>(
    _actor: &'a mut Calc,
    _ctx: &'a mut Context,
    req: AddReq,
) -> BoxFuture<'a, Result<AddResp>> {
    Box::pin(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(AddResp {
            sum: req.a + req.b,
        })
    })
}

impl Actor for Calc {
    fn register(router: &mut Router) -> Result<()> {
        router.handle_sync::<Calc, AddReq, AddResp, _>("add", add)?;
        router.handle_sync::<Calc, AddReq, AddResp, _>("slow_add", slow_add)?;
        Ok(())
    }
}

// --- Auth: the cluster-visible login service ---

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LoginReq {
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LoginResp {
    pub token: String,
}

/// What the auth actor saw on the wire; used to assert that forwarding
/// preserves the envelope.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Inspection {
    pub from: String,
    pub session: Option<SessionInfo>,
    pub data: Vec<u8>,
}

#[derive(Default)]
pub struct Auth {
    pub logins: u32,
}

fn login<'a>(actor: &'a mut Auth, _ctx: &'a mut Context, req: LoginReq) -> BoxFuture<'a, Result<LoginResp>> {
    Box::pin(async move {
        actor.logins += 1;
        Ok(LoginResp {
            token: format!("token-{}-{}", req.user, actor.logins),
        })
    })
}

fn inspect<'a>(
    _actor: &'a mut Auth,
    ctx: &'a mut Context,
    mut msg: ActorMessage,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let report = Inspection {
            from: msg.from.to_string(),
            session: msg.session.clone(),
            data: msg.data.clone(),
        };
        let outcome = ctx.codec().marshal(&report);
        msg.complete(outcome);
        Ok(())
    })
}

impl Actor for Auth {
    fn register(router: &mut Router) -> Result<()> {
        router.handle_sync::<Auth, LoginReq, LoginResp, _>("login", login)?;
        router.handle_raw::<Auth, _>("inspect", inspect)?;
        Ok(())
    }
}

// --- Gate: forwards whatever it receives to its upstream ---

pub struct Gate {
    pub upstream: Pid,
}

fn relay_check<'a>(
    actor: &'a mut Gate,
    ctx: &'a mut Context,
    msg: ActorMessage,
) -> BoxFuture<'a, Result<()>> {
    let upstream = actor.upstream.clone();
    // the method is rewritten on the hop: "check" in, "inspect" upstream
    Box::pin(async move { ctx.forward(msg, upstream, "inspect").await })
}

fn relay_login<'a>(
    actor: &'a mut Gate,
    ctx: &'a mut Context,
    msg: ActorMessage,
) -> BoxFuture<'a, Result<()>> {
    let upstream = actor.upstream.clone();
    Box::pin(async move { ctx.forward(msg, upstream, "login").await })
}

impl Actor for Gate {
    fn register(router: &mut Router) -> Result<()> {
        router.handle_raw::<Gate, _>("check", relay_check)?;
        router.handle_raw::<Gate, _>("login", relay_login)?;
        Ok(())
    }
}

pub fn json<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("serialize fixture payload")
}
