//! Cluster Runtime
//!
//! [`Cluster`] glues one node's [`System`] to the bus and the discovery
//! registry. Outbound, it implements the system's [`Remote`] seam:
//! messages for other nodes are serialized with the node codec and
//! published (or requested) on the target's topic. Inbound, the node
//! topic's handler deserializes messages back into the local system, with
//! the reply path of a request bridged onto the message's reply slot.
//!
//! Globally registered actor names surface as discovery tags on this
//! node's member record, so `gen_pid("auth")` on any node resolves to a
//! pid for some node advertising `auth`.

use crate::bus::{BusHandler, MemoryBus, MessageQueue, ReplyFn};
use crate::discovery::{Discovery, MemoryDiscovery};
use async_trait::async_trait;
use hive_actors::{Remote, RouteStrategy, System};
use hive_codec::Codec;
use hive_config::{ClusterSettings, ProviderSettings};
use hive_types::{split_name, ActorMessage, HiveError, Member, NodeId, Pid, Response, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Tunables for the overlay, usually taken from the cluster config section
#[derive(Debug, Clone)]
pub struct ClusterOptions {
    /// Per-node topic prefix; the node id is appended
    pub node_subject_prefix: String,
    /// Member selection policy for service-name routing
    pub strategy: RouteStrategy,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            node_subject_prefix: "cluster.node.".to_string(),
            strategy: RouteStrategy::default(),
        }
    }
}

impl ClusterOptions {
    pub fn from_settings(settings: &ClusterSettings) -> Self {
        Self {
            node_subject_prefix: settings.node_subject_prefix.clone(),
            ..Self::default()
        }
    }
}

/// Build a discovery backend from its configuration section.
pub fn discovery_from_settings(settings: &ProviderSettings) -> anyhow::Result<Arc<dyn Discovery>> {
    match settings.provider.as_str() {
        "memory" => Ok(Arc::new(MemoryDiscovery::default())),
        other => anyhow::bail!("unknown discovery provider: {other}"),
    }
}

/// Build a message-queue backend from its configuration section.
pub fn bus_from_settings(settings: &ProviderSettings) -> anyhow::Result<Arc<dyn MessageQueue>> {
    match settings.provider.as_str() {
        "memory" => Ok(Arc::new(MemoryBus::default())),
        other => anyhow::bail!("unknown message queue provider: {other}"),
    }
}

struct ClusterInner {
    system: System,
    member: RwLock<Member>,
    discovery: Arc<dyn Discovery>,
    bus: Arc<dyn MessageQueue>,
    prefix: String,
    strategy: RouteStrategy,
    cursors: Mutex<HashMap<String, Arc<AtomicUsize>>>,
    service_cache: RwLock<HashMap<String, Vec<Member>>>,
    watched: Mutex<HashSet<String>>,
}

/// Handle to this node's cluster overlay
#[derive(Clone)]
pub struct Cluster {
    inner: Arc<ClusterInner>,
}

impl Cluster {
    /// Join the cluster: subscribe the node topic, publish the member
    /// record, and install this overlay as the system's remote transport.
    pub async fn start(
        system: System,
        member: Member,
        discovery: Arc<dyn Discovery>,
        bus: Arc<dyn MessageQueue>,
        options: ClusterOptions,
    ) -> Result<Cluster> {
        let cluster = Cluster {
            inner: Arc::new(ClusterInner {
                system: system.clone(),
                member: RwLock::new(member.clone()),
                discovery,
                bus,
                prefix: options.node_subject_prefix,
                strategy: options.strategy,
                cursors: Mutex::new(HashMap::new()),
                service_cache: RwLock::new(HashMap::new()),
                watched: Mutex::new(HashSet::new()),
            }),
        };

        cluster.subscribe_inbound().await?;
        cluster.inner.discovery.register(member).await?;
        system.set_remote(Arc::new(cluster.clone()));

        info!(
            node = system.node_id(),
            topic = %cluster.topic(system.node_id()),
            "cluster overlay started"
        );
        Ok(cluster)
    }

    /// Bus topic carrying traffic for a node.
    pub fn topic(&self, node: NodeId) -> String {
        format!("{}{}", self.inner.prefix, node)
    }

    /// Snapshot of this node's member record.
    pub fn local_member(&self) -> Member {
        self.inner.member.read().clone()
    }

    /// Another node's member record.
    pub async fn member_of(&self, node: NodeId) -> Result<Member> {
        self.inner
            .discovery
            .member(node)
            .await?
            .ok_or(HiveError::NoMember { node })
    }

    /// Members advertising a service tag, kept fresh by a discovery watch.
    ///
    /// The first lookup for a tag installs a listener that rewrites the
    /// cached set on every membership change touching it; later lookups
    /// read the cache.
    async fn advertisers(&self, canonical: &str) -> Result<Vec<Member>> {
        if let Some(members) = self.inner.service_cache.read().get(canonical) {
            return Ok(members.clone());
        }
        let first_watch = self.inner.watched.lock().insert(canonical.to_string());
        if first_watch {
            // weak handle: a dropped overlay must not be kept alive by
            // its own listener
            let slot = Arc::downgrade(&self.inner);
            let tag = canonical.to_string();
            self.inner
                .discovery
                .subscribe(
                    canonical,
                    Arc::new(move |members| {
                        if let Some(inner) = slot.upgrade() {
                            inner.service_cache.write().insert(tag.clone(), members);
                        }
                    }),
                )
                .await?;
        }
        let members = self.inner.discovery.members_with_tag(canonical).await?;
        if first_watch {
            // the listener may already have written a fresher set
            self.inner
                .service_cache
                .write()
                .entry(canonical.to_string())
                .or_insert_with(|| members.clone());
        }
        Ok(members)
    }

    /// Pick a member advertising a service name. A per-call strategy
    /// overrides the configured one. Accepts the `@`-marked spelling.
    pub async fn select(
        &self,
        service: &str,
        strategy: Option<RouteStrategy>,
    ) -> Result<Member> {
        let (canonical, _) = split_name(service);
        let members = self.advertisers(canonical).await?;
        let cursor = {
            let mut cursors = self.inner.cursors.lock();
            Arc::clone(cursors.entry(canonical.to_string()).or_default())
        };
        strategy
            .unwrap_or(self.inner.strategy)
            .pick(&members, &cursor)
            .cloned()
            .ok_or_else(|| HiveError::NoNodesForService {
                service: canonical.to_string(),
            })
    }

    /// Resolve a service name to an addressable pid. A locally registered
    /// name wins; otherwise some advertising node is picked and the target
    /// binds the name to a process on delivery.
    pub async fn gen_pid(&self, service: &str, strategy: Option<RouteStrategy>) -> Result<Pid> {
        let (canonical, _) = split_name(service);
        if let Some(pid) = self.inner.system.pid_of(canonical) {
            return Ok(pid);
        }
        let member = self.select(service, strategy).await?;
        let mut pid = Pid::named(member.id, canonical);
        pid.global = true;
        Ok(pid)
    }

    /// Fire-and-forget to every node advertising a service name; local
    /// targets short-circuit the bus. Returns the number of nodes reached.
    pub async fn broadcast(
        &self,
        from: Pid,
        service: &str,
        method: &str,
        data: Vec<u8>,
    ) -> Result<usize> {
        let (canonical, _) = split_name(service);
        let members = self.advertisers(canonical).await?;
        let mut delivered = 0;
        for member in members {
            let mut to = Pid::named(member.id, canonical);
            to.global = true;
            let msg = ActorMessage::send(from.clone(), to, method, data.clone());
            let outcome = if member.id == self.inner.system.node_id() {
                self.inner.system.route(msg).await
            } else {
                self.publish(msg).await
            };
            match outcome {
                Ok(()) => delivered += 1,
                Err(e) => warn!(node = member.id, error = %e, "broadcast delivery failed"),
            }
        }
        Ok(delivered)
    }

    /// Mutate and re-publish this node's member record.
    pub async fn update_member<F: FnOnce(&mut Member)>(&self, mutate: F) -> Result<()> {
        let snapshot = {
            let mut member = self.inner.member.write();
            mutate(&mut member);
            member.clone()
        };
        self.inner.discovery.register(snapshot).await
    }

    /// Leave the cluster: stop consuming the node topic and retract the
    /// member record.
    pub async fn stop(&self) -> Result<()> {
        let node = self.inner.system.node_id();
        self.inner.bus.unsubscribe(&self.topic(node)).await?;
        self.inner.discovery.deregister(node).await
    }

    fn codec(&self) -> Codec {
        self.inner.system.codec()
    }

    async fn publish(&self, msg: ActorMessage) -> Result<()> {
        let topic = self.topic(msg.to.node_id);
        let payload = self.codec().marshal(&msg)?;
        self.inner.bus.publish(&topic, payload).await
    }

    async fn subscribe_inbound(&self) -> Result<()> {
        let topic = self.topic(self.inner.system.node_id());
        let system = self.inner.system.clone();
        let handler: BusHandler = Arc::new(move |payload, reply| {
            let system = system.clone();
            Box::pin(async move { handle_inbound(system, payload, reply).await })
        });
        self.inner.bus.subscribe(&topic, handler).await
    }
}

/// Deserialize one inbound message and route it into the local system.
///
/// For requests the bus reply path is shared between the message's reply
/// slot and the routing-failure path, so the requester always hears back;
/// whichever fires first consumes it.
async fn handle_inbound(system: System, payload: Vec<u8>, reply: Option<ReplyFn>) -> Result<()> {
    let codec = system.codec();
    let mut msg: ActorMessage = codec.unmarshal(&payload)?;

    let Some(reply) = reply else {
        return system.route(msg).await;
    };

    let reply_slot = Arc::new(Mutex::new(Some(reply)));
    let respond_slot = Arc::clone(&reply_slot);
    msg.is_async = false;
    msg.respond = Some(Box::new(move |outcome| {
        let resp = match outcome {
            Ok(data) => Response::ok(data),
            Err(e) => Response::failure(wire_error(&e)),
        };
        if let Some(reply) = respond_slot.lock().take() {
            send_reply(codec, reply, &resp);
        }
    }));

    if let Err(e) = system.route(msg).await {
        warn!(error = %e, "inbound message could not be routed");
        if let Some(reply) = reply_slot.lock().take() {
            send_reply(codec, reply, &Response::failure(wire_error(&e)));
        }
    }
    Ok(())
}

/// Wire form of a handler failure. The caller re-wraps whatever string it
/// receives, so an error that is already remote ships its message only;
/// anything else keeps its full rendering.
fn wire_error(e: &HiveError) -> String {
    match e {
        HiveError::Remote { message } => message.clone(),
        other => other.to_string(),
    }
}

fn send_reply(codec: Codec, reply: ReplyFn, resp: &Response) {
    match codec.marshal(resp) {
        Ok(bytes) => {
            if let Err(e) = reply(bytes) {
                warn!(error = %e, "bus reply delivery failed");
            }
        }
        Err(e) => warn!(error = %e, "reply marshal failed"),
    }
}

#[async_trait]
impl Remote for Cluster {
    async fn send(&self, msg: ActorMessage) -> Result<()> {
        self.publish(msg).await
    }

    async fn call(&self, msg: ActorMessage, timeout: Duration) -> Result<Vec<u8>> {
        let topic = self.topic(msg.to.node_id);
        let codec = self.codec();
        let payload = codec.marshal(&msg)?;
        let raw = self.inner.bus.request(&topic, payload, timeout).await?;
        let resp: Response = codec.unmarshal(&raw)?;
        resp.into_result()
    }

    async fn update_tag(&self, name: &str, present: bool) -> Result<()> {
        self.update_member(|member| {
            if present {
                member.tags.insert(name.to_string());
            } else {
                member.tags.remove(name);
            }
        })
        .await
    }
}
