//! Node-Local Actor System
//!
//! The [`System`] owns every process spawned on this node: it assigns
//! service ids, keeps the name registry, routes messages, and drives
//! shutdown. It is a cheap clonable handle; contexts hold a weak
//! reference back to it so a torn-down system is observable from inside
//! handlers.
//!
//! Locking discipline: the name registry is always taken before the
//! process table, and neither guard is ever held across an await.

use crate::actor::{Actor, ActorObj};
use crate::context::Context;
use crate::dispatch::{Dispatch, PoolDispatcher};
use crate::envelope::{Envelope, Task, TaskMessage};
use crate::process::Process;
use crate::remote::Remote;
use crate::router::router_for;
use crate::waiter;
use futures::future::BoxFuture;
use hive_codec::Codec;
use hive_types::{
    split_name, unix_now_secs, ActorMessage, HiveError, NodeId, Pid, RespondFn, Result, ServiceId,
};
use parking_lot::RwLock;
use std::any::type_name;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Wait applied to calls that specify no timeout of their own
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(3);

/// How long shutdown waits for each process to acknowledge its stop
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Handle to the node-local actor system
#[derive(Clone)]
pub struct System {
    inner: Arc<SystemInner>,
}

pub(crate) struct SystemInner {
    node_id: NodeId,
    codec: Codec,
    dispatcher: Arc<dyn Dispatch>,
    next_service_id: AtomicU64,
    names: RwLock<HashMap<String, Pid>>,
    procs: RwLock<HashMap<ServiceId, Arc<Process>>>,
    remote: RwLock<Option<Arc<dyn Remote>>>,
    shutting_down: AtomicBool,
}

impl System {
    pub fn new(node_id: NodeId, codec: Codec) -> Self {
        Self::with_dispatcher(node_id, codec, Arc::new(PoolDispatcher::default()))
    }

    pub fn with_dispatcher(node_id: NodeId, codec: Codec, dispatcher: Arc<dyn Dispatch>) -> Self {
        Self {
            inner: Arc::new(SystemInner {
                node_id,
                codec,
                dispatcher,
                next_service_id: AtomicU64::new(0),
                names: RwLock::new(HashMap::new()),
                procs: RwLock::new(HashMap::new()),
                remote: RwLock::new(None),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<SystemInner>) -> Self {
        Self { inner }
    }

    pub fn node_id(&self) -> NodeId {
        self.inner.node_id
    }

    pub fn codec(&self) -> Codec {
        self.inner.codec
    }

    /// Install the cross-node transport; done once by the cluster overlay.
    pub fn set_remote(&self, remote: Arc<dyn Remote>) {
        *self.inner.remote.write() = Some(remote);
    }

    fn ensure_running(&self) -> Result<()> {
        if self.inner.shutting_down.load(Ordering::Acquire) {
            return Err(HiveError::SystemShuttingDown {
                node: self.inner.node_id,
            });
        }
        Ok(())
    }

    /// Spawn an actor, optionally under a registration name. A leading
    /// `@` on the name additionally publishes it as a discovery tag.
    ///
    /// Must be called within the tokio runtime: the actor's init hook is
    /// queued as its first mailbox item and drains immediately.
    pub fn spawn<A: Actor>(&self, actor: A, name: Option<&str>) -> Result<Pid> {
        self.ensure_running()?;
        let inner = &self.inner;
        let service_id = inner.next_service_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut pid = Pid::local(inner.node_id, service_id);

        if let Some(raw) = name {
            let (canonical, global) = split_name(raw);
            if canonical.is_empty() {
                return Err(HiveError::EmptyName);
            }
            pid.name = Some(canonical.to_string());
            pid.global = global;
            // reserve before the process exists so a racing spawn cannot
            // claim the same name
            let mut names = inner.names.write();
            if names.contains_key(canonical) {
                return Err(HiveError::NameAlreadyRegistered {
                    name: canonical.to_string(),
                });
            }
            names.insert(canonical.to_string(), pid.clone());
        }

        let router = router_for::<A>();
        let proc = Process::spawn(inner, pid.clone(), Box::new(actor), router);
        inner.procs.write().insert(service_id, proc);

        if pid.global {
            if let Some(name) = &pid.name {
                inner.publish_tag_change(name, true);
            }
        }
        info!(node = inner.node_id, pid = %pid, actor = type_name::<A>(), "spawned actor");
        Ok(pid)
    }

    /// Register a name for an already-running process. Each process holds
    /// at most one name, and the binding is write-once.
    pub fn register_name(&self, pid: &Pid, raw: &str) -> Result<()> {
        let (canonical, global) = split_name(raw);
        if canonical.is_empty() {
            return Err(HiveError::EmptyName);
        }
        let inner = &self.inner;
        {
            let mut names = inner.names.write();
            let current = names.iter().find_map(|(name, p)| {
                (p.node_id == pid.node_id && p.service_id == pid.service_id)
                    .then(|| name.clone())
            });
            if let Some(current) = current {
                if current == canonical {
                    return Ok(());
                }
                return Err(HiveError::NameChangeNotAllowed {
                    pid: pid.to_string(),
                    current,
                    requested: canonical.to_string(),
                });
            }
            if names.contains_key(canonical) {
                return Err(HiveError::NameAlreadyRegistered {
                    name: canonical.to_string(),
                });
            }
            let mut named = pid.clone();
            named.name = Some(canonical.to_string());
            named.global = global;
            names.insert(canonical.to_string(), named);
        }
        if global {
            inner.publish_tag_change(canonical, true);
        }
        info!(node = inner.node_id, pid = %pid, name = canonical, global, "name registered");
        Ok(())
    }

    /// Drop the name bound to a process, retracting the discovery tag if
    /// the name was global. A nameless process is a no-op; the process
    /// may take a new name afterwards.
    pub fn unname(&self, pid: &Pid) -> Result<()> {
        let inner = &self.inner;
        let removed = {
            let mut names = inner.names.write();
            let found = names.iter().find_map(|(name, p)| {
                (p.node_id == pid.node_id && p.service_id == pid.service_id)
                    .then(|| (name.clone(), p.global))
            });
            match found {
                Some((name, global)) => {
                    names.remove(&name);
                    Some((name, global))
                }
                None => None,
            }
        };
        if let Some((name, global)) = removed {
            if global {
                inner.publish_tag_change(&name, false);
            }
            info!(node = inner.node_id, pid = %pid, name = %name, "name dropped");
        }
        Ok(())
    }

    /// Pid currently bound to a name, accepting the `@`-marked form.
    pub fn pid_of(&self, name: &str) -> Option<Pid> {
        let (canonical, _) = split_name(name);
        self.inner.names.read().get(canonical).cloned()
    }

    /// Parse a textual target: a registration name, `node/service`, or
    /// `node/service/name` as printed by [`Pid`].
    pub fn resolve(&self, target: &str) -> Result<Pid> {
        if target.is_empty() {
            return Err(HiveError::invalid_target("empty target"));
        }
        if let Some(pid) = self.pid_of(target) {
            return Ok(pid);
        }
        let mut parts = target.splitn(3, '/');
        match (parts.next(), parts.next()) {
            (Some(node), Some(service)) => {
                let node: NodeId = node
                    .parse()
                    .map_err(|_| HiveError::invalid_target(format!("bad node id in {target:?}")))?;
                let service: ServiceId = service.parse().map_err(|_| {
                    HiveError::invalid_target(format!("bad service id in {target:?}"))
                })?;
                let mut pid = Pid::local(node, service);
                if let Some(name) = parts.next() {
                    pid.name = Some(name.to_string());
                }
                Ok(pid)
            }
            _ => Err(HiveError::ProcessNotFound {
                target: target.to_string(),
            }),
        }
    }

    /// Fire-and-forget a message.
    pub async fn send(&self, from: Pid, to: Pid, method: &str, data: Vec<u8>) -> Result<()> {
        self.route(ActorMessage::send(from, to, method, data)).await
    }

    /// Call an actor and wait for its reply. `None` applies
    /// [`DEFAULT_CALL_TIMEOUT`].
    pub async fn call(
        &self,
        from: Pid,
        to: Pid,
        method: &str,
        data: Vec<u8>,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>> {
        let timeout = timeout.unwrap_or(DEFAULT_CALL_TIMEOUT);
        // the wire deadline is whole seconds; round up so a short local
        // timeout never produces an already-expired deadline
        let mut secs = timeout.as_secs();
        if timeout.subsec_nanos() > 0 {
            secs += 1;
        }
        let mut msg = ActorMessage::call(from, to, method, data, unix_now_secs() + secs);
        msg.timeout = Some(timeout);
        self.call_message(msg).await
    }

    /// Call with a prebuilt message; the reply slot and waiter are wired
    /// here.
    pub async fn call_message(&self, mut msg: ActorMessage) -> Result<Vec<u8>> {
        self.ensure_running()?;
        if msg.method.is_empty() {
            return Err(HiveError::EmptyMethod);
        }
        msg.is_async = false;
        let timeout = msg.timeout.unwrap_or_else(|| {
            if msg.deadline_unix_secs > 0 {
                let left = msg.deadline_unix_secs.saturating_sub(unix_now_secs()).max(1);
                Duration::from_secs(left)
            } else {
                DEFAULT_CALL_TIMEOUT
            }
        });
        msg.timeout = Some(timeout);
        let (respond, call_waiter) = waiter::waiter(format!("call {} on {}", msg.method, msg.to));
        msg.respond = Some(respond);
        self.route(msg).await?;
        call_waiter.wait(timeout).await
    }

    /// Route a message to its target, local or remote.
    pub async fn route(&self, mut msg: ActorMessage) -> Result<()> {
        self.ensure_running()?;
        if msg.method.is_empty() {
            return Err(HiveError::EmptyMethod);
        }
        if !msg.to.is_addressable() {
            return Err(HiveError::invalid_target(
                "target pid carries neither service id nor name",
            ));
        }
        if msg.to.is_local(self.inner.node_id) {
            return self.inner.deliver_local(msg);
        }

        let remote = self
            .inner
            .remote
            .read()
            .clone()
            .ok_or(HiveError::ClusterNotAttached {
                node: self.inner.node_id,
            })?;
        if msg.is_async {
            return remote.send(msg).await;
        }
        // request/reply: bridge the remote call back into the local
        // reply slot without blocking the router
        let respond = msg.respond.take();
        let timeout = msg.timeout.unwrap_or(DEFAULT_CALL_TIMEOUT);
        tokio::spawn(async move {
            let outcome = remote.call(msg, timeout).await;
            match respond {
                Some(respond) => respond(outcome),
                None => {
                    if let Err(e) = outcome {
                        warn!(error = %e, "remote call without a waiter failed");
                    }
                }
            }
        });
        Ok(())
    }

    /// Queue a task on a process's mailbox; it runs with exclusive access
    /// to that actor's state.
    pub fn submit_task(&self, to: &Pid, task: TaskMessage) -> Result<()> {
        self.ensure_running()?;
        let proc = self
            .inner
            .find_proc(to)
            .ok_or_else(|| HiveError::ProcessNotFound {
                target: to.to_string(),
            })?;
        proc.deliver(Envelope::Task(task));
        Ok(())
    }

    /// Queue a task and wait for it to finish running, up to `timeout`.
    /// Returns the task's own error if it fails.
    pub async fn submit_task_and_wait(
        &self,
        to: &Pid,
        task: TaskMessage,
        timeout: Duration,
    ) -> Result<()> {
        let (respond, task_waiter) = waiter::waiter(format!("task on {to}"));
        self.submit_task(
            to,
            TaskMessage::new(WaitTask {
                inner: task,
                respond: Some(respond),
            }),
        )?;
        task_waiter.wait(timeout).await.map(|_| ())
    }

    /// Stop one process and wait for its stop hook to finish.
    pub async fn stop(&self, pid: &Pid) -> Result<()> {
        let proc = self
            .inner
            .find_proc(pid)
            .ok_or_else(|| HiveError::ProcessNotFound {
                target: pid.to_string(),
            })?;
        let (tx, rx) = oneshot::channel();
        if proc.request_stop(Some(tx)) {
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, rx).await;
        }
        Ok(())
    }

    /// Stop every process, waiting up to `grace` (default
    /// [`SHUTDOWN_GRACE`]) for each stop hook, then clear the tables.
    /// Idempotent; later sends and spawns fail with `SystemShuttingDown`.
    pub async fn shutdown(&self, grace: Option<Duration>) {
        let grace = grace.unwrap_or(SHUTDOWN_GRACE);
        let inner = &self.inner;
        if inner.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(node = inner.node_id, "system shutting down");

        let procs: Vec<Arc<Process>> = inner.procs.read().values().cloned().collect();
        let mut acks = Vec::with_capacity(procs.len());
        for proc in procs {
            let (tx, rx) = oneshot::channel();
            if proc.request_stop(Some(tx)) {
                acks.push((proc.pid().clone(), rx));
            }
        }
        for (pid, rx) in acks {
            if tokio::time::timeout(grace, rx).await.is_err() {
                warn!(pid = %pid, "process did not acknowledge stop in time");
            }
        }
        inner.names.write().clear();
        inner.procs.write().clear();
    }
}

/// Wraps a submitted task so its completion (or failure) settles the
/// caller's waiter.
struct WaitTask {
    inner: TaskMessage,
    respond: Option<RespondFn>,
}

impl Task for WaitTask {
    fn run<'a>(
        mut self: Box<Self>,
        actor: &'a mut dyn ActorObj,
        ctx: &'a mut Context,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let outcome = self.inner.task.run(actor, ctx).await;
            if let Some(respond) = self.respond.take() {
                respond(outcome.clone().map(|()| Vec::new()));
            }
            outcome
        })
    }
}

impl SystemInner {
    pub(crate) fn codec(&self) -> Codec {
        self.codec
    }

    pub(crate) fn dispatcher(&self) -> Arc<dyn Dispatch> {
        Arc::clone(&self.dispatcher)
    }

    fn deliver_local(&self, msg: ActorMessage) -> Result<()> {
        match self.find_proc(&msg.to) {
            Some(proc) => {
                proc.deliver(Envelope::Actor(msg));
                Ok(())
            }
            None => Err(HiveError::ProcessNotFound {
                target: msg.to.to_string(),
            }),
        }
    }

    fn find_proc(&self, to: &Pid) -> Option<Arc<Process>> {
        if to.service_id != 0 {
            if let Some(proc) = self.procs.read().get(&to.service_id) {
                return Some(Arc::clone(proc));
            }
        }
        let raw = to.name.as_deref()?;
        let (canonical, _) = split_name(raw);
        let pid = self.names.read().get(canonical).cloned()?;
        self.procs.read().get(&pid.service_id).cloned()
    }

    /// Drop a finished process from the tables and retract its tags.
    pub(crate) fn remove_process(&self, pid: &Pid) {
        let mut retracted = Vec::new();
        {
            let mut names = self.names.write();
            names.retain(|name, p| {
                let same = p.node_id == pid.node_id && p.service_id == pid.service_id;
                if same && p.global {
                    retracted.push(name.clone());
                }
                !same
            });
        }
        self.procs.write().remove(&pid.service_id);
        for name in retracted {
            self.publish_tag_change(&name, false);
        }
        debug!(pid = %pid, "process removed");
    }

    /// Push a tag add/remove to the cluster overlay, off the caller's
    /// path. A no-op without an overlay or outside a runtime.
    pub(crate) fn publish_tag_change(&self, name: &str, present: bool) {
        let Some(remote) = self.remote.read().clone() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(name, "skipping tag publication outside a runtime");
            return;
        };
        let name = name.to_string();
        handle.spawn(async move {
            if let Err(e) = remote.update_tag(&name, present).await {
                warn!(name = %name, present, error = %e, "tag publication failed");
            }
        });
    }
}
