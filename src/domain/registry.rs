//! Orchestrator core: the authoritative node/service registry and the
//! status-computation path.
//!
//! A single async mutex guards the node map, the service map, and the
//! per-node transport cache. Status computation (HTTP probes + is-active
//! commands) runs while the lock is held, which serializes all polls. That
//! trades throughput for a strongly consistent registry view and guarantees
//! that one node's transport is never used by two polls concurrently.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::config;
use crate::ssh::SshTransport;

use super::command::{command_for, parse_is_active, ServiceOp};
use super::error::OrchestratorError;
use super::node::{run_local, Node};
use super::poller;
use super::service::Service;
use super::types::{
    NodeAvailability, NodeServiceState, NodeStatusEntry, Os, ProbeState, ServiceState,
    ServiceStatus, StatusInfo,
};

pub const DEFAULT_EVENT_CAPACITY: usize = 100;
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// One status snapshot emitted by a polling task.
#[derive(Debug)]
pub struct StatusEvent {
    pub service: String,
    pub status: StatusInfo,
}

pub struct RegistryOptions {
    pub nodes: Vec<Node>,
    pub services: Vec<Service>,
    pub node_config_path: Option<PathBuf>,
    pub service_config_path: Option<PathBuf>,
    pub event_capacity: usize,
    pub probe_timeout: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            services: Vec::new(),
            node_config_path: None,
            service_config_path: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

pub struct Registry {
    inner: Mutex<Inner>,
    events: mpsc::Sender<StatusEvent>,
    http: reqwest::Client,
}

struct Inner {
    nodes: HashMap<String, Node>,
    services: HashMap<String, Service>,
    transports: HashMap<String, SshTransport>,
    node_config_path: Option<PathBuf>,
    service_config_path: Option<PathBuf>,
    next_epoch: u64,
}

impl Registry {
    /// Build a registry from validated configuration. The returned receiver
    /// must be handed to [`poller::consume`].
    pub fn new(
        options: RegistryOptions,
    ) -> Result<(Arc<Self>, mpsc::Receiver<StatusEvent>), OrchestratorError> {
        let mut nodes = HashMap::new();
        for mut node in options.nodes {
            node.validate()?;
            if nodes.contains_key(&node.name) {
                return Err(OrchestratorError::DuplicateNode(node.name));
            }
            nodes.insert(node.name.clone(), node);
        }

        let mut next_epoch = 1;
        let mut services = HashMap::new();
        for mut service in options.services {
            service.validate()?;
            for node_name in &service.nodes {
                if !nodes.contains_key(node_name) {
                    return Err(OrchestratorError::Validation(format!(
                        "service {} references unknown node {}",
                        service.name, node_name
                    )));
                }
            }
            if services.contains_key(&service.name) {
                return Err(OrchestratorError::DuplicateService(service.name));
            }
            service.status = None;
            service.epoch = next_epoch;
            next_epoch += 1;
            services.insert(service.name.clone(), service);
        }

        let http = reqwest::Client::builder()
            .timeout(options.probe_timeout)
            .build()
            .map_err(|e| OrchestratorError::Validation(format!("building HTTP client: {e}")))?;

        let (tx, rx) = mpsc::channel(options.event_capacity);
        let registry = Arc::new(Self {
            inner: Mutex::new(Inner {
                nodes,
                services,
                transports: HashMap::new(),
                node_config_path: options.node_config_path,
                service_config_path: options.service_config_path,
                next_epoch,
            }),
            events: tx,
            http,
        });
        Ok((registry, rx))
    }

    pub fn event_sender(&self) -> mpsc::Sender<StatusEvent> {
        self.events.clone()
    }

    // ── Node operations ────────────────────────────────────

    pub async fn nodes(&self) -> Vec<Node> {
        let inner = self.inner.lock().await;
        let mut nodes: Vec<Node> = inner.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        nodes
    }

    pub async fn node(&self, name: &str) -> Result<Node, OrchestratorError> {
        let inner = self.inner.lock().await;
        inner
            .nodes
            .get(name)
            .cloned()
            .ok_or_else(|| OrchestratorError::UnknownNode(name.to_string()))
    }

    /// Register a new node and attempt an initial connectivity probe. The
    /// probe is best-effort: a failure leaves the node registered as
    /// Disconnected.
    pub async fn create_node(&self, mut node: Node) -> Result<Node, OrchestratorError> {
        node.validate()?;
        let mut inner = self.inner.lock().await;
        if inner.nodes.contains_key(&node.name) {
            return Err(OrchestratorError::DuplicateNode(node.name));
        }
        let name = node.name.clone();
        inner.nodes.insert(name.clone(), node);
        if let Err(err) = inner.connect(&name).await {
            warn!(node = %name, error = %err, "initial connectivity probe failed");
        }
        inner.persist_nodes();
        Ok(inner.nodes[&name].clone())
    }

    /// Replace a node by name. Any cached transport is closed and a
    /// reconnect is attempted under the new configuration.
    pub async fn update_node(&self, mut node: Node) -> Result<(), OrchestratorError> {
        node.validate()?;
        let mut inner = self.inner.lock().await;
        if !inner.nodes.contains_key(&node.name) {
            return Err(OrchestratorError::UnknownNode(node.name));
        }
        let name = node.name.clone();
        inner.transports.remove(&name);
        node.availability = NodeAvailability::Initialized;
        inner.nodes.insert(name.clone(), node);
        if let Err(err) = inner.connect(&name).await {
            warn!(node = %name, error = %err, "reconnect after update failed");
        }
        inner.persist_nodes();
        Ok(())
    }

    /// Remove a node, rejecting if any registered service still binds it.
    pub async fn delete_node(&self, name: &str) -> Result<(), OrchestratorError> {
        let mut inner = self.inner.lock().await;
        if !inner.nodes.contains_key(name) {
            return Err(OrchestratorError::UnknownNode(name.to_string()));
        }
        for service in inner.services.values() {
            if service.nodes.iter().any(|n| n == name) {
                return Err(OrchestratorError::NodeInUse {
                    node: name.to_string(),
                    service: service.name.clone(),
                });
            }
        }
        inner.nodes.remove(name);
        inner.transports.remove(name);
        inner.persist_nodes();
        Ok(())
    }

    /// Establish (or reuse) the node's transport. Connecting an already
    /// connected node is a no-op success.
    pub async fn connect_node(&self, name: &str) -> Result<(), OrchestratorError> {
        let mut inner = self.inner.lock().await;
        inner.connect(name).await
    }

    /// Drop the node's transport. Disconnecting an already disconnected
    /// node is a no-op success.
    pub async fn disconnect_node(&self, name: &str) -> Result<(), OrchestratorError> {
        let mut inner = self.inner.lock().await;
        let availability = inner
            .nodes
            .get(name)
            .map(|n| n.availability)
            .ok_or_else(|| OrchestratorError::UnknownNode(name.to_string()))?;
        if availability == NodeAvailability::Disconnected {
            return Ok(());
        }
        inner.transports.remove(name);
        inner.set_availability(name, NodeAvailability::Disconnected);
        Ok(())
    }

    // ── Service operations ─────────────────────────────────

    pub async fn services(&self) -> Vec<Service> {
        let inner = self.inner.lock().await;
        let mut services: Vec<Service> = inner.services.values().cloned().collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        services
    }

    pub async fn service(&self, name: &str) -> Result<Service, OrchestratorError> {
        let inner = self.inner.lock().await;
        inner
            .services
            .get(name)
            .cloned()
            .ok_or_else(|| OrchestratorError::UnknownService(name.to_string()))
    }

    pub async fn statuses(&self) -> Vec<ServiceStatus> {
        let inner = self.inner.lock().await;
        let mut statuses: Vec<ServiceStatus> = inner
            .services
            .values()
            .map(|s| ServiceStatus {
                service_name: s.name.clone(),
                status_info: s.status.clone(),
            })
            .collect();
        statuses.sort_by(|a, b| a.service_name.cmp(&b.service_name));
        statuses
    }

    pub async fn status(&self, name: &str) -> Result<ServiceStatus, OrchestratorError> {
        let inner = self.inner.lock().await;
        inner
            .services
            .get(name)
            .map(|s| ServiceStatus {
                service_name: s.name.clone(),
                status_info: s.status.clone(),
            })
            .ok_or_else(|| OrchestratorError::UnknownService(name.to_string()))
    }

    /// Validate, register, persist, and start polling a new service.
    pub async fn create_service(
        self: &Arc<Self>,
        mut service: Service,
    ) -> Result<Service, OrchestratorError> {
        service.validate()?;
        let epoch;
        {
            let mut inner = self.inner.lock().await;
            if inner.services.contains_key(&service.name) {
                return Err(OrchestratorError::DuplicateService(service.name));
            }
            inner.resolve_nodes(&service)?;
            service.status = None;
            epoch = inner.bump_epoch();
            service.epoch = epoch;
            inner.services.insert(service.name.clone(), service.clone());
            inner.persist_services();
        }
        poller::spawn(self.clone(), service.name.clone(), epoch);
        Ok(service)
    }

    /// Replace a service by name, preserving its last status snapshot. The
    /// replacement gets a fresh epoch so the superseded polling task retires
    /// itself and a new one takes over without overlap.
    pub async fn update_service(
        self: &Arc<Self>,
        mut service: Service,
    ) -> Result<(), OrchestratorError> {
        service.validate()?;
        let epoch;
        {
            let mut inner = self.inner.lock().await;
            let previous_status = match inner.services.get(&service.name) {
                Some(previous) => previous.status.clone(),
                None => return Err(OrchestratorError::UnknownService(service.name)),
            };
            inner.resolve_nodes(&service)?;
            service.status = previous_status;
            epoch = inner.bump_epoch();
            service.epoch = epoch;
            inner.services.insert(service.name.clone(), service.clone());
            inner.persist_services();
        }
        poller::spawn(self.clone(), service.name, epoch);
        Ok(())
    }

    /// Remove a service from the registry. Its polling task observes the
    /// deletion on its next iteration and terminates silently; an in-flight
    /// event for it is dropped by the consumer.
    pub async fn delete_service(&self, name: &str) -> Result<(), OrchestratorError> {
        let mut inner = self.inner.lock().await;
        if inner.services.remove(name).is_none() {
            return Err(OrchestratorError::UnknownService(name.to_string()));
        }
        inner.persist_services();
        Ok(())
    }

    // ── Command dispatch ───────────────────────────────────

    pub async fn start_service(
        &self,
        node: &str,
        service: &str,
    ) -> Result<(), OrchestratorError> {
        self.dispatch(node, service, ServiceOp::Start).await
    }

    pub async fn stop_service(&self, node: &str, service: &str) -> Result<(), OrchestratorError> {
        self.dispatch(node, service, ServiceOp::Stop).await
    }

    async fn dispatch(
        &self,
        node: &str,
        service: &str,
        op: ServiceOp,
    ) -> Result<(), OrchestratorError> {
        let mut inner = self.inner.lock().await;
        if !inner.services.contains_key(service) {
            return Err(OrchestratorError::UnknownService(service.to_string()));
        }
        let os = inner
            .nodes
            .get(node)
            .map(|n| n.os)
            .ok_or_else(|| OrchestratorError::UnknownNode(node.to_string()))?;
        if !inner.services[service].nodes.iter().any(|n| n == node) {
            return Err(OrchestratorError::NodeNotBound {
                node: node.to_string(),
                service: service.to_string(),
            });
        }
        let command = command_for(os, op, service)?;
        inner
            .run_command(node, &command)
            .await
            .map(|_| ())
            .map_err(|err| annotate_dispatch(service, err))
    }

    // ── Polling engine interface ───────────────────────────

    /// One polling pass for `service`: look it up, compute a fresh snapshot
    /// under the lock, and return it with the configured interval. `None`
    /// means the service is gone or superseded and the task must terminate.
    pub(crate) async fn poll_once(&self, service: &str, epoch: u64) -> Option<(StatusInfo, i64)> {
        let mut inner = self.inner.lock().await;
        let interval = match inner.services.get(service) {
            Some(current) if current.epoch == epoch => current.interval_secs,
            _ => return None,
        };
        let status = inner.compute_status(service, &self.http).await?;
        Some((status, interval))
    }

    /// Bound nodes flagged start-immediately, for the polling task's entry
    /// best-effort start calls.
    pub(crate) async fn start_flagged(&self, service: &str) -> Vec<String> {
        let inner = self.inner.lock().await;
        let Some(service) = inner.services.get(service) else {
            return Vec::new();
        };
        service
            .nodes
            .iter()
            .filter(|name| {
                inner
                    .nodes
                    .get(name.as_str())
                    .is_some_and(|n| n.start_immediately)
            })
            .cloned()
            .collect()
    }

    /// Merge one status event, replacing the service's snapshot wholesale.
    /// Returns false when the service no longer exists (stray event).
    pub(crate) async fn apply_status(&self, service: &str, status: StatusInfo) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.services.get_mut(service) {
            Some(current) => {
                current.status = Some(status);
                true
            }
            None => false,
        }
    }

    /// Spawn a polling task for every registered service (startup).
    pub async fn start_all(self: &Arc<Self>) {
        let targets: Vec<(String, u64)> = {
            let inner = self.inner.lock().await;
            inner
                .services
                .values()
                .map(|s| (s.name.clone(), s.epoch))
                .collect()
        };
        for (name, epoch) in targets {
            poller::spawn(self.clone(), name, epoch);
        }
    }

    /// Probe connectivity of every remote node, best-effort (startup).
    pub async fn connect_all(&self) {
        let mut inner = self.inner.lock().await;
        let names: Vec<String> = inner
            .nodes
            .values()
            .filter(|n| n.remote)
            .map(|n| n.name.clone())
            .collect();
        for name in names {
            if let Err(err) = inner.connect(&name).await {
                warn!(node = %name, error = %err, "initial connectivity probe failed");
            }
        }
    }
}

/// Start/stop failures carry both names; execution errors only know the
/// node they ran on.
fn annotate_dispatch(service: &str, err: OrchestratorError) -> OrchestratorError {
    match err {
        OrchestratorError::Command { node, message } => OrchestratorError::Command {
            node,
            message: format!("service {service}: {message}"),
        },
        OrchestratorError::Connect { node, message } => OrchestratorError::Connect {
            node,
            message: format!("service {service}: {message}"),
        },
        other => other,
    }
}

impl Inner {
    fn bump_epoch(&mut self) -> u64 {
        let epoch = self.next_epoch;
        self.next_epoch += 1;
        epoch
    }

    fn set_availability(&mut self, name: &str, availability: NodeAvailability) {
        if let Some(node) = self.nodes.get_mut(name) {
            node.availability = availability;
        }
    }

    fn resolve_nodes(&self, service: &Service) -> Result<(), OrchestratorError> {
        for node_name in &service.nodes {
            if !self.nodes.contains_key(node_name) {
                return Err(OrchestratorError::Validation(format!(
                    "service {} references unknown node {}",
                    service.name, node_name
                )));
            }
        }
        Ok(())
    }

    /// Establish or revalidate the node's transport. A cached transport is
    /// trusted only after a throwaway session succeeds.
    async fn connect(&mut self, name: &str) -> Result<(), OrchestratorError> {
        let (remote, connection, availability) = {
            let node = self
                .nodes
                .get(name)
                .ok_or_else(|| OrchestratorError::UnknownNode(name.to_string()))?;
            (node.remote, node.connection.clone(), node.availability)
        };
        if availability == NodeAvailability::Connected {
            return Ok(());
        }
        if !remote {
            self.set_availability(name, NodeAvailability::Connected);
            return Ok(());
        }
        let Some(connection) = connection else {
            self.set_availability(name, NodeAvailability::Disconnected);
            return Err(OrchestratorError::NoConnection(name.to_string()));
        };
        if let Some(cached) = self.transports.get(name).cloned() {
            if cached.check(name).await.is_ok() {
                self.set_availability(name, NodeAvailability::Connected);
                return Ok(());
            }
            self.transports.remove(name);
        }
        let transport = SshTransport::new(&connection);
        match transport.check(name).await {
            Ok(()) => {
                self.transports.insert(name.to_string(), transport);
                self.set_availability(name, NodeAvailability::Connected);
                Ok(())
            }
            Err(err) => {
                self.set_availability(name, NodeAvailability::Disconnected);
                Err(err)
            }
        }
    }

    /// Run a shell command on the named node, local or remote. A session
    /// failure on the remote path doubles as a connectivity probe and flips
    /// the node Disconnected.
    async fn run_command(&mut self, name: &str, command: &str) -> Result<String, OrchestratorError> {
        let (os, remote, connection) = {
            let node = self
                .nodes
                .get(name)
                .ok_or_else(|| OrchestratorError::UnknownNode(name.to_string()))?;
            (node.os, node.remote, node.connection.clone())
        };
        if os == Os::Windows {
            self.set_availability(name, NodeAvailability::UnknownOs);
            return Err(OrchestratorError::UnsupportedOs(Os::Windows));
        }
        if !remote {
            return run_local(name, command).await;
        }
        let Some(connection) = connection else {
            self.set_availability(name, NodeAvailability::Disconnected);
            return Err(OrchestratorError::NoConnection(name.to_string()));
        };
        let transport = match self.transports.get(name) {
            Some(cached) => cached.clone(),
            None => {
                let transport = SshTransport::new(&connection);
                self.transports.insert(name.to_string(), transport.clone());
                transport
            }
        };
        match transport.run(name, command).await {
            Ok(output) => {
                self.set_availability(name, NodeAvailability::Connected);
                Ok(output)
            }
            Err(err @ OrchestratorError::Connect { .. }) => {
                self.transports.remove(name);
                self.set_availability(name, NodeAvailability::Disconnected);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Compute a fresh status snapshot for one service.
    ///
    /// Probes run in configured order without short-circuiting, so the
    /// aggregate reflects all of them. A Passed probe set promotes the
    /// service Active; independently, any node reporting active promotes it
    /// as well. Returns None if the service vanished mid-lookup.
    async fn compute_status(
        &mut self,
        name: &str,
        http: &reqwest::Client,
    ) -> Option<StatusInfo> {
        let (probes, node_names, interval) = {
            let service = self.services.get(name)?;
            (
                service.probes.clone(),
                service.nodes.clone(),
                service.interval_secs,
            )
        };
        let this_update = Utc::now();

        let mut http_status = ProbeState::Undefined;
        let mut service_status = ServiceState::Inactive;
        if !probes.is_empty() {
            http_status = ProbeState::Passed;
            for probe in &probes {
                if let Err(err) = probe.call(http).await {
                    debug!(service = name, error = %err, "probe failed");
                    http_status = ProbeState::Failed;
                }
            }
            if http_status == ProbeState::Passed {
                service_status = ServiceState::Active;
            }
        }

        let mut entries = Vec::with_capacity(node_names.len());
        for node_name in &node_names {
            let os = self.nodes.get(node_name).map(|n| n.os);
            let state = match os {
                // Node deleted mid-poll: accepted race, reported as lost.
                None => NodeServiceState::Disconnected,
                Some(Os::Windows) => NodeServiceState::UnknownOs,
                Some(os) => match command_for(os, ServiceOp::IsActive, name) {
                    Ok(command) => match self.run_command(node_name, &command).await {
                        Ok(output) if parse_is_active(os, &output) => NodeServiceState::Active,
                        Ok(_) => NodeServiceState::Inactive,
                        Err(err) => {
                            debug!(
                                service = name,
                                node = %node_name,
                                error = %err,
                                "is-active check failed"
                            );
                            NodeServiceState::Disconnected
                        }
                    },
                    Err(_) => NodeServiceState::UnknownOs,
                },
            };
            if state == NodeServiceState::Active {
                service_status = ServiceState::Active;
            }
            entries.push(NodeStatusEntry {
                node_name: node_name.clone(),
                status: state,
            });
        }

        let next_update = (interval > 0).then(|| this_update + chrono::Duration::seconds(interval));
        Some(StatusInfo {
            service_status,
            http_status,
            nodes: entries,
            this_update,
            next_update,
        })
    }

    fn persist_nodes(&self) {
        let Some(path) = &self.node_config_path else {
            return;
        };
        let mut nodes: Vec<Node> = self.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        if let Err(err) = config::save_nodes(path, &nodes) {
            warn!(path = %path.display(), error = %err, "failed to persist node configuration");
        }
    }

    fn persist_services(&self) {
        let Some(path) = &self.service_config_path else {
            return;
        };
        let mut services: Vec<Service> = self.services.values().cloned().collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        if let Err(err) = config::save_services(path, &services) {
            warn!(path = %path.display(), error = %err, "failed to persist service configuration");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::probe::HttpProbe;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn node(name: &str, os: Os) -> Node {
        Node {
            name: name.to_string(),
            os,
            start_immediately: false,
            remote: false,
            connection: None,
            availability: NodeAvailability::Initialized,
        }
    }

    fn service(name: &str, nodes: &[&str], interval_secs: i64) -> Service {
        Service {
            name: name.to_string(),
            url: String::new(),
            probes: Vec::new(),
            interval_secs,
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
            status: None,
            epoch: 0,
        }
    }

    fn registry_with(nodes: Vec<Node>) -> Arc<Registry> {
        let (registry, _rx) = Registry::new(RegistryOptions {
            nodes,
            ..Default::default()
        })
        .unwrap();
        registry
    }

    fn snapshot(state: ServiceState) -> StatusInfo {
        StatusInfo {
            service_status: state,
            http_status: ProbeState::Undefined,
            nodes: Vec::new(),
            this_update: Utc::now(),
            next_update: None,
        }
    }

    #[tokio::test]
    async fn duplicate_node_names_are_rejected() {
        let registry = registry_with(vec![node("n1", Os::Windows)]);
        let err = registry.create_node(node("n1", Os::Windows)).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::DuplicateNode(_)));
    }

    #[tokio::test]
    async fn delete_node_is_blocked_while_a_service_binds_it() {
        let registry = registry_with(vec![node("n1", Os::Windows)]);
        registry
            .create_service(service("web", &["n1"], 0))
            .await
            .unwrap();

        let err = registry.delete_node("n1").await.unwrap_err();
        match err {
            OrchestratorError::NodeInUse { node, service } => {
                assert_eq!(node, "n1");
                assert_eq!(service, "web");
            }
            other => panic!("unexpected error: {other}"),
        }

        registry.delete_service("web").await.unwrap();
        registry.delete_node("n1").await.unwrap();
        assert!(matches!(
            registry.node("n1").await,
            Err(OrchestratorError::UnknownNode(_))
        ));
    }

    #[tokio::test]
    async fn create_service_requires_resolvable_nodes() {
        let registry = registry_with(vec![node("n1", Os::Windows)]);
        let err = registry
            .create_service(service("web", &["ghost"], 0))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
        assert!(registry.services().await.is_empty());
    }

    #[tokio::test]
    async fn duplicate_service_names_are_rejected() {
        let registry = registry_with(vec![node("n1", Os::Windows)]);
        registry
            .create_service(service("web", &["n1"], 0))
            .await
            .unwrap();
        let err = registry
            .create_service(service("web", &["n1"], 0))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::DuplicateService(_)));
    }

    #[tokio::test]
    async fn connect_local_node_is_idempotent() {
        let registry = registry_with(vec![node("n1", Os::Linux)]);
        registry.connect_node("n1").await.unwrap();
        assert_eq!(
            registry.node("n1").await.unwrap().availability,
            NodeAvailability::Connected
        );
        // Second connect is a no-op success.
        registry.connect_node("n1").await.unwrap();

        registry.disconnect_node("n1").await.unwrap();
        assert_eq!(
            registry.node("n1").await.unwrap().availability,
            NodeAvailability::Disconnected
        );
        // Second disconnect is a no-op success.
        registry.disconnect_node("n1").await.unwrap();
    }

    #[tokio::test]
    async fn start_on_windows_node_is_an_explicit_capability_error() {
        let registry = registry_with(vec![node("n1", Os::Windows)]);
        registry
            .create_service(service("web", &["n1"], 0))
            .await
            .unwrap();
        let err = registry.start_service("n1", "web").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::UnsupportedOs(Os::Windows)));
        // The failed dispatch marks the node's OS as unsupported.
        assert_eq!(
            registry.node("n1").await.unwrap().availability,
            NodeAvailability::UnknownOs
        );
    }

    #[test]
    fn dispatch_errors_carry_the_service_name() {
        let annotated = annotate_dispatch(
            "web",
            OrchestratorError::Command {
                node: "n1".to_string(),
                message: "exit status Some(1)".to_string(),
            },
        );
        assert_eq!(
            annotated.to_string(),
            "command failed on node n1: service web: exit status Some(1)"
        );

        // Capability errors already name everything they need to.
        assert!(matches!(
            annotate_dispatch("web", OrchestratorError::UnsupportedOs(Os::Windows)),
            OrchestratorError::UnsupportedOs(Os::Windows)
        ));
    }

    #[tokio::test]
    async fn start_rejects_unbound_node() {
        let registry = registry_with(vec![node("n1", Os::Windows), node("n2", Os::Windows)]);
        registry
            .create_service(service("web", &["n1"], 0))
            .await
            .unwrap();
        let err = registry.start_service("n2", "web").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::NodeNotBound { .. }));
    }

    #[tokio::test]
    async fn unknown_lookups_fail_cleanly() {
        let registry = registry_with(vec![]);
        assert!(matches!(
            registry.node("ghost").await,
            Err(OrchestratorError::UnknownNode(_))
        ));
        assert!(matches!(
            registry.service("ghost").await,
            Err(OrchestratorError::UnknownService(_))
        ));
        assert!(matches!(
            registry.status("ghost").await,
            Err(OrchestratorError::UnknownService(_))
        ));
        assert!(matches!(
            registry.delete_service("ghost").await,
            Err(OrchestratorError::UnknownService(_))
        ));
    }

    #[tokio::test]
    async fn passing_probe_set_marks_service_active() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let registry = registry_with(vec![node("n1", Os::Windows)]);
        let mut web = service("web", &["n1"], 0);
        web.probes.push(HttpProbe {
            method: "GET".to_string(),
            address: format!("{}/health", server.uri()),
            status_code: 200,
            headers: Default::default(),
        });
        let created = registry.create_service(web).await.unwrap();

        let (status, interval) = registry.poll_once("web", created.epoch).await.unwrap();
        assert_eq!(interval, 0);
        assert_eq!(status.http_status, ProbeState::Passed);
        assert_eq!(status.service_status, ServiceState::Active);
        assert_eq!(status.nodes.len(), 1);
        assert_eq!(status.nodes[0].node_name, "n1");
        assert_eq!(status.nodes[0].status, NodeServiceState::UnknownOs);
        assert!(status.next_update.is_none());
    }

    #[tokio::test]
    async fn single_probe_mismatch_forces_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ready"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let registry = registry_with(vec![node("n1", Os::Windows)]);
        let mut web = service("web", &["n1"], 60);
        for endpoint in ["/health", "/ready"] {
            web.probes.push(HttpProbe {
                method: "GET".to_string(),
                address: format!("{}{}", server.uri(), endpoint),
                status_code: 200,
                headers: Default::default(),
            });
        }
        let created = registry.create_service(web).await.unwrap();

        let (status, _) = registry.poll_once("web", created.epoch).await.unwrap();
        assert_eq!(status.http_status, ProbeState::Failed);
        // Windows node cannot promote the service either.
        assert_eq!(status.service_status, ServiceState::Inactive);
        assert_eq!(
            status.next_update.unwrap() - status.this_update,
            chrono::Duration::seconds(60)
        );
    }

    #[tokio::test]
    async fn service_without_probes_leaves_http_status_undefined() {
        let registry = registry_with(vec![node("n1", Os::Windows)]);
        let created = registry
            .create_service(service("web", &["n1"], 0))
            .await
            .unwrap();
        let (status, _) = registry.poll_once("web", created.epoch).await.unwrap();
        assert_eq!(status.http_status, ProbeState::Undefined);
        assert_eq!(status.service_status, ServiceState::Inactive);
    }

    #[tokio::test]
    async fn poll_once_terminates_on_deletion_or_supersession() {
        let registry = registry_with(vec![node("n1", Os::Windows)]);
        let created = registry
            .create_service(service("web", &["n1"], 30))
            .await
            .unwrap();

        // Superseded epoch: a replacement took over.
        registry
            .update_service(service("web", &["n1"], 30))
            .await
            .unwrap();
        assert!(registry.poll_once("web", created.epoch).await.is_none());

        // Deleted service.
        registry.delete_service("web").await.unwrap();
        assert!(registry.poll_once("web", created.epoch + 1).await.is_none());
    }

    #[tokio::test]
    async fn update_service_preserves_last_status_and_bumps_epoch() {
        let registry = registry_with(vec![node("n1", Os::Windows)]);
        let created = registry
            .create_service(service("web", &["n1"], 30))
            .await
            .unwrap();
        assert!(registry.apply_status("web", snapshot(ServiceState::Active)).await);

        registry
            .update_service(service("web", &["n1"], 60))
            .await
            .unwrap();
        let updated = registry.service("web").await.unwrap();
        assert_eq!(updated.interval_secs, 60);
        assert!(updated.epoch > created.epoch);
        assert_eq!(
            updated.status.unwrap().service_status,
            ServiceState::Active
        );
    }

    #[tokio::test]
    async fn stray_status_events_are_rejected_without_panic() {
        let registry = registry_with(vec![node("n1", Os::Windows)]);
        registry
            .create_service(service("web", &["n1"], 30))
            .await
            .unwrap();
        registry.delete_service("web").await.unwrap();
        assert!(!registry.apply_status("web", snapshot(ServiceState::Active)).await);
    }

    #[tokio::test]
    async fn start_flagged_lists_only_flagged_bound_nodes() {
        let mut flagged = node("n1", Os::Windows);
        flagged.start_immediately = true;
        let registry = registry_with(vec![flagged, node("n2", Os::Windows)]);
        registry
            .create_service(service("web", &["n1", "n2"], 0))
            .await
            .unwrap();
        assert_eq!(registry.start_flagged("web").await, vec!["n1".to_string()]);
    }
}
