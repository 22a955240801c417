//! JSON configuration documents.
//!
//! Two documents live side by side on disk: the node list and the service
//! list. A missing or unparsable document falls back to a built-in default
//! which is written back to disk. The registry rewrites each document in
//! full (pretty-indented) whenever its half of the registry changes.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::domain::node::Node;
use crate::domain::probe::HttpProbe;
use crate::domain::service::Service;
use crate::domain::types::Os;

pub fn load_nodes(path: &Path) -> Result<Vec<Node>> {
    load_or_default(path, "node", default_nodes)
}

pub fn load_services(path: &Path, bind: &str) -> Result<Vec<Service>> {
    load_or_default(path, "service", || default_services(bind))
}

pub fn save_nodes(path: &Path, nodes: &[Node]) -> Result<()> {
    save(path, nodes)
}

pub fn save_services(path: &Path, services: &[Service]) -> Result<()> {
    save(path, services)
}

fn load_or_default<T, F>(path: &Path, kind: &str, default: F) -> Result<Vec<T>>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Vec<T>,
{
    if !path.exists() {
        warn!(path = %path.display(), "{kind} configuration file not found, initializing with default");
        let entries = default();
        save(path, &entries)?;
        return Ok(entries);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    match serde_json::from_str(&content) {
        Ok(entries) => Ok(entries),
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "{kind} configuration file is broken, initializing with default"
            );
            let entries = default();
            save(path, &entries)?;
            Ok(entries)
        }
    }
}

fn save<T: Serialize>(path: &Path, entries: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let content = serde_json::to_string_pretty(entries).context("serializing configuration")?;
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// The default node document: one local node for the host we run on.
pub fn default_nodes() -> Vec<Node> {
    vec![Node {
        name: "local".to_string(),
        os: host_os(),
        start_immediately: false,
        remote: false,
        connection: None,
        availability: Default::default(),
    }]
}

/// The default service document: the orchestrator itself, probed through
/// its own statuses endpoint.
pub fn default_services(bind: &str) -> Vec<Service> {
    vec![Service {
        name: "orchestrator".to_string(),
        url: bind.to_string(),
        probes: vec![HttpProbe {
            method: "GET".to_string(),
            address: format!("http://{bind}/orchestrator/statuses"),
            status_code: 200,
            headers: HashMap::new(),
        }],
        interval_secs: 30,
        nodes: vec!["local".to_string()],
        status: None,
        epoch: 0,
    }]
}

fn host_os() -> Os {
    match std::env::consts::OS {
        "macos" => Os::Darwin,
        "windows" => Os::Windows,
        _ => Os::Linux,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::Connection;
    use tempfile::tempdir;

    fn remote_node(name: &str) -> Node {
        Node {
            name: name.to_string(),
            os: Os::Linux,
            start_immediately: true,
            remote: true,
            connection: Some(Connection {
                host: "10.0.0.5".to_string(),
                port: "22".to_string(),
                user: "root".to_string(),
                ssh_key: "/keys/id_ed25519".to_string(),
                passphrase: None,
            }),
            availability: Default::default(),
        }
    }

    #[test]
    fn node_document_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("node-configuration.json");
        let nodes = vec![remote_node("edge-1"), default_nodes().remove(0)];

        save_nodes(&path, &nodes).unwrap();
        let loaded = load_nodes(&path).unwrap();
        assert_eq!(loaded, nodes);

        // A second save of the reloaded document is byte-for-byte stable.
        let first = std::fs::read_to_string(&path).unwrap();
        save_nodes(&path, &loaded).unwrap();
        let second = std::fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn service_document_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("service-configuration.json");
        let services = default_services("127.0.0.1:6000");

        save_services(&path, &services).unwrap();
        let loaded = load_services(&path, "127.0.0.1:6000").unwrap();
        assert_eq!(loaded, services);
    }

    #[test]
    fn missing_document_writes_default_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("service-configuration.json");

        let services = load_services(&path, "127.0.0.1:6000").unwrap();
        assert_eq!(services, default_services("127.0.0.1:6000"));
        assert!(path.exists());
    }

    #[test]
    fn broken_document_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("node-configuration.json");
        std::fs::write(&path, "{ not json").unwrap();

        let nodes = load_nodes(&path).unwrap();
        assert_eq!(nodes, default_nodes());

        // The default replaced the broken file on disk.
        let reloaded = load_nodes(&path).unwrap();
        assert_eq!(reloaded, nodes);
    }

    #[test]
    fn runtime_status_fields_are_not_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("node-configuration.json");
        let mut node = remote_node("edge-1");
        node.availability = crate::domain::types::NodeAvailability::Connected;

        save_nodes(&path, &[node]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("Connected"));

        let loaded = load_nodes(&path).unwrap();
        assert_eq!(
            loaded[0].availability,
            crate::domain::types::NodeAvailability::Initialized
        );
    }
}
