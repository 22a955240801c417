//! Core enums and the per-poll status snapshot.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operating system of an execution target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Linux,
    Darwin,
    Windows,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Os::Linux => write!(f, "linux"),
            Os::Darwin => write!(f, "darwin"),
            Os::Windows => write!(f, "windows"),
        }
    }
}

/// Node connectivity, tracked at runtime only. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeAvailability {
    Connected,
    Disconnected,
    UnknownOs,
    #[default]
    Initialized,
}

/// Coarse aggregate status of a service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    #[default]
    Undefined,
    Inactive,
    Active,
    Failed,
}

/// Outcome of a service's HTTP probe set. Passed only if every probe
/// returned its exact expected status code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeState {
    #[default]
    Undefined,
    Passed,
    Failed,
}

/// Per-node outcome of the is-active check for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeServiceState {
    Active,
    Inactive,
    Disconnected,
    UnknownOs,
}

/// One node's entry within a status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatusEntry {
    #[serde(rename = "NodeName")]
    pub node_name: String,
    #[serde(rename = "ServiceStatus")]
    pub status: NodeServiceState,
}

/// One immutable polling result for a service.
///
/// Produced fresh on every poll cycle and replaced wholesale in the
/// registry; never mutated after being handed to the consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusInfo {
    #[serde(rename = "ServiceStatus")]
    pub service_status: ServiceState,
    #[serde(rename = "HTTPAccessStatus")]
    pub http_status: ProbeState,
    #[serde(rename = "NodeStatus")]
    pub nodes: Vec<NodeStatusEntry>,
    #[serde(rename = "ThisUpdate")]
    pub this_update: DateTime<Utc>,
    #[serde(rename = "NextUpdate", skip_serializing_if = "Option::is_none")]
    pub next_update: Option<DateTime<Utc>>,
}

/// Status of one service as reported by the REST API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    #[serde(rename = "ServiceName")]
    pub service_name: String,
    #[serde(rename = "StatusInfo", skip_serializing_if = "Option::is_none")]
    pub status_info: Option<StatusInfo>,
}
