//! Services — named deployable units bound to one or more nodes.

use serde::{Deserialize, Serialize};

use super::error::OrchestratorError;
use super::probe::HttpProbe;
use super::types::StatusInfo;

/// A monitored unit: HTTP probes plus per-node service-manager checks,
/// polled every `interval_secs` seconds (≤ 0 means poll once and stop).
///
/// `status` and `epoch` are runtime-only. `epoch` is a generation counter:
/// an update replaces the service wholesale under a new epoch, and the
/// superseded polling task retires itself when the epochs no longer match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(rename = "ServiceName")]
    pub name: String,
    #[serde(rename = "URL", default)]
    pub url: String,
    #[serde(rename = "HTTPAccess", default, skip_serializing_if = "Vec::is_empty")]
    pub probes: Vec<HttpProbe>,
    #[serde(rename = "Timeout", default)]
    pub interval_secs: i64,
    #[serde(rename = "Nodes")]
    pub nodes: Vec<String>,
    #[serde(skip)]
    pub status: Option<StatusInfo>,
    #[serde(skip)]
    pub epoch: u64,
}

impl Service {
    /// Validate fields that need no registry access. Node-name resolution
    /// happens at registration time.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.name.is_empty() {
            return Err(OrchestratorError::Validation(
                "service name must not be empty".to_string(),
            ));
        }
        if self.nodes.is_empty() {
            return Err(OrchestratorError::Validation(format!(
                "service {} must bind at least one node",
                self.name
            )));
        }
        for probe in &self.probes {
            probe.validate()?;
        }
        Ok(())
    }

    pub fn repeating(&self) -> bool {
        self.interval_secs > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str, nodes: &[&str]) -> Service {
        Service {
            name: name.to_string(),
            url: String::new(),
            probes: Vec::new(),
            interval_secs: 30,
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
            status: None,
            epoch: 0,
        }
    }

    #[test]
    fn validate_requires_name_and_nodes() {
        assert!(service("web", &["n1"]).validate().is_ok());
        assert!(service("", &["n1"]).validate().is_err());
        assert!(service("web", &[]).validate().is_err());
    }

    #[test]
    fn validate_checks_each_probe() {
        let mut svc = service("web", &["n1"]);
        svc.probes.push(HttpProbe {
            method: "TRACE".to_string(),
            address: "http://127.0.0.1/health".to_string(),
            status_code: 200,
            headers: Default::default(),
        });
        assert!(svc.validate().is_err());
    }

    #[test]
    fn non_positive_interval_means_one_shot() {
        let mut svc = service("web", &["n1"]);
        svc.interval_secs = 0;
        assert!(!svc.repeating());
        svc.interval_secs = -1;
        assert!(!svc.repeating());
        svc.interval_secs = 1;
        assert!(svc.repeating());
    }
}
