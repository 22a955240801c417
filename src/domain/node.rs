//! Nodes — named local or remote execution targets.
//!
//! A local node runs commands as `bash -c` child processes. A remote node
//! requires a validated `Connection` and runs commands through a cached SSH
//! transport owned by the registry.

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use super::error::OrchestratorError;
use super::types::{NodeAvailability, Os};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "NodeName")]
    pub name: String,
    #[serde(rename = "OS")]
    pub os: Os,
    #[serde(rename = "StartImmediately", default)]
    pub start_immediately: bool,
    #[serde(rename = "Remote", default)]
    pub remote: bool,
    #[serde(rename = "Connection", default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<Connection>,
    #[serde(skip)]
    pub availability: NodeAvailability,
}

/// Remote-access descriptor. Owned exclusively by one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Port", default)]
    pub port: String,
    #[serde(rename = "User", default)]
    pub user: String,
    #[serde(rename = "SSHKey")]
    pub ssh_key: String,
    #[serde(rename = "PassPhrase", default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
}

impl Node {
    /// Validate the node and normalize its connection in place.
    ///
    /// A remote node must carry a connection; a local node's connection, if
    /// present, is ignored at execution time.
    pub fn validate(&mut self) -> Result<(), OrchestratorError> {
        if self.name.is_empty() {
            return Err(OrchestratorError::Validation(
                "node name must not be empty".to_string(),
            ));
        }
        if self.remote {
            match self.connection.as_mut() {
                Some(connection) => connection.normalize()?,
                None => return Err(OrchestratorError::NoConnection(self.name.clone())),
            }
        }
        Ok(())
    }
}

impl Connection {
    /// Apply defaults and reject malformed fields.
    ///
    /// Port defaults to 22, user to "root". The SSH key path is required and
    /// a leading `~/` is expanded to the invoking user's home directory.
    pub fn normalize(&mut self) -> Result<(), OrchestratorError> {
        if self.host.is_empty() {
            return Err(OrchestratorError::Validation(
                "connection host must not be empty".to_string(),
            ));
        }
        if self.port.is_empty() {
            self.port = "22".to_string();
        }
        if self.port.parse::<u16>().is_err() {
            return Err(OrchestratorError::Validation(format!(
                "connection port {} is not a valid port number",
                self.port
            )));
        }
        if self.user.is_empty() {
            self.user = "root".to_string();
        }
        if self.ssh_key.is_empty() {
            return Err(OrchestratorError::Validation(
                "connection requires an SSH key path".to_string(),
            ));
        }
        if let Some(rest) = self.ssh_key.strip_prefix("~/") {
            let home = dirs::home_dir().ok_or_else(|| {
                OrchestratorError::Validation(
                    "cannot expand ~ in SSH key path: no home directory".to_string(),
                )
            })?;
            self.ssh_key = home.join(rest).to_string_lossy().into_owned();
        }
        Ok(())
    }
}

/// Run a command locally through `bash -c`, capturing standard output.
pub async fn run_local(node: &str, command: &str) -> Result<String, OrchestratorError> {
    let output = Command::new("bash")
        .arg("-c")
        .arg(command)
        .output()
        .await
        .map_err(|e| OrchestratorError::Command {
            node: node.to_string(),
            message: e.to_string(),
        })?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
