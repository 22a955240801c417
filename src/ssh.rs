//! Remote command execution over the system `ssh` binary.
//!
//! An `SshTransport` is the cached per-node handle: validated connection
//! arguments for one remote node. Every `run` opens one logical session
//! (one non-interactive ssh invocation) and closes it when the command
//! returns; `check` opens a throwaway session to re-validate a cached
//! handle before trusting it. Passphrase-protected keys rely on a running
//! ssh-agent, since BatchMode forbids prompting.

use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use crate::domain::error::OrchestratorError;
use crate::domain::node::Connection;

const CONNECT_TIMEOUT_SECS: u8 = 5;
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// ssh reserves exit status 255 for its own failures; anything else comes
/// from the remote command.
const SSH_FAILURE_STATUS: i32 = 255;

#[derive(Debug, Clone)]
pub struct SshTransport {
    target: String,
    port: String,
    key: String,
}

impl SshTransport {
    pub fn new(connection: &Connection) -> Self {
        Self {
            target: format!("{}@{}", connection.user, connection.host),
            port: connection.port.clone(),
            key: connection.ssh_key.clone(),
        }
    }

    /// Open and close a throwaway session. Success means the transport is
    /// live; failure means the cached handle must be discarded.
    pub async fn check(&self, node: &str) -> Result<(), OrchestratorError> {
        self.run(node, "true").await.map(|_| ())
    }

    /// Run one command in a fresh session, capturing standard output.
    pub async fn run(&self, node: &str, command: &str) -> Result<String, OrchestratorError> {
        let connect_timeout = format!("ConnectTimeout={CONNECT_TIMEOUT_SECS}");
        let mut cmd = Command::new("ssh");
        cmd.args([
            "-o",
            "BatchMode=yes",
            "-o",
            connect_timeout.as_str(),
            "-o",
            "StrictHostKeyChecking=accept-new",
            "-p",
            self.port.as_str(),
            "-i",
            self.key.as_str(),
            self.target.as_str(),
            command,
        ]);

        let output = timeout(COMMAND_TIMEOUT, cmd.output())
            .await
            .map_err(|_| OrchestratorError::Connect {
                node: node.to_string(),
                message: format!("command timed out after {}s", COMMAND_TIMEOUT.as_secs()),
            })?
            .map_err(|e| OrchestratorError::Connect {
                node: node.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if output.status.code() == Some(SSH_FAILURE_STATUS) {
                return Err(OrchestratorError::Connect {
                    node: node.to_string(),
                    message: if stderr.is_empty() {
                        "ssh session failed".to_string()
                    } else {
                        stderr
                    },
                });
            }
            return Err(OrchestratorError::Command {
                node: node.to_string(),
                message: format!("exit status {:?}: {}", output.status.code(), stderr),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
