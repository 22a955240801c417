//! Domain error taxonomy.
//!
//! Validation and registry-integrity errors are returned synchronously to
//! the caller and map to 400 responses. Connectivity and command errors are
//! surfaced on direct calls (connect, start, stop) but only logged when they
//! occur inside an autonomous polling cycle.

use thiserror::Error;

use super::types::Os;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("unknown node {0}")]
    UnknownNode(String),

    #[error("unknown service {0}")]
    UnknownService(String),

    #[error("node {0} already exists")]
    DuplicateNode(String),

    #[error("service {0} already exists")]
    DuplicateService(String),

    #[error("node {node} is in use by service {service}")]
    NodeInUse { node: String, service: String },

    #[error("service {service} has no node {node}")]
    NodeNotBound { node: String, service: String },

    #[error("node {0} has no connection")]
    NoConnection(String),

    #[error("remote/local access unsupported for {0} OS")]
    UnsupportedOs(Os),

    #[error("{0}")]
    Validation(String),

    #[error("node {node}: {message}")]
    Connect { node: String, message: String },

    #[error("command failed on node {node}: {message}")]
    Command { node: String, message: String },

    #[error("HTTP access {address}: {message}")]
    Probe { address: String, message: String },
}

impl OrchestratorError {
    /// Whether this error is the caller's fault (maps to 400 Bad Request).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            OrchestratorError::UnknownNode(_)
                | OrchestratorError::UnknownService(_)
                | OrchestratorError::DuplicateNode(_)
                | OrchestratorError::DuplicateService(_)
                | OrchestratorError::NodeInUse { .. }
                | OrchestratorError::NodeNotBound { .. }
                | OrchestratorError::NoConnection(_)
                | OrchestratorError::Validation(_)
        )
    }
}
