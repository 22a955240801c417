//! OS-specific service-manager command templates and output parsing.
//!
//! The supported (OS, operation) combinations form a closed set resolved at
//! dispatch time. Windows has no supported service-manager integration and
//! always yields an explicit unsupported-OS error, never a silent fallback.

use super::error::OrchestratorError;
use super::types::Os;

/// A service-manager operation dispatched to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOp {
    IsActive,
    Start,
    Stop,
}

/// Resolve the shell command for an operation on the given OS.
pub fn command_for(os: Os, op: ServiceOp, service: &str) -> Result<String, OrchestratorError> {
    let template = match (os, op) {
        (Os::Linux, ServiceOp::IsActive) => "systemctl is-active {} --quiet; echo $?",
        (Os::Linux, ServiceOp::Start) => "systemctl start {}",
        (Os::Linux, ServiceOp::Stop) => "systemctl stop {}",
        (Os::Darwin, ServiceOp::IsActive) => "launchctl list | grep {}",
        (Os::Darwin, ServiceOp::Start) => "launchctl load {}",
        (Os::Darwin, ServiceOp::Stop) => "launchctl unload {}",
        (Os::Windows, _) => return Err(OrchestratorError::UnsupportedOs(Os::Windows)),
    };
    Ok(template.replacen("{}", service, 1))
}

/// Interpret captured is-active output.
///
/// Linux commands embed `; echo $?`, so the final trimmed line carries the
/// exit code and exactly "0" means active. Darwin infers activity from a
/// non-empty `launchctl list | grep` result.
pub fn parse_is_active(os: Os, output: &str) -> bool {
    match os {
        Os::Linux => output.trim_end().lines().last().map(str::trim) == Some("0"),
        Os::Darwin => !output.trim().is_empty(),
        Os::Windows => false,
    }
}
