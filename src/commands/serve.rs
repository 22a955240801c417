use std::path::PathBuf;

use anyhow::Result;

use crate::server::{self, ServeOptions};

pub fn run(
    service_config: String,
    node_config: String,
    host: String,
    port: u16,
    log_level: String,
) -> Result<()> {
    // Build tokio runtime explicitly (no #[tokio::main] on fn main)
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::run(ServeOptions {
        service_config: PathBuf::from(service_config),
        node_config: PathBuf::from(node_config),
        bind: format!("{host}:{port}"),
        log_level,
    }))
}
