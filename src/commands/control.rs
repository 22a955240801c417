//! `shepherd start|stop|connect|disconnect`
//!
//! Mutating commands against a running daemon's REST API.

use anyhow::Result;
use colored::Colorize;

use crate::client::OrchestratorClient;

pub fn start(url: &str, service: &str, node: &str) -> Result<()> {
    block_on(url, |client| async move {
        client.start(service, node).await?;
        println!(
            "{} started {} on {}",
            "ok".green().bold(),
            service.bold(),
            node
        );
        Ok(())
    })
}

pub fn stop(url: &str, service: &str, node: &str) -> Result<()> {
    block_on(url, |client| async move {
        client.stop(service, node).await?;
        println!(
            "{} stopped {} on {}",
            "ok".green().bold(),
            service.bold(),
            node
        );
        Ok(())
    })
}

pub fn connect(url: &str, node: &str) -> Result<()> {
    block_on(url, |client| async move {
        client.connect_node(node).await?;
        println!("{} connected {}", "ok".green().bold(), node.bold());
        Ok(())
    })
}

pub fn disconnect(url: &str, node: &str) -> Result<()> {
    block_on(url, |client| async move {
        client.disconnect_node(node).await?;
        println!("{} disconnected {}", "ok".green().bold(), node.bold());
        Ok(())
    })
}

fn block_on<F, Fut>(url: &str, f: F) -> Result<()>
where
    F: FnOnce(OrchestratorClient) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let client = OrchestratorClient::new(url)?;
        f(client).await
    })
}
