//! `shepherd query nodes|services|statuses`
//!
//! Read-only commands against a running daemon's REST API.

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use crate::client::OrchestratorClient;
use crate::domain::types::{NodeServiceState, ServiceState, ServiceStatus};

#[derive(Subcommand)]
pub enum QueryCommands {
    /// List registered nodes
    Nodes {
        /// Limit to one node
        name: Option<String>,
    },
    /// List registered services
    Services {
        /// Limit to one service
        name: Option<String>,
    },
    /// Show service statuses
    Statuses {
        /// Limit to one service
        name: Option<String>,
    },
}

pub fn run(url: &str, format: &str, command: &QueryCommands) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let client = OrchestratorClient::new(url)?;
        match command {
            QueryCommands::Nodes { name } => nodes(&client, format, name.as_deref()).await,
            QueryCommands::Services { name } => services(&client, format, name.as_deref()).await,
            QueryCommands::Statuses { name } => statuses(&client, format, name.as_deref()).await,
        }
    })
}

async fn nodes(client: &OrchestratorClient, format: &str, name: Option<&str>) -> Result<()> {
    let nodes = match name {
        Some(name) => vec![client.node(name).await?],
        None => client.nodes().await?,
    };
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }
    println!("{}", "Nodes".bold());
    println!();
    for node in &nodes {
        let target = match &node.connection {
            Some(conn) => format!("{}@{}:{}", conn.user, conn.host, conn.port),
            None => "local".to_string(),
        };
        println!(
            "  {} ({}) — {}",
            node.name.bold(),
            node.os,
            target.dimmed()
        );
    }
    println!();
    Ok(())
}

async fn services(client: &OrchestratorClient, format: &str, name: Option<&str>) -> Result<()> {
    let services = match name {
        Some(name) => vec![client.service(name).await?],
        None => client.services().await?,
    };
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&services)?);
        return Ok(());
    }
    println!("{}", "Services".bold());
    println!();
    for service in &services {
        let interval = if service.repeating() {
            format!("every {}s", service.interval_secs)
        } else {
            "one-shot".to_string()
        };
        println!(
            "  {} — {} probe(s), nodes: {} ({})",
            service.name.bold(),
            service.probes.len(),
            service.nodes.join(", "),
            interval.dimmed()
        );
    }
    println!();
    Ok(())
}

async fn statuses(client: &OrchestratorClient, format: &str, name: Option<&str>) -> Result<()> {
    let statuses = match name {
        Some(name) => vec![client.status(name).await?],
        None => client.statuses().await?,
    };
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }
    println!("{}", "Service Statuses".bold());
    println!();
    for status in &statuses {
        print_status(status);
    }
    Ok(())
}

fn print_status(status: &ServiceStatus) {
    let Some(info) = &status.status_info else {
        println!(
            "  {} — {}",
            status.service_name.bold(),
            "no poll completed yet".dimmed()
        );
        return;
    };
    let state = match info.service_status {
        ServiceState::Active => "Active".green().bold(),
        ServiceState::Failed => "Failed".red().bold(),
        ServiceState::Inactive => "Inactive".yellow().bold(),
        ServiceState::Undefined => "Undefined".dimmed(),
    };
    println!(
        "  {} — {} (HTTP: {:?}, updated {})",
        status.service_name.bold(),
        state,
        info.http_status,
        info.this_update.format("%Y-%m-%d %H:%M:%S UTC")
    );
    for node in &info.nodes {
        let node_state = match node.status {
            NodeServiceState::Active => "active".green(),
            NodeServiceState::Inactive => "inactive".yellow(),
            NodeServiceState::Disconnected => "disconnected".red(),
            NodeServiceState::UnknownOs => "unknown OS".dimmed(),
        };
        println!("      {} — {}", node.node_name, node_state);
    }
    println!();
}
