mod api;
mod client;
mod commands;
mod config;
mod domain;
mod server;
mod ssh;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "shepherd",
    version,
    about = "Control plane for discovering local/remote service activity"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestration daemon (REST API + polling engine)
    Serve {
        /// Path to the services configuration file
        #[arg(long = "sc", default_value = "./service-configuration.json")]
        service_config: String,

        /// Path to the nodes configuration file
        #[arg(long = "nc", default_value = "./node-configuration.json")]
        node_config: String,

        /// Bind host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Bind port
        #[arg(long, default_value = "6000")]
        port: u16,

        /// Log level (overridden by RUST_LOG)
        #[arg(long, default_value = "info")]
        log_level: String,
    },

    /// Query a running daemon's REST API
    Query {
        /// Daemon base URL
        #[arg(long, global = true, default_value = "http://127.0.0.1:6000")]
        url: String,

        /// Output format (table or json)
        #[arg(long, global = true, default_value = "table")]
        format: String,

        #[command(subcommand)]
        command: commands::query::QueryCommands,
    },

    /// Start a service on one of its bound nodes
    Start {
        service: String,
        node: String,

        /// Daemon base URL
        #[arg(long, default_value = "http://127.0.0.1:6000")]
        url: String,
    },

    /// Stop a service on one of its bound nodes
    Stop {
        service: String,
        node: String,

        /// Daemon base URL
        #[arg(long, default_value = "http://127.0.0.1:6000")]
        url: String,
    },

    /// Establish (or re-validate) a node's transport
    Connect {
        node: String,

        /// Daemon base URL
        #[arg(long, default_value = "http://127.0.0.1:6000")]
        url: String,
    },

    /// Drop a node's cached transport
    Disconnect {
        node: String,

        /// Daemon base URL
        #[arg(long, default_value = "http://127.0.0.1:6000")]
        url: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            service_config,
            node_config,
            host,
            port,
            log_level,
        } => commands::serve::run(service_config, node_config, host, port, log_level),
        Commands::Query {
            url,
            format,
            command,
        } => commands::query::run(&url, &format, &command),
        Commands::Start { service, node, url } => commands::control::start(&url, &service, &node),
        Commands::Stop { service, node, url } => commands::control::stop(&url, &service, &node),
        Commands::Connect { node, url } => commands::control::connect(&url, &node),
        Commands::Disconnect { node, url } => commands::control::disconnect(&url, &node),
    }
}
