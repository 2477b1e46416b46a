//! Access Daemon - access request approval service
//!
//! The daemon provides:
//! - Mutating and validating admission webhooks for AccessRequests
//! - A resource API whose writes pass through the same admission chain
//! - The reconciliation loop that provisions RoleBindings for approved requests

use access_daemon::{AuthorizationConfig, DaemonConfig, DaemonError, DaemonResult, Server};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Access Daemon CLI
#[derive(Parser)]
#[command(name = "accessd")]
#[command(about = "Access Daemon - access request admission and reconciliation", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ACCESS_CONFIG")]
    config: Option<String>,

    /// Listen address (overrides the configuration file)
    #[arg(short, long, env = "ACCESS_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level (overrides the configuration file)
    #[arg(long, env = "ACCESS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "ACCESS_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let authorization = match &config.authorization {
        AuthorizationConfig::Static { approvers } => {
            format!("static ({} approver rules)", approvers.len())
        }
        AuthorizationConfig::Http(http) => format!("http ({})", http.endpoint),
    };

    // Print startup banner
    println!(
        r#"
     _                           _
    / \   ___ ___ ___  ___ ___  | |
   / _ \ / __/ __/ _ \/ __/ __| | |
  / ___ \ (_| (_|  __/\__ \__ \ |_|
 /_/   \_\___\___\___||___/___/ (_)

  Access Request Daemon
  Version: {}
  Authorization: {}
  Listening: {}
"#,
        env!("CARGO_PKG_VERSION"),
        authorization,
        config.server.listen_addr
    );

    // Create and run server
    let server = Server::new(config)?;
    server.run().await
}
