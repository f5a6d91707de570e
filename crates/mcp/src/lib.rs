mod tools;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use housekeep_core::config::AppConfig;
use housekeep_core::feed::Subscription;
use housekeep_core::services::TasksService;
use pmcp::types::capabilities::ServerCapabilities;
use pmcp::Server;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

pub use tools::TOOL_NAMES;

/// Runtime configuration for the housekeep MCP server.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub data_dir: Option<PathBuf>,
    pub log_filter: Option<String>,
}

/// Launch the MCP server using the provided configuration.
pub async fn run_server(config: ServerConfig) -> Result<()> {
    init_tracing(config.log_filter.clone())?;

    let app_config =
        AppConfig::discover(config.data_dir.clone()).context("failed to resolve data directory")?;
    let tasks_service =
        Arc::new(TasksService::new(&app_config).context("failed to initialize task service")?);

    tokio::spawn(log_snapshots(tasks_service.subscribe()));

    let server = build_server(tasks_service.clone()).context("failed to build MCP server")?;

    eprintln!(
        "Starting housekeep-mcp v{} (data dir: {}) with tools: {}",
        env!("CARGO_PKG_VERSION"),
        app_config.data_dir().display(),
        TOOL_NAMES.join(", ")
    );

    server
        .run_stdio()
        .await
        .map_err(|err| anyhow::anyhow!("MCP server error: {}", err))
}

/// Run the MCP server by creating an internal Tokio runtime.
pub fn run_server_blocking(config: ServerConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(run_server(config))
}

// stdout carries the protocol, so logs go to stderr.
fn init_tracing(filter: Option<String>) -> Result<()> {
    let filter = filter.unwrap_or_else(|| "info".to_string());
    let directive: Directive = filter.parse()?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
    Ok(())
}

async fn log_snapshots(mut subscription: Subscription) {
    while subscription.changed().await.is_ok() {
        let snapshot = subscription.borrow_and_update().clone();
        tracing::info!(
            version = snapshot.version,
            tasks = snapshot.tasks.len(),
            transactions = snapshot.transactions.len(),
            "records changed"
        );
    }
}

fn build_server(service: Arc<TasksService>) -> Result<Server> {
    let builder = Server::builder()
        .name("housekeep-mcp")
        .version(env!("CARGO_PKG_VERSION"))
        .capabilities(ServerCapabilities::tools_only());

    let builder = tools::register(builder, service);
    builder
        .build()
        .map_err(|err| anyhow::anyhow!(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builds_server_with_all_tools() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::from_data_dir(dir.path().to_path_buf()).unwrap();
        let service = Arc::new(TasksService::new(&config).unwrap());
        assert!(build_server(service).is_ok());
    }
}
