use std::path::PathBuf;

use clap::Parser;

use mcp_compat_proxy::config::loader::load_config;
use mcp_compat_proxy::lifecycle::startup;
use mcp_compat_proxy::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "mcp-compat-proxy", version)]
#[command(about = "Session compatibility proxy for streamable-HTTP MCP servers")]
struct Cli {
    /// TOML configuration file; defaults and environment apply without one
    #[arg(short, long, env = "MCP_COMPAT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.authority(),
        detection = %config.session.detection,
        eager_bootstrap = config.session.eager_bootstrap,
        single_flight = config.session.single_flight,
        "Configuration loaded"
    );

    startup::run(config).await?;
    Ok(())
}
