mod api;
mod bundled;
mod logging;
mod runtime;

use clap::Parser;
use reverie_core::config;

#[derive(Parser)]
#[command(
    name = "reverie",
    version,
    about = "Pluggable runtime for a long-lived, self-scheduling chat agent"
)]
struct Cli {
    /// Skip web authentication and load plugins from the dev plugin root.
    #[arg(long)]
    dev_mode: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = config::default_path();
    let cfg = config::load(&config_path)?;
    let _log_guard = logging::init(&cfg)?;
    match &cfg.source {
        Some(path) => tracing::info!("Config loaded from {}", path.display()),
        None => tracing::info!("Config file not found at {config_path}, using defaults"),
    }

    runtime::run(cfg, cli.dev_mode).await
}
