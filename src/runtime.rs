//! Boot sequence: load plugins, wake them, serve the web front-end.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use reverie_core::config::Config;
use reverie_plugins::{BroadcastEvent, HostContext, PluginHost, PluginRegistry, WakeScheduler};
use tracing::{info, warn};

use crate::{api, bundled};

/// How long plugin tasks get to finish after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub async fn run(config: Config, dev_mode: bool) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let scheduler = Arc::new(WakeScheduler::from_config(&config.agent));
    let ctx = HostContext::new(Arc::clone(&config), Arc::clone(&scheduler), dev_mode);

    let root = config.plugins.root_for(dev_mode);
    info!(
        "{} starting (dev mode: {dev_mode}, plugins from {})",
        config.agent.name,
        root.display()
    );
    let mut registry = PluginRegistry::new();
    let loaded = registry.load_root(&root, &bundled::catalog(), &ctx);
    if loaded == 0 {
        warn!("No plugins loaded from {}", root.display());
    }

    let host = Arc::new(PluginHost::new(registry));
    ctx.bind_host(&host);

    let startup = host.broadcast(BroadcastEvent::Startup);
    info!("Startup sent to {} plugins", startup.len());
    drop(startup);

    let wake_loop = tokio::spawn(Arc::clone(&scheduler).run(Arc::clone(&host)));

    let app = api::build_router(&host, &config.web, dev_mode);
    let addr = format!("{}:{}", config.web.host, config.web.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind web front-end to {addr}"))?;
    info!("Web front-end listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("web front-end failed")?;

    wake_loop.abort();
    let outstanding = host.outstanding();
    if outstanding > 0 {
        info!("Waiting for {outstanding} plugin tasks");
    }
    let left = host.shutdown(SHUTDOWN_GRACE).await;
    if left > 0 {
        warn!("{left} plugin tasks still running at exit");
    }
    info!("{} stopped", config.agent.name);
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl-C received, shutting down"),
        Err(e) => warn!("Failed to listen for Ctrl-C: {e}"),
    }
}
