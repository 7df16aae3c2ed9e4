use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use calp::config::Settings;
use calp::provider::ProviderStore;
use calp::watcher::handlers::ProviderFileHandler;
use calp::watcher::{FileWatcher, Op, WatchError};

#[derive(Parser)]
#[command(name = "calp")]
#[command(about = "Watch provider files and serve them over HTTP")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the first of the standard search paths)
    #[arg(short, long, env = "CALP_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address (overrides config)
    #[arg(short, long)]
    address: Option<String>,

    /// Enable debug mode (CORS for the configured origin)
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("failed parsing config")?;

    if let Some(address) = cli.address {
        settings.webserver.address = address;
    }
    if cli.debug {
        settings.webserver.debug = true;
    }

    calp::logging::init_with_config(&settings.logging);

    let store = Arc::new(ProviderStore::new());

    let watcher = FileWatcher::new(settings.watcher.replay_existing)
        .context("failed creating file watcher")?;

    for path in &settings.providers {
        watcher
            .add_path(path)
            .with_context(|| format!("failed adding file watcher path {}", path.display()))?;
    }
    if settings.providers.is_empty() {
        calp::warn_event!("calp", "no provider paths configured");
    }

    watcher.handle(
        Op::CREATE | Op::WRITE,
        ProviderFileHandler::new(store.clone()).with_extensions(&settings.watcher.extensions),
    );
    watcher.handle_error(|e: &WatchError| {
        calp::error_event!("watcher", "error", "{e}");
    });

    watcher.start().context("failed starting file watcher")?;
    calp::log_event!(
        "calp",
        "loaded",
        "{} providers from {} paths",
        store.len(),
        settings.providers.len()
    );

    let done = watcher.done();
    let watcher_done = tokio::task::spawn_blocking(move || {
        let _ = done.recv();
    });
    let shutdown = async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => calp::log_event!("calp", "shutdown signal"),
                Err(e) => calp::error_event!("calp", "failed to listen for ctrl+c", "{e}"),
            },
            _ = watcher_done => {
                calp::warn_event!("watcher", "dispatch loop ended");
            }
        }
    };

    let result = run(store, &settings, shutdown).await;

    watcher.close().context("failed closing file watcher")?;
    result
}

#[cfg(feature = "http-server")]
async fn run<F>(store: Arc<ProviderStore>, settings: &Settings, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    calp::server::serve(store, &settings.webserver, shutdown)
        .await
        .context("failed running web server")
}

#[cfg(not(feature = "http-server"))]
async fn run<F>(_store: Arc<ProviderStore>, _settings: &Settings, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    shutdown.await;
    Ok(())
}
