mod cli;
mod config;
mod coverage;
mod error;
mod events;
mod pipeline;
mod present;
mod result;
mod runner;
mod tracker;
mod walker;
mod watcher;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use cli::{Cli, Commands};
use config::WatchConfig;
use error::WatchError;
use pipeline::Pipeline;
use present::{ConsolePresenter, Presenter};
use runner::{GoTestRunner, TestRunner};
use watcher::classify::SourceFilter;
use watcher::debounce::Debouncer;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let color = !cli.no_color && std::io::stdout().is_terminal();

    match cli.command {
        Commands::Watch {
            path,
            debounce_ms,
            queue_depth,
            go,
        } => {
            let root = resolve_root(&path)?;
            let mut config = WatchConfig::load(&root);
            if let Some(ms) = debounce_ms {
                config = config.with_debounce(Duration::from_millis(ms));
            }
            if let Some(depth) = queue_depth {
                config = config.with_queue_depth(depth);
            }
            if let Some(go) = go {
                config = config.with_go_binary(go);
            }
            watch_tree(root, config, color).await
        }
        Commands::Run { path, go } => {
            let folder = resolve_root(&path)?;
            let mut config = WatchConfig::load(&folder);
            if let Some(go) = go {
                config = config.with_go_binary(go);
            }
            let passed = run_once(folder, &config, color).await;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// Absolute form of `path`, which must be an existing directory.
fn resolve_root(path: &Path) -> Result<PathBuf> {
    let root = std::path::absolute(path)
        .with_context(|| format!("failed to resolve {}", path.display()))?;
    if !root.is_dir() {
        return Err(WatchError::MissingRoot(root).into());
    }
    Ok(root)
}

async fn watch_tree(root: PathBuf, config: WatchConfig, color: bool) -> Result<()> {
    let filter = Arc::new(SourceFilter::new(&root, &config));
    let folders = walker::discover_source_folders(&filter)?;

    let (_watcher, change_rx) = watcher::start_watcher(&root)
        .with_context(|| format!("failed to watch {}", root.display()))?;

    let (settle_tx, settle_rx) = mpsc::channel::<PathBuf>(config.queue_depth);
    let debouncer = Debouncer::new(config.debounce, Arc::clone(&filter), settle_tx.clone());
    tokio::spawn(debouncer.consume(change_rx));

    // Every folder runs once up front to establish its baseline.
    let initial = folders.len();
    tokio::spawn(async move {
        for folder in folders {
            if settle_tx.send(folder).await.is_err() {
                return;
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            return;
        }
        let _ = shutdown_tx.send(true);
    });

    info!(
        root = %root.display(),
        folders = initial,
        debounce_ms = config.debounce.as_millis() as u64,
        "monitoring for changes"
    );

    let runner: Arc<dyn TestRunner> = Arc::new(GoTestRunner::new(&config));
    Pipeline::new(runner, config.queue_depth)
        .run(settle_rx, ConsolePresenter::stdout(color), shutdown_rx)
        .await;

    Ok(())
}

/// Run one folder's tests and print everything. Returns whether the run passed.
async fn run_once(folder: PathBuf, config: &WatchConfig, color: bool) -> bool {
    let runner = GoTestRunner::new(config);
    let result = pipeline::execute(&runner, folder).await;

    let mut presenter = ConsolePresenter::stdout(color);
    presenter.present(&result);

    !result.is_failure() && result.transport_error.is_none()
}
