//! Reelhouse daemon: watches the media library, keeps the catalog current
//! and drives transcode jobs.

mod handlers;
mod infra;
mod routes;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use reelhouse_config::{ConfigLoad, ConfigLoader, ConfigLoaderOptions};
use reelhouse_core::{LibraryRoots, PathClassifier};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::infra::{startup::wire_runtime, telemetry::init_tracing};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "reelhouse-server")]
#[command(about = "Media library catalog with live watching and transcoding")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ConfigArgs {
    /// Path to reelhouse.toml (defaults to ./reelhouse.toml or ./config/reelhouse.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Path to an env file loaded before reading the environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone, Default)]
struct ServeArgs {
    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the daemon (default)
    Serve(ServeArgs),
    /// Print how paths map onto the media hierarchy, as JSON
    Classify {
        /// Absolute paths under a library root
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Library root to classify against; repeatable (overrides config)
        #[arg(long = "root")]
        roots: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let loader = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: cli.config.config.clone(),
        env_file: cli.config.env_file.clone(),
    });

    match cli.command {
        Some(Command::Classify { paths, roots }) => run_classify(&loader, paths, roots),
        Some(Command::Serve(args)) => run_server(&loader, args).await,
        None => run_server(&loader, ServeArgs::default()).await,
    }
}

fn run_classify(
    loader: &ConfigLoader,
    paths: Vec<PathBuf>,
    roots: Vec<PathBuf>,
) -> anyhow::Result<()> {
    let roots = if roots.is_empty() {
        loader
            .load()
            .context("failed to load configuration")?
            .config
            .library
            .roots
    } else {
        roots
    };
    let classifier = PathClassifier::new(LibraryRoots::new(roots));

    let results: Vec<_> = paths
        .iter()
        .map(|path| match classifier.classify(path) {
            Ok(media) => json!({ "path": path, "media": media }),
            Err(err) => json!({ "path": path, "error": err.to_string() }),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

async fn run_server(loader: &ConfigLoader, args: ServeArgs) -> anyhow::Result<()> {
    let load = loader.load().context("failed to load configuration")?;
    init_tracing();
    load.log_warnings();

    let ConfigLoad { mut config, .. } = load;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(path) = &config.source_path {
        info!(path = %path.display(), "configuration loaded");
    }
    for root in &config.library.roots {
        info!("Library root: {}", root.display());
    }
    info!(
        transcode.enabled = config.transcode.policy.enabled,
        transcode.program = %config.transcode.command.program,
        scheduler.concurrency_limit = config.scheduler.concurrency_limit,
        "transcode configuration in effect"
    );

    let runtime = wire_runtime(&config).await?;
    let shutdown = CancellationToken::new();
    let tasks = runtime.start(&shutdown).await?;

    let addr = config.server.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Admin API listening on {addr}");

    let app = routes::create_app(runtime.state.clone());
    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for ctrl-c: {err}");
                std::future::pending::<()>().await;
            }
            info!("shutdown requested");
            signal_token.cancel();
        })
        .await
        .context("admin server failed")?;

    shutdown.cancel();
    runtime.state.watcher.shutdown().await;
    for task in tasks {
        if let Err(err) = task.await {
            warn!("background task ended abnormally: {err}");
        }
    }
    info!("reelhouse stopped");
    Ok(())
}
