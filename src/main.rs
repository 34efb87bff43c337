use std::sync::Arc;

use clap::Parser;
use github2karakeep::config::{Cli, Config};
use github2karakeep::github::GithubClient;
use github2karakeep::karakeep::KarakeepClient;
use github2karakeep::scheduler::Scheduler;
use github2karakeep::sync::{Reconciler, ReconcilerOptions, SyncPass};
use github2karakeep::unpack_error;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("github2karakeep starting");

    let cfg = Config::resolve(&args).unwrap_or_else(|e| {
        tracing::error!(error = %format!("{:#}", e), "failed to load config");
        std::process::exit(1);
    });

    let github = GithubClient::new(cfg.timeout, &cfg.github.api_url, &cfg.github.token, cfg.github.per_page)
        .unwrap_or_else(|e| {
            tracing::error!(error = %unpack_error(&e), "failed to setup github client");
            std::process::exit(1);
        });
    let karakeep = KarakeepClient::new(cfg.timeout, &cfg.karakeep.host, &cfg.karakeep.token, &cfg.karakeep.default_tag)
        .unwrap_or_else(|e| {
            tracing::error!(error = %unpack_error(&e), "failed to setup karakeep client");
            std::process::exit(1);
        });

    let reconciler = Arc::new(Reconciler::new(
        Arc::new(github),
        Arc::new(karakeep),
        ReconcilerOptions {
            user: cfg.github.user.clone(),
            list_name: cfg.karakeep.list.clone(),
            export_limit: cfg.sync.export_limit,
            extract_topics: cfg.github.extract_topics,
        },
    ));

    if args.once {
        if let Err(e) = reconciler.run_pass().await {
            tracing::error!(error = %unpack_error(&e), "failed to execute exporter");
            std::process::exit(1);
        }
        return;
    }

    tracing::info!(interval = ?cfg.sync.interval, "scheduling exporter");
    let scheduler = Scheduler::start(reconciler, cfg.sync.interval);

    shutdown_signal().await;
    tracing::info!(state = ?scheduler.state(), "shutdown signal received, waiting for running pass");
    scheduler.stop().await;
    tracing::info!("github2karakeep going off, graceful shutdown complete");
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal as unix_signal};

    let mut terminate = match unix_signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to install SIGTERM handler");
            let _ = signal::ctrl_c().await;
            return;
        }
    };
    let mut hangup = match unix_signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to install SIGHUP handler");
            let _ = signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = signal::ctrl_c() => {}
        _ = terminate.recv() => {}
        _ = hangup.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
}
