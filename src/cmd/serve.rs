//! `zonefold serve`
//!
//! Loads the manifest directory into an in-memory store, keeps it in sync
//! by rescanning, and serves the compiled zones over UDP and TCP until
//! shutdown.

use anyhow::{Context, Result};
use clap::Args;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use zonefold_controller::{sync_dir, MemoryStore, ReconcilerConfig, ZoneReconciler};
use zonefold_dns::{DnsServer, DnsServerConfig, ServingIndex, ZoneHandler};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on for DNS (UDP and TCP)
    #[arg(long, env = "ZONEFOLD_DNS_ADDRESS", default_value = "0.0.0.0:5353")]
    dns_address: SocketAddr,

    /// Directory of Zone and RecordSet manifests
    #[arg(long, env = "ZONEFOLD_MANIFESTS")]
    manifests: PathBuf,

    /// Only serve objects from this namespace
    #[arg(long, env = "ZONEFOLD_NAMESPACE")]
    namespace: Option<String>,

    /// How often to rescan the manifest directory
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
    rescan_interval: Duration,

    /// Idle timeout for TCP connections
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    tcp_timeout: Duration,
}

pub async fn run_serve(args: ServeArgs, shutdown: watch::Receiver<bool>) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let report = sync_dir(&store, &args.manifests)
        .with_context(|| format!("Failed to load manifests from {}", args.manifests.display()))?;
    if !report.rejected.is_empty() {
        warn!(rejected = report.rejected.len(), "Some manifests were rejected and will not be served");
    }

    let mut config = ReconcilerConfig::default();
    if let Some(namespace) = &args.namespace {
        config = config.with_namespace(namespace.clone());
    }
    let index = ServingIndex::new();
    let reconciler = Arc::new(ZoneReconciler::new(store.clone(), index.clone(), config));

    let reconcile_task = tokio::spawn({
        let reconciler = reconciler.clone();
        let shutdown = shutdown.clone();
        async move { reconciler.run(shutdown).await }
    });
    let rescan_task = tokio::spawn(rescan(
        store,
        args.manifests.clone(),
        args.rescan_interval,
        shutdown.clone(),
    ));

    let dns_config = DnsServerConfig::new(args.dns_address).with_tcp_timeout(args.tcp_timeout);
    info!(
        addr = %dns_config.bind_addr,
        manifests = %args.manifests.display(),
        "Starting zonefold"
    );

    let served = tokio::select! {
        result = DnsServer::start(&dns_config, ZoneHandler::new(index)) => result,
        _ = shutdown_requested(shutdown) => Ok(()),
    };

    // The DNS server may have exited on its own; stop the background tasks too
    rescan_task.abort();
    reconcile_task.abort();
    served
}

/// Resync the store from disk every `interval`; failures keep the last good state
async fn rescan(
    store: Arc<MemoryStore>,
    dir: PathBuf,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately; the initial sync already ran
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => resync(&store, &dir),
            _ = shutdown.changed() => break,
        }
    }
}

fn resync(store: &MemoryStore, dir: &Path) {
    match sync_dir(store, dir) {
        Ok(report) if !report.rejected.is_empty() => {
            warn!(rejected = report.rejected.len(), "Rescan rejected some manifests");
        }
        Ok(_) => {}
        Err(e) => warn!(dir = %dir.display(), error = %e, "Rescan failed; keeping current configuration"),
    }
}

async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            // sender gone; nothing will ever request shutdown
            std::future::pending::<()>().await;
        }
    }
}
