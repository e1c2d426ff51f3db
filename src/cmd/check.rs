//! `zonefold check`
//!
//! Runs admission and compilation over a manifest directory without
//! serving anything. Exits non-zero if any object would be rejected.

use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::PathBuf;
use zonefold_controller::{compile, sync_dir, ConfigStore, MemoryStore};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Directory of Zone and RecordSet manifests
    #[arg(long, env = "ZONEFOLD_MANIFESTS")]
    manifests: PathBuf,
}

pub async fn run_check(args: CheckArgs) -> Result<()> {
    let store = MemoryStore::new();
    let report = sync_dir(&store, &args.manifests)
        .with_context(|| format!("Failed to load manifests from {}", args.manifests.display()))?;

    for (path, error) in &report.rejected {
        eprintln!("{}: {}", path.display(), error);
    }
    if !report.rejected.is_empty() {
        bail!("{} object(s) rejected", report.rejected.len());
    }

    let zones = store.list_zones().await?;
    let record_sets = store.list_record_sets().await?;
    let snapshot = compile(&zones, &record_sets).context("Compilation failed")?;

    println!(
        "OK: {} zone(s), {} record set(s), {} record(s)",
        snapshot.len(),
        record_sets.len(),
        snapshot.record_count()
    );
    Ok(())
}
