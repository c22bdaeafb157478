//! Ingest command implementation.
//!
//! Replays saved uplink bodies through the same path the service uses.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;
use tracker_store::Store;

pub fn cmd_ingest(path: &Path, files: &[PathBuf], quiet: bool) -> Result<()> {
    let mut store =
        Store::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    let mut stored = 0usize;
    let mut failed = 0usize;

    for file in files {
        debug!("Ingesting {}", file.display());
        let result = std::fs::read(file)
            .with_context(|| format!("Failed to read {}", file.display()))
            .and_then(|body| Ok(store.record(&body)?));

        match result {
            Ok(receipt) => {
                stored += 1;
                if !quiet {
                    println!(
                        "{}: report {} ({} hotspots)",
                        file.display(),
                        receipt.report_id,
                        receipt.hotspot_connections
                    );
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}: {:#}", file.display(), e);
            }
        }
    }

    if !quiet {
        println!("Stored {} of {} reports", stored, files.len());
    }
    if failed > 0 {
        bail!("{} of {} files could not be stored", failed, files.len());
    }
    Ok(())
}
