//! Init command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use tracker_store::Store;

pub fn cmd_init(path: &Path, quiet: bool) -> Result<()> {
    Store::create(path)
        .with_context(|| format!("Failed to initialize {}", path.display()))?;

    if !quiet {
        println!("Initialized tracker database at {}", path.display());
    }
    Ok(())
}
