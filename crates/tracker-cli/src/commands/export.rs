//! Export command implementation.

use anyhow::{Context, Result};
use time::{PrimitiveDateTime, UtcOffset};
use tracing::{debug, warn};
use tracker_store::{Store, TimeWindow, TrackOptions};

use crate::cli::ExportArgs;

pub fn cmd_export(args: &ExportArgs, quiet: bool) -> Result<()> {
    let window = if args.utc || !local_time_known() {
        TimeWindow::parse(&args.from, &args.before, UtcOffset::UTC)?
    } else {
        TimeWindow::parse(&args.from, &args.before, local_offset_at)?
    };
    if window.is_empty() {
        warn!("--from-date is not before --before-date, the track will be empty");
    }
    debug!("Exporting window {}", window);

    let path = args.store.path();
    let store =
        Store::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;

    let options = TrackOptions {
        include_hotspots: !args.no_hotspots,
        min_satellites: args.min_satellites,
        dedup_hotspots: args.dedup_hotspots,
        track_name: args.track_name.clone(),
    };
    let summary = store
        .export_track(&window, &options, &args.output)
        .with_context(|| format!("Failed to export to {}", args.output.display()))?;

    if !quiet {
        println!(
            "Wrote {} points and {} hotspots to {} ({} points below {} satellites dropped)",
            summary.points_written,
            summary.waypoints_written,
            args.output.display(),
            summary.points_filtered,
            args.min_satellites
        );
    }
    Ok(())
}

/// Whether the platform can report local offsets at all.
fn local_time_known() -> bool {
    match UtcOffset::current_local_offset() {
        Ok(_) => true,
        Err(e) => {
            warn!("Cannot determine local time zone ({}), reading dates as UTC", e);
            false
        }
    }
}

/// The local offset in effect at a local wall-clock time.
///
/// The first lookup reads the wall-clock time as UTC, the second looks up the
/// instant that guess gives.
fn local_offset_at(local: PrimitiveDateTime) -> UtcOffset {
    let guess = UtcOffset::local_offset_at(local.assume_utc()).unwrap_or(UtcOffset::UTC);
    UtcOffset::local_offset_at(local.assume_offset(guess)).unwrap_or(guess)
}
