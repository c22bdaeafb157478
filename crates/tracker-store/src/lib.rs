//! Local persistence for LoRaWAN GPS tracker reports.
//!
//! This crate stores decoded uplinks in SQLite and reads them back as a
//! GPX track.
//!
//! # Features
//!
//! - One-time schema creation
//! - Atomic ingestion of a report with its point, hotspots and labels
//! - Deduplicated identifiers, device names, labels and hotspots
//! - Half-open time window queries for points and hotspots
//! - GPX 1.1 export with satellite filtering and hotspot waypoints
//!
//! # Example
//!
//! ```no_run
//! use tracker_store::{Store, TimeWindow, TrackOptions};
//! use time::UtcOffset;
//!
//! let mut store = Store::open_or_create("tracker.db")?;
//! store.record(br#"{"app_eui": "1", "dev_eui": "2", "reported_at": 1679140800000,
//!                   "decoded": {"payload": {"latitude": 10.0, "longitude": 20.0}}}"#)?;
//!
//! let window = TimeWindow::parse("2023-03-18", "2023-03-19", UtcOffset::UTC)?;
//! store.export_track(&window, &TrackOptions::default(), "track.gpx".as_ref())?;
//! # Ok::<(), tracker_store::Error>(())
//! ```

mod error;
mod export;
mod ingest;
mod models;
mod queries;
mod schema;
mod store;

pub use error::{Error, Result};
pub use export::{ExportSummary, HOTSPOT_DESCRIPTION, TrackExporter, TrackOptions};
pub use ingest::{ValidationError, validate};
pub use models::{
    HotspotRow, IngestReceipt, NewReport, StoredHotspotName, StoredReport, TrackPointRow,
};
pub use queries::{OffsetAt, TimeWindow, parse_boundary, unix_millis};
pub use schema::TABLES;
pub use store::{ReportWriter, Store};

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/lora-tracker/tracker.db`
/// - macOS: `~/Library/Application Support/lora-tracker/tracker.db`
/// - Windows: `C:\Users\<user>\AppData\Local\lora-tracker\tracker.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("lora-tracker")
        .join("tracker.db")
}
