//! GPX export of a stored track.
//!
//! The exporter turns the rows of the windowed queries into a GPX 1.1
//! document with one track and one segment, plus an optional waypoint per
//! hotspot observation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use geo_types::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{HotspotRow, TrackPointRow};
use crate::queries::TimeWindow;
use crate::store::{Store, is_null_island};

/// Description given to every hotspot waypoint.
pub const HOTSPOT_DESCRIPTION: &str = "Helium hotspot";

/// Creator attribute of exported documents.
const CREATOR: &str = concat!("tracker-store ", env!("CARGO_PKG_VERSION"));

/// Options for building a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackOptions {
    /// Emit a waypoint per hotspot observation.
    pub include_hotspots: bool,
    /// Points reporting fewer satellites than this are dropped.
    pub min_satellites: u32,
    /// Keep only the first waypoint per hotspot name.
    pub dedup_hotspots: bool,
    /// Optional name of the track element.
    pub track_name: Option<String>,
}

impl Default for TrackOptions {
    fn default() -> Self {
        Self {
            include_hotspots: true,
            min_satellites: 3,
            dedup_hotspots: false,
            track_name: None,
        }
    }
}

/// Counts from one export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    /// Track points written.
    pub points_written: usize,
    /// Points dropped for too few satellites.
    pub points_filtered: usize,
    /// Hotspot waypoints written.
    pub waypoints_written: usize,
}

/// Builds and writes GPX tracks.
#[derive(Debug, Clone, Default)]
pub struct TrackExporter {
    options: TrackOptions,
}

impl TrackExporter {
    /// Create an exporter with the given options.
    pub fn new(options: TrackOptions) -> Self {
        Self { options }
    }

    /// The options this exporter was built with.
    pub fn options(&self) -> &TrackOptions {
        &self.options
    }

    /// Whether a point passes the satellite filter.
    ///
    /// Points without a satellite count always pass.
    pub fn keeps(&self, point: &TrackPointRow) -> bool {
        point
            .satellites
            .is_none_or(|sats| sats >= self.options.min_satellites)
    }

    /// Build the GPX document for the given rows.
    pub fn build(&self, points: &[TrackPointRow], hotspots: &[HotspotRow]) -> Gpx {
        self.build_with_summary(points, hotspots).0
    }

    fn build_with_summary(
        &self,
        points: &[TrackPointRow],
        hotspots: &[HotspotRow],
    ) -> (Gpx, ExportSummary) {
        let mut summary = ExportSummary::default();

        let mut segment = TrackSegment::new();
        for point in points {
            if self.keeps(point) {
                segment.points.push(track_point(point));
            } else {
                summary.points_filtered += 1;
            }
        }
        summary.points_written = segment.points.len();

        let mut track = Track::new();
        track.name = self.options.track_name.clone();
        track.segments.push(segment);

        let mut waypoints = Vec::new();
        if self.options.include_hotspots {
            let mut seen = HashSet::new();
            for hotspot in hotspots {
                let Some(waypoint) = hotspot_waypoint(hotspot) else {
                    debug!("Skipping hotspot {} without a location", hotspot.name);
                    continue;
                };
                if self.options.dedup_hotspots && !seen.insert(hotspot.name.as_str()) {
                    continue;
                }
                waypoints.push(waypoint);
            }
        }
        summary.waypoints_written = waypoints.len();

        let gpx = Gpx {
            version: GpxVersion::Gpx11,
            creator: Some(CREATOR.to_string()),
            waypoints,
            tracks: vec![track],
            ..Default::default()
        };
        (gpx, summary)
    }

    /// Write a document to `path`, replacing any existing file.
    ///
    /// The document is serialized in full and written to a temporary file
    /// next to `path`, which is then renamed over it.
    pub fn write(&self, gpx: &Gpx, path: &Path) -> Result<()> {
        let mut buf = Vec::new();
        gpx::write(gpx, &mut buf)?;

        let tmp = temp_path(path)?;
        std::fs::write(&tmp, &buf).map_err(|source| Error::Export {
            path: tmp.clone(),
            source,
        })?;

        if let Err(source) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(Error::Export {
                path: path.to_path_buf(),
                source,
            });
        }

        debug!("Wrote {} bytes to {}", buf.len(), path.display());
        Ok(())
    }
}

fn track_point(row: &TrackPointRow) -> Waypoint {
    let mut waypoint = Waypoint::new(Point::new(row.longitude, row.latitude));
    waypoint.elevation = row.altitude;
    waypoint.time = row.time().map(Into::into);
    waypoint.pdop = row.accuracy;
    waypoint.sat = row.satellites.map(u64::from);
    waypoint
}

fn hotspot_waypoint(row: &HotspotRow) -> Option<Waypoint> {
    let (latitude, longitude) = (row.latitude?, row.longitude?);
    if is_null_island(latitude, longitude) {
        return None;
    }
    let mut waypoint = Waypoint::new(Point::new(longitude, latitude));
    waypoint.name = Some(row.name.clone());
    waypoint.symbol = Some(row.name.clone());
    waypoint.description = Some(HOTSPOT_DESCRIPTION.to_string());
    Some(waypoint)
}

fn temp_path(path: &Path) -> Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| Error::Export {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file path"),
    })?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".tmp");
    Ok(path.with_file_name(tmp_name))
}

impl Store {
    /// Export the track of a time window to a GPX file.
    pub fn export_track(
        &self,
        window: &TimeWindow,
        options: &TrackOptions,
        path: &Path,
    ) -> Result<ExportSummary> {
        let points = self.points_in_window(window)?;
        let hotspots = if options.include_hotspots {
            self.hotspots_in_window(window)?
        } else {
            Vec::new()
        };

        let exporter = TrackExporter::new(options.clone());
        let (gpx, summary) = exporter.build_with_summary(&points, &hotspots);
        exporter.write(&gpx, path)?;

        info!(
            points = summary.points_written,
            filtered = summary.points_filtered,
            waypoints = summary.waypoints_written,
            "Exported {} to {}",
            window,
            path.display()
        );
        Ok(summary)
    }
}
