//! Time windows for reading the track back.
//!
//! A [`TimeWindow`] is half-open: it contains `from_ms` and excludes
//! `before_ms`. A window whose start is not before its end is empty and
//! matches nothing.
//!
//! # Example
//!
//! ```
//! use tracker_store::{Store, TimeWindow};
//! use time::UtcOffset;
//!
//! let store = Store::open_in_memory()?;
//! let window = TimeWindow::parse("2023-03-18", "2023-03-19", UtcOffset::UTC)?;
//!
//! let points = store.points_in_window(&window)?;
//! let hotspots = store.hotspots_in_window(&window)?;
//! assert!(points.is_empty() && hotspots.is_empty());
//! # Ok::<(), tracker_store::Error>(())
//! ```

use std::fmt;

use time::format_description::{BorrowedFormatItem, well_known::Rfc3339};
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::{Error, Result};

pub(crate) const POINTS_IN_WINDOW_SQL: &str = "\
    SELECT points.lat, points.lng, points.alt, points.accuracy, points.satellites,
           reports.reported_at_ms
    FROM reports
    INNER JOIN points ON points.report_id = reports.id
    WHERE reports.reported_at_ms >= ?1 AND reports.reported_at_ms < ?2
    ORDER BY reports.reported_at_ms ASC, points.id ASC";

pub(crate) const HOTSPOTS_IN_WINDOW_SQL: &str = "\
    SELECT hotspot_names.name, hotspot_names.lat, hotspot_names.lng
    FROM reports
    INNER JOIN hotspot_connections ON hotspot_connections.report_id = reports.id
    INNER JOIN hotspot_names ON hotspot_names.id = hotspot_connections.name_id
    WHERE reports.reported_at_ms >= ?1 AND reports.reported_at_ms < ?2
    ORDER BY reports.reported_at_ms ASC, hotspot_connections.id ASC";

/// Timestamp forms accepted without an explicit offset.
const NAIVE_DATETIME_FORMATS: &[&[BorrowedFormatItem<'static>]] = &[
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
];

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Where the UTC offset of a wall-clock time without one comes from.
///
/// A fixed [`UtcOffset`] applies to every date. A function of the wall-clock
/// time can follow a time zone's rules, so dates on either side of a
/// daylight saving change get different offsets.
pub trait OffsetAt {
    /// The offset in effect at `local`.
    fn offset_at(&self, local: PrimitiveDateTime) -> UtcOffset;
}

impl OffsetAt for UtcOffset {
    fn offset_at(&self, _local: PrimitiveDateTime) -> UtcOffset {
        *self
    }
}

impl<F> OffsetAt for F
where
    F: Fn(PrimitiveDateTime) -> UtcOffset,
{
    fn offset_at(&self, local: PrimitiveDateTime) -> UtcOffset {
        self(local)
    }
}

/// Half-open interval of report timestamps, in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// Inclusive start.
    pub from_ms: i64,
    /// Exclusive end.
    pub before_ms: i64,
}

impl TimeWindow {
    /// Create a window from raw millisecond bounds.
    pub fn new(from_ms: i64, before_ms: i64) -> Self {
        Self { from_ms, before_ms }
    }

    /// Create a window from two instants.
    pub fn between(from: OffsetDateTime, before: OffsetDateTime) -> Self {
        Self::new(unix_millis(from), unix_millis(before))
    }

    /// Parse both bounds with [`parse_boundary`].
    pub fn parse<O: OffsetAt>(from: &str, before: &str, offsets: O) -> Result<Self> {
        Ok(Self::between(
            parse_with(from, &offsets)?,
            parse_with(before, &offsets)?,
        ))
    }

    /// Whether no timestamp can fall inside the window.
    pub fn is_empty(&self) -> bool {
        self.from_ms >= self.before_ms
    }

    /// Whether `reported_at_ms` falls inside the window.
    pub fn contains(&self, reported_at_ms: i64) -> bool {
        self.from_ms <= reported_at_ms && reported_at_ms < self.before_ms
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.from_ms, self.before_ms)
    }
}

/// Parse one window boundary.
///
/// Accepts RFC 3339 (`2023-03-18T12:00:00Z`), a date and time without an
/// offset (`2023-03-18T12:00`, seconds and fraction optional, `T` or space),
/// or a bare date (`2023-03-18`, meaning midnight). Forms without an offset
/// take the one `offsets` gives for that wall-clock time.
pub fn parse_boundary<O: OffsetAt>(s: &str, offsets: O) -> Result<OffsetDateTime> {
    parse_with(s, &offsets)
}

fn parse_with(s: &str, offsets: &dyn OffsetAt) -> Result<OffsetDateTime> {
    let s = s.trim();

    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(dt);
    }

    let local = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(s, format).ok())
        .or_else(|| Date::parse(s, DATE_FORMAT).ok().map(Date::midnight));
    if let Some(local) = local {
        return Ok(local.assume_offset(offsets.offset_at(local)));
    }

    Err(Error::InvalidTimestamp(format!(
        "'{s}'. Use YYYY-MM-DD, YYYY-MM-DDTHH:MM[:SS] or RFC3339 (e.g., 2023-03-18T12:00:00Z)"
    )))
}

/// Milliseconds since the Unix epoch, rounded toward negative infinity.
pub fn unix_millis(dt: OffsetDateTime) -> i64 {
    dt.unix_timestamp_nanos().div_euclid(1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;
    use tracker_types::{Eui, GpsFix, HotspotObservation, UplinkReport};

    // 2023-03-18T12:00:00Z
    const NOON: i64 = 1_679_140_800_000;

    fn report(reported_at_ms: i64, lat: f64, hotspots: &[&str]) -> UplinkReport {
        UplinkReport {
            app_eui: Some(Eui(1)),
            dev_eui: Some(Eui(2)),
            reported_at_ms: Some(reported_at_ms),
            fix: Some(GpsFix::new(lat, 0.0)),
            hotspots: hotspots
                .iter()
                .map(|name| HotspotObservation::new(*name))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_date_is_midnight() {
        let dt = parse_boundary("2023-03-18", UtcOffset::UTC).unwrap();
        assert_eq!(unix_millis(dt), NOON - 12 * 3_600_000);
    }

    #[test]
    fn test_parse_naive_uses_offset() {
        let plus_two = UtcOffset::from_hms(2, 0, 0).unwrap();
        let dt = parse_boundary("2023-03-18T14:00", plus_two).unwrap();
        assert_eq!(unix_millis(dt), NOON);

        let dt = parse_boundary("2023-03-18 12:00:00", UtcOffset::UTC).unwrap();
        assert_eq!(unix_millis(dt), NOON);

        let dt = parse_boundary("2023-03-18T12:00:00.250", UtcOffset::UTC).unwrap();
        assert_eq!(unix_millis(dt), NOON + 250);
    }

    /// Central European rules, close enough for the dates below.
    fn berlin(local: PrimitiveDateTime) -> UtcOffset {
        let hours = if (4..=9).contains(&u8::from(local.month())) { 2 } else { 1 };
        UtcOffset::from_hms(hours, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_uses_offset_of_the_date() {
        // Local midnight in Berlin, summer and winter.
        let summer = parse_boundary("2023-07-01", berlin).unwrap();
        assert_eq!(unix_millis(summer), 1_688_162_400_000);

        let winter = parse_boundary("2023-01-15T00:00", berlin).unwrap();
        assert_eq!(unix_millis(winter), 1_673_737_200_000);

        // A fixed winter offset is off by the daylight saving hour in summer.
        let fixed = parse_boundary("2023-07-01", UtcOffset::from_hms(1, 0, 0).unwrap()).unwrap();
        assert_eq!(unix_millis(fixed) - unix_millis(summer), 3_600_000);
    }

    #[test]
    fn test_window_across_daylight_saving_change() {
        let window = TimeWindow::parse("2023-03-01", "2023-07-01", berlin).unwrap();
        assert_eq!(window.from_ms, 1_677_625_200_000);
        assert_eq!(window.before_ms, 1_688_162_400_000);
    }

    #[test]
    fn test_parse_rfc3339_ignores_offset_argument() {
        let plus_two = UtcOffset::from_hms(2, 0, 0).unwrap();
        let dt = parse_boundary("2023-03-18T12:00:00Z", plus_two).unwrap();
        assert_eq!(unix_millis(dt), NOON);

        let dt = parse_boundary("2023-03-18T13:00:00+01:00", UtcOffset::UTC).unwrap();
        assert_eq!(unix_millis(dt), NOON);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["", "yesterday", "2023-13-01", "18/03/2023"] {
            let err = parse_boundary(input, UtcOffset::UTC).unwrap_err();
            assert!(matches!(err, Error::InvalidTimestamp(_)), "{input}");
        }
    }

    #[test]
    fn test_window_bounds() {
        let window = TimeWindow::new(10, 20);
        assert!(window.contains(10));
        assert!(window.contains(19));
        assert!(!window.contains(20));
        assert!(!window.contains(9));
        assert!(!window.is_empty());
        assert!(TimeWindow::new(20, 20).is_empty());
        assert!(TimeWindow::new(30, 20).is_empty());
    }

    #[test]
    fn test_points_respect_half_open_window() {
        let mut store = Store::open_in_memory().unwrap();
        store.ingest(&report(NOON - 1, 1.0, &[])).unwrap();
        store.ingest(&report(NOON, 2.0, &[])).unwrap();
        store.ingest(&report(NOON + 999, 3.0, &[])).unwrap();
        store.ingest(&report(NOON + 1000, 4.0, &[])).unwrap();

        let points = store
            .points_in_window(&TimeWindow::new(NOON, NOON + 1000))
            .unwrap();
        let lats: Vec<f64> = points.iter().map(|p| p.latitude).collect();
        assert_eq!(lats, vec![2.0, 3.0]);
    }

    #[test]
    fn test_points_ordered_by_time_not_insertion() {
        let mut store = Store::open_in_memory().unwrap();
        store.ingest(&report(NOON + 2000, 3.0, &[])).unwrap();
        store.ingest(&report(NOON, 1.0, &[])).unwrap();
        store.ingest(&report(NOON + 1000, 2.0, &[])).unwrap();
        store.ingest(&report(NOON + 1000, 2.5, &[])).unwrap();

        let points = store
            .points_in_window(&TimeWindow::new(NOON, NOON + 10_000))
            .unwrap();
        let lats: Vec<f64> = points.iter().map(|p| p.latitude).collect();
        assert_eq!(lats, vec![1.0, 2.0, 2.5, 3.0]);
        assert_eq!(points[0].reported_at_ms, NOON);
    }

    #[test]
    fn test_empty_window_returns_nothing() {
        let mut store = Store::open_in_memory().unwrap();
        store.ingest(&report(NOON, 1.0, &["A"])).unwrap();

        let window = TimeWindow::new(NOON + 1, NOON);
        assert!(store.points_in_window(&window).unwrap().is_empty());
        assert!(store.hotspots_in_window(&window).unwrap().is_empty());

        let window = TimeWindow::new(NOON, NOON);
        assert!(store.points_in_window(&window).unwrap().is_empty());
    }

    #[test]
    fn test_hotspots_keep_duplicates() {
        let mut store = Store::open_in_memory().unwrap();
        store.ingest(&report(NOON, 1.0, &["A", "B"])).unwrap();
        store.ingest(&report(NOON + 1000, 2.0, &["A"])).unwrap();
        store.ingest(&report(NOON + 90_000_000, 3.0, &["C"])).unwrap();

        let hotspots = store
            .hotspots_in_window(&TimeWindow::parse("2023-03-18", "2023-03-19", UtcOffset::UTC).unwrap())
            .unwrap();
        let names: Vec<&str> = hotspots.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "A"]);
    }
}
