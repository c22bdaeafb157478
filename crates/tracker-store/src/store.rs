//! Main store implementation.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, OptionalExtension, Transaction, TransactionBehavior};
use tracing::{debug, info};

use tracker_types::{DevAddr, Eui, GpsFix, HotspotObservation};

use crate::error::{Error, Result};
use crate::models::{HotspotRow, NewReport, StoredHotspotName, StoredReport, TrackPointRow};
use crate::queries::{HOTSPOTS_IN_WINDOW_SQL, POINTS_IN_WINDOW_SQL, TimeWindow};
use crate::schema;

/// How long a writer waits for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based store for tracker reports.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Create a fresh database at the given path and initialize the schema.
    ///
    /// Fails with [`Error::AlreadyInitialized`] if the file already holds a
    /// tracker schema.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = connect(path.as_ref(), true)?;
        schema::initialize(&conn)?;
        info!("Initialized tracker schema at {}", path.as_ref().display());
        Ok(Self { conn })
    }

    /// Open an existing, initialized database.
    ///
    /// A missing file is an error; it is never created here.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = connect(path, false)?;
        if !schema::is_initialized(&conn)? {
            return Err(Error::SchemaMissing(path.to_path_buf()));
        }
        Ok(Self { conn })
    }

    /// Open the database, creating and initializing it if the file is missing.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Start the write transaction for one report.
    ///
    /// The transaction takes the write lock immediately so two ingesting
    /// connections never deadlock on a lock upgrade.
    pub fn begin(&mut self) -> Result<ReportWriter<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(ReportWriter { tx })
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn connect(path: &Path, create: bool) -> Result<Connection> {
    // Create parent directories if needed
    if create
        && let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    info!("Opening database at {}", path.display());
    let flags = if create {
        OpenFlags::default()
    } else {
        OpenFlags::default().difference(OpenFlags::SQLITE_OPEN_CREATE)
    };
    let conn = Connection::open_with_flags(path, flags)?;

    // WAL lets the exporter read while the listener writes
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    Ok(conn)
}

/// The multi-row write of one report.
///
/// Nothing is visible to other connections until [`ReportWriter::commit`];
/// dropping the writer rolls every row back.
pub struct ReportWriter<'conn> {
    tx: Transaction<'conn>,
}

impl ReportWriter<'_> {
    /// Insert the report row and return its id.
    pub fn insert_report(&self, report: &NewReport) -> Result<i64> {
        self.tx.execute(
            "INSERT INTO reports (app_eui_id, dev_eui_id, dev_addr_id, dc_balance, fcnt,
             port, name_id, battery_voltage, reported_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                report.app_eui_id,
                report.dev_eui_id,
                report.dev_addr_id,
                report.dc_balance,
                report.fcnt,
                report.port,
                report.name_id,
                report.battery_voltage,
                report.reported_at_ms,
            ],
        )?;
        Ok(self.tx.last_insert_rowid())
    }

    /// Insert the GPS point of a report.
    pub fn insert_point(&self, report_id: i64, fix: &GpsFix) -> Result<i64> {
        self.tx.execute(
            "INSERT INTO points (report_id, lat, lng, alt, accuracy, fix, satellites)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                report_id,
                fix.latitude,
                fix.longitude,
                fix.altitude,
                fix.accuracy,
                fix.fix,
                fix.satellites,
            ],
        )?;
        Ok(self.tx.last_insert_rowid())
    }

    /// Find a hotspot by name, creating it if it is new.
    ///
    /// A known location is never changed. A hotspot stored without a location
    /// takes the first complete one supplied later. Half a pair and `(0, 0)`
    /// both mean unknown.
    pub fn lookup_or_insert_hotspot_name(
        &self,
        name: &str,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<i64> {
        let (lat, lng) = match (latitude, longitude) {
            (Some(lat), Some(lng)) if !is_null_island(lat, lng) => (Some(lat), Some(lng)),
            _ => (None, None),
        };

        self.tx.execute(
            "INSERT INTO hotspot_names (name, lat, lng) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET lat = excluded.lat, lng = excluded.lng
             WHERE (hotspot_names.lat IS NULL OR hotspot_names.lng IS NULL
                    OR (hotspot_names.lat = 0 AND hotspot_names.lng = 0))
               AND excluded.lat IS NOT NULL AND excluded.lng IS NOT NULL",
            rusqlite::params![name, lat, lng],
        )?;

        let id = self.tx.query_row(
            "SELECT id FROM hotspot_names WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Insert one hotspot observation of a report.
    pub fn insert_hotspot_connection(
        &self,
        report_id: i64,
        name_id: i64,
        observation: &HotspotObservation,
    ) -> Result<i64> {
        self.tx.execute(
            "INSERT INTO hotspot_connections (report_id, frequency, name_id, rssi, snr)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                report_id,
                observation.frequency,
                name_id,
                observation.rssi,
                observation.snr,
            ],
        )?;
        Ok(self.tx.last_insert_rowid())
    }

    /// Find or create a device name.
    pub fn lookup_or_insert_device_name(&self, name: &str) -> Result<i64> {
        self.lookup_or_insert_name("device_names", name)
    }

    /// Find or create a label string.
    pub fn lookup_or_insert_label(&self, name: &str) -> Result<i64> {
        self.lookup_or_insert_name("label_strings", name)
    }

    /// Attach a label to a report.
    pub fn insert_label_report(&self, report_id: i64, label_id: i64) -> Result<i64> {
        self.tx.execute(
            "INSERT INTO label_reports (report_id, name_id) VALUES (?1, ?2)",
            [report_id, label_id],
        )?;
        Ok(self.tx.last_insert_rowid())
    }

    /// Find or create an application EUI.
    pub fn lookup_or_insert_app_eui(&self, eui: Eui) -> Result<i64> {
        self.lookup_or_insert_identifier("app_eui", eui.value())
    }

    /// Find or create a device EUI.
    pub fn lookup_or_insert_dev_eui(&self, eui: Eui) -> Result<i64> {
        self.lookup_or_insert_identifier("dev_eui", eui.value())
    }

    /// Find or create a device address.
    pub fn lookup_or_insert_dev_addr(&self, addr: DevAddr) -> Result<i64> {
        self.lookup_or_insert_identifier("dev_addr", addr.value())
    }

    /// Make every row written through this writer visible.
    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    fn lookup_or_insert_name(&self, table: &'static str, name: &str) -> Result<i64> {
        self.tx.execute(
            &format!("INSERT INTO {table} (name) VALUES (?1) ON CONFLICT(name) DO NOTHING"),
            [name],
        )?;
        let id = self.tx.query_row(
            &format!("SELECT id FROM {table} WHERE name = ?1"),
            [name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn lookup_or_insert_identifier(&self, table: &'static str, value: u64) -> Result<i64> {
        let bits = u64_to_sql(value);
        self.tx.execute(
            &format!("INSERT INTO {table} (value) VALUES (?1) ON CONFLICT(value) DO NOTHING"),
            [bits],
        )?;
        let id = self.tx.query_row(
            &format!("SELECT id FROM {table} WHERE value = ?1"),
            [bits],
            |row| row.get(0),
        )?;
        Ok(id)
    }
}

/// Relays report `0, 0` for a hotspot they have no location for.
pub(crate) fn is_null_island(latitude: f64, longitude: f64) -> bool {
    latitude == 0.0 && longitude == 0.0
}

/// SQLite integers are signed; identifiers keep their bit pattern.
fn u64_to_sql(value: u64) -> i64 {
    value as i64
}

fn u64_from_sql(value: i64) -> u64 {
    value as u64
}

// Report lookups
impl Store {
    /// Get a report by id, with identifiers and device name resolved.
    pub fn get_report(&self, id: i64) -> Result<Option<StoredReport>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT reports.id, app_eui.value, dev_eui.value, dev_addr.value,
                    reports.dc_balance, reports.fcnt, reports.port, device_names.name,
                    reports.battery_voltage, reports.reported_at_ms
             FROM reports
             INNER JOIN app_eui ON app_eui.id = reports.app_eui_id
             INNER JOIN dev_eui ON dev_eui.id = reports.dev_eui_id
             LEFT JOIN dev_addr ON dev_addr.id = reports.dev_addr_id
             LEFT JOIN device_names ON device_names.id = reports.name_id
             WHERE reports.id = ?1",
        )?;

        let report = stmt
            .query_row([id], |row| {
                Ok(StoredReport {
                    id: row.get(0)?,
                    app_eui: Eui(u64_from_sql(row.get(1)?)),
                    dev_eui: Eui(u64_from_sql(row.get(2)?)),
                    dev_addr: row
                        .get::<_, Option<i64>>(3)?
                        .map(|v| DevAddr(u64_from_sql(v) as u32)),
                    dc_balance: row.get(4)?,
                    fcnt: row.get(5)?,
                    port: row.get(6)?,
                    device_name: row.get(7)?,
                    battery_voltage: row.get(8)?,
                    reported_at_ms: row.get(9)?,
                })
            })
            .optional()?;

        Ok(report)
    }

    /// Labels attached to a report, in insertion order.
    pub fn report_labels(&self, report_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT label_strings.name FROM label_reports
             INNER JOIN label_strings ON label_strings.id = label_reports.name_id
             WHERE label_reports.report_id = ?1
             ORDER BY label_reports.id ASC",
        )?;
        let labels = stmt
            .query_map([report_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(labels)
    }

    /// Look up a hotspot by name.
    pub fn hotspot_name(&self, name: &str) -> Result<Option<StoredHotspotName>> {
        let hotspot = self
            .conn
            .query_row(
                "SELECT id, name, lat, lng FROM hotspot_names WHERE name = ?1",
                [name],
                |row| {
                    Ok(StoredHotspotName {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        latitude: row.get(2)?,
                        longitude: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(hotspot)
    }

    /// Count report rows.
    pub fn count_reports(&self) -> Result<u64> {
        self.count("reports")
    }

    /// Count GPS point rows.
    pub fn count_points(&self) -> Result<u64> {
        self.count("points")
    }

    /// Count hotspot connection rows.
    pub fn count_hotspot_connections(&self) -> Result<u64> {
        self.count("hotspot_connections")
    }

    /// Count distinct hotspots.
    pub fn count_hotspot_names(&self) -> Result<u64> {
        self.count("hotspot_names")
    }

    fn count(&self, table: &'static str) -> Result<u64> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

// Windowed queries
impl Store {
    /// GPS points of every report inside the window, oldest first.
    ///
    /// Points sharing a timestamp come back in insertion order.
    pub fn points_in_window(&self, window: &TimeWindow) -> Result<Vec<TrackPointRow>> {
        if window.is_empty() {
            debug!("Empty window {}, skipping points query", window);
            return Ok(Vec::new());
        }

        debug!("Querying points in {}", window);
        let mut stmt = self.conn.prepare_cached(POINTS_IN_WINDOW_SQL)?;
        let points = stmt
            .query_map([window.from_ms, window.before_ms], |row| {
                Ok(TrackPointRow {
                    latitude: row.get(0)?,
                    longitude: row.get(1)?,
                    altitude: row.get(2)?,
                    accuracy: row.get(3)?,
                    satellites: row
                        .get::<_, Option<i64>>(4)?
                        .and_then(|v| u32::try_from(v).ok()),
                    reported_at_ms: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("{} points in {}", points.len(), window);
        Ok(points)
    }

    /// Hotspots heard by every report inside the window.
    ///
    /// One row per hotspot connection, so a hotspot heard twice appears twice.
    pub fn hotspots_in_window(&self, window: &TimeWindow) -> Result<Vec<HotspotRow>> {
        if window.is_empty() {
            debug!("Empty window {}, skipping hotspots query", window);
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare_cached(HOTSPOTS_IN_WINDOW_SQL)?;
        let hotspots = stmt
            .query_map([window.from_ms, window.before_ms], |row| {
                Ok(HotspotRow {
                    name: row.get(0)?,
                    latitude: row.get(1)?,
                    longitude: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("{} hotspot observations in {}", hotspots.len(), window);
        Ok(hotspots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(writer: &ReportWriter<'_>) -> (i64, i64) {
        let app = writer.lookup_or_insert_app_eui(Eui(1)).unwrap();
        let dev = writer.lookup_or_insert_dev_eui(Eui(2)).unwrap();
        (app, dev)
    }

    fn new_report(app_eui_id: i64, dev_eui_id: i64, reported_at_ms: i64) -> NewReport {
        NewReport {
            app_eui_id,
            dev_eui_id,
            dev_addr_id: None,
            dc_balance: None,
            fcnt: None,
            port: None,
            name_id: None,
            battery_voltage: None,
            reported_at_ms,
        }
    }

    #[test]
    fn test_open_in_memory() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.count_reports().unwrap(), 0);
        assert_eq!(store.count_points().unwrap(), 0);
    }

    #[test]
    fn test_create_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tracker.db");

        drop(Store::create(&path).unwrap());
        let store = Store::open(&path).unwrap();
        assert_eq!(store.count_reports().unwrap(), 0);
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.db");

        drop(Store::create(&path).unwrap());
        let err = Store::create(&path).err().unwrap();
        assert!(matches!(err, Error::AlreadyInitialized));
    }

    #[test]
    fn test_open_uninitialized_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.db");
        std::fs::write(&path, b"").unwrap();

        let err = Store::open(&path).err().unwrap();
        assert!(matches!(err, Error::SchemaMissing(_)));
    }

    #[test]
    fn test_open_missing_file_does_not_create_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");

        let err = Store::open(&path).err().unwrap();
        assert!(matches!(err, Error::Database(_)));
        assert!(!path.exists());
    }

    #[test]
    fn test_open_or_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.db");

        drop(Store::open_or_create(&path).unwrap());
        assert!(path.exists());
        drop(Store::open_or_create(&path).unwrap());
    }

    #[test]
    fn test_writer_commit() {
        let mut store = Store::open_in_memory().unwrap();

        let writer = store.begin().unwrap();
        let (app, dev) = ids(&writer);
        let report_id = writer.insert_report(&new_report(app, dev, 1000)).unwrap();
        writer
            .insert_point(report_id, &GpsFix::new(1.0, 2.0))
            .unwrap();
        writer.commit().unwrap();

        assert_eq!(store.count_reports().unwrap(), 1);
        assert_eq!(store.count_points().unwrap(), 1);
        let report = store.get_report(report_id).unwrap().unwrap();
        assert_eq!(report.app_eui, Eui(1));
        assert_eq!(report.dev_eui, Eui(2));
        assert_eq!(report.reported_at_ms, 1000);
    }

    #[test]
    fn test_writer_drop_rolls_back() {
        let mut store = Store::open_in_memory().unwrap();

        {
            let writer = store.begin().unwrap();
            let (app, dev) = ids(&writer);
            writer.insert_report(&new_report(app, dev, 1000)).unwrap();
        }

        assert_eq!(store.count_reports().unwrap(), 0);
        let apps: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM app_eui", [], |row| row.get(0))
            .unwrap();
        assert_eq!(apps, 0);
    }

    #[test]
    fn test_point_without_report_fails() {
        let mut store = Store::open_in_memory().unwrap();
        let writer = store.begin().unwrap();
        let result = writer.insert_point(42, &GpsFix::new(1.0, 2.0));
        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[test]
    fn test_identifier_full_u64_range() {
        let mut store = Store::open_in_memory().unwrap();

        let writer = store.begin().unwrap();
        let app = writer.lookup_or_insert_app_eui(Eui(u64::MAX)).unwrap();
        let dev = writer.lookup_or_insert_dev_eui(Eui(0x8000_0000_0000_0001)).unwrap();
        let report_id = writer.insert_report(&new_report(app, dev, 0)).unwrap();
        writer.commit().unwrap();

        let report = store.get_report(report_id).unwrap().unwrap();
        assert_eq!(report.app_eui, Eui(u64::MAX));
        assert_eq!(report.dev_eui, Eui(0x8000_0000_0000_0001));
    }

    #[test]
    fn test_identifier_deduplication() {
        let mut store = Store::open_in_memory().unwrap();
        let writer = store.begin().unwrap();

        let a = writer.lookup_or_insert_dev_eui(Eui(7)).unwrap();
        let b = writer.lookup_or_insert_dev_eui(Eui(7)).unwrap();
        let c = writer.lookup_or_insert_dev_eui(Eui(8)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        let d = writer.lookup_or_insert_dev_addr(DevAddr(7)).unwrap();
        let e = writer.lookup_or_insert_dev_addr(DevAddr(7)).unwrap();
        assert_eq!(d, e);
    }

    #[test]
    fn test_name_deduplication() {
        let mut store = Store::open_in_memory().unwrap();
        let writer = store.begin().unwrap();

        let a = writer.lookup_or_insert_device_name("tracker-01").unwrap();
        let b = writer.lookup_or_insert_device_name("tracker-01").unwrap();
        assert_eq!(a, b);

        let l1 = writer.lookup_or_insert_label("bike").unwrap();
        let l2 = writer.lookup_or_insert_label("car").unwrap();
        assert_ne!(l1, l2);
        assert_eq!(writer.lookup_or_insert_label("bike").unwrap(), l1);
    }

    #[test]
    fn test_hotspot_location_first_writer_wins() {
        let mut store = Store::open_in_memory().unwrap();

        let writer = store.begin().unwrap();
        let id = writer
            .lookup_or_insert_hotspot_name("A", Some(1.0), Some(2.0))
            .unwrap();
        let again = writer
            .lookup_or_insert_hotspot_name("A", Some(9.0), Some(9.0))
            .unwrap();
        assert_eq!(id, again);
        writer.commit().unwrap();

        let hotspot = store.hotspot_name("A").unwrap().unwrap();
        assert_eq!(hotspot.latitude, Some(1.0));
        assert_eq!(hotspot.longitude, Some(2.0));
    }

    #[test]
    fn test_hotspot_unknown_location_is_filled() {
        let mut store = Store::open_in_memory().unwrap();

        let writer = store.begin().unwrap();
        writer.lookup_or_insert_hotspot_name("B", None, None).unwrap();
        writer
            .lookup_or_insert_hotspot_name("B", Some(3.0), None)
            .unwrap();
        writer.commit().unwrap();
        assert_eq!(store.hotspot_name("B").unwrap().unwrap().latitude, None);

        let writer = store.begin().unwrap();
        writer
            .lookup_or_insert_hotspot_name("B", Some(3.0), Some(4.0))
            .unwrap();
        writer.commit().unwrap();

        let hotspot = store.hotspot_name("B").unwrap().unwrap();
        assert_eq!(hotspot.latitude, Some(3.0));
        assert_eq!(hotspot.longitude, Some(4.0));
        assert_eq!(store.count_hotspot_names().unwrap(), 1);
    }

    #[test]
    fn test_get_report_missing() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.get_report(1).unwrap().is_none());
    }

    #[test]
    fn test_label_reports() {
        let mut store = Store::open_in_memory().unwrap();

        let writer = store.begin().unwrap();
        let (app, dev) = ids(&writer);
        let report_id = writer.insert_report(&new_report(app, dev, 0)).unwrap();
        let bike = writer.lookup_or_insert_label("bike").unwrap();
        let red = writer.lookup_or_insert_label("red").unwrap();
        writer.insert_label_report(report_id, bike).unwrap();
        writer.insert_label_report(report_id, red).unwrap();
        writer.commit().unwrap();

        assert_eq!(
            store.report_labels(report_id).unwrap(),
            vec!["bike".to_string(), "red".to_string()]
        );
    }
}
