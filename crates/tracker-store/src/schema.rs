//! Database schema.
//!
//! There is no versioning: the schema is created once against a fresh
//! database, and a changed schema needs a new database file.

use rusqlite::Connection;

use crate::error::{Error, Result};

/// Tables created by [`initialize`], in creation order.
pub const TABLES: &[&str] = &[
    "app_eui",
    "dev_eui",
    "dev_addr",
    "device_names",
    "label_strings",
    "hotspot_names",
    "reports",
    "points",
    "hotspot_connections",
    "label_reports",
];

/// Check whether the tracker schema exists.
pub fn is_initialized(conn: &Connection) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='reports'",
        [],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Create all tables and indexes.
///
/// Fails with [`Error::AlreadyInitialized`] when the schema is already
/// present; callers run this exactly once against a fresh database.
pub fn initialize(conn: &Connection) -> Result<()> {
    if is_initialized(conn)? {
        return Err(Error::AlreadyInitialized);
    }

    // No IF NOT EXISTS: a partially created schema must fail here too.
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        r#"

        -- Network identifiers, stored as the bit pattern of the u64 value
        CREATE TABLE app_eui (
            id INTEGER PRIMARY KEY ASC,
            value INTEGER NOT NULL UNIQUE
        );
        CREATE TABLE dev_eui (
            id INTEGER PRIMARY KEY ASC,
            value INTEGER NOT NULL UNIQUE
        );
        CREATE TABLE dev_addr (
            id INTEGER PRIMARY KEY ASC,
            value INTEGER NOT NULL UNIQUE
        );

        CREATE TABLE device_names (
            id INTEGER PRIMARY KEY ASC,
            name VARCHAR(128) NOT NULL UNIQUE
        );

        CREATE TABLE label_strings (
            id INTEGER PRIMARY KEY ASC,
            name VARCHAR(128) NOT NULL UNIQUE
        );

        CREATE TABLE hotspot_names (
            id INTEGER PRIMARY KEY ASC,
            name VARCHAR(128) NOT NULL UNIQUE,
            lat REAL,
            lng REAL
        );

        -- One row per ingested uplink
        CREATE TABLE reports (
            id INTEGER PRIMARY KEY ASC,
            app_eui_id INTEGER NOT NULL REFERENCES app_eui(id),
            dev_eui_id INTEGER NOT NULL REFERENCES dev_eui(id),
            dev_addr_id INTEGER REFERENCES dev_addr(id),
            dc_balance INTEGER,
            fcnt INTEGER,
            port INTEGER,
            name_id INTEGER REFERENCES device_names(id),
            battery_voltage REAL,
            reported_at_ms INTEGER NOT NULL
        );
        CREATE INDEX idx_reports_reported_at ON reports(reported_at_ms);

        -- Exactly one GPS fix per report
        CREATE TABLE points (
            id INTEGER PRIMARY KEY ASC,
            report_id INTEGER NOT NULL UNIQUE REFERENCES reports(id),
            lat REAL NOT NULL,
            lng REAL NOT NULL,
            alt REAL,
            accuracy REAL,
            fix BOOLEAN,
            satellites INTEGER CHECK (satellites >= 0)
        );
        CREATE INDEX idx_points_report ON points(report_id);

        CREATE TABLE hotspot_connections (
            id INTEGER PRIMARY KEY ASC,
            report_id INTEGER NOT NULL REFERENCES reports(id),
            frequency REAL,
            name_id INTEGER NOT NULL REFERENCES hotspot_names(id),
            rssi REAL,
            snr REAL
        );
        CREATE INDEX idx_hotspot_connections_report ON hotspot_connections(report_id);

        CREATE TABLE label_reports (
            id INTEGER PRIMARY KEY ASC,
            report_id INTEGER NOT NULL REFERENCES reports(id),
            name_id INTEGER NOT NULL REFERENCES label_strings(id)
        );
        CREATE INDEX idx_label_reports_report ON label_reports(report_id);
        "#,
    )?;
    tx.commit()?;

    Ok(())
}
