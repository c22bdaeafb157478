//! Data models for stored data.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use tracker_types::{DevAddr, Eui};

/// A report row ready for insertion, with every reference already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    /// Row id in `app_eui`.
    pub app_eui_id: i64,
    /// Row id in `dev_eui`.
    pub dev_eui_id: i64,
    /// Row id in `dev_addr`.
    pub dev_addr_id: Option<i64>,
    /// Data-credit balance.
    pub dc_balance: Option<i64>,
    /// Frame counter.
    pub fcnt: Option<u32>,
    /// LoRaWAN port.
    pub port: Option<u8>,
    /// Row id in `device_names`.
    pub name_id: Option<i64>,
    /// Battery voltage.
    pub battery_voltage: Option<f64>,
    /// Relay timestamp in milliseconds since the Unix epoch.
    pub reported_at_ms: i64,
}

/// A report read back from the database with its references resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredReport {
    /// Database row ID.
    pub id: i64,
    /// Application EUI.
    pub app_eui: Eui,
    /// Device EUI.
    pub dev_eui: Eui,
    /// Device address.
    pub dev_addr: Option<DevAddr>,
    /// Data-credit balance.
    pub dc_balance: Option<i64>,
    /// Frame counter.
    pub fcnt: Option<u32>,
    /// LoRaWAN port.
    pub port: Option<u8>,
    /// Device name.
    pub device_name: Option<String>,
    /// Battery voltage.
    pub battery_voltage: Option<f64>,
    /// Relay timestamp in milliseconds since the Unix epoch.
    pub reported_at_ms: i64,
}

/// A deduplicated hotspot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredHotspotName {
    /// Database row ID.
    pub id: i64,
    /// Hotspot name.
    pub name: String,
    /// Latitude, once known.
    pub latitude: Option<f64>,
    /// Longitude, once known.
    pub longitude: Option<f64>,
}

/// One row of the windowed points query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPointRow {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude in meters.
    pub altitude: Option<f64>,
    /// Accuracy estimate.
    pub accuracy: Option<f64>,
    /// Satellite count. `None` when the report carried none.
    pub satellites: Option<u32>,
    /// Owning report's timestamp in milliseconds since the Unix epoch.
    pub reported_at_ms: i64,
}

impl TrackPointRow {
    /// UTC time of the point, truncated to whole seconds.
    pub fn time(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(self.reported_at_ms.div_euclid(1000)).ok()
    }
}

/// One row of the windowed hotspots query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotRow {
    /// Hotspot name.
    pub name: String,
    /// Latitude, if known.
    pub latitude: Option<f64>,
    /// Longitude, if known.
    pub longitude: Option<f64>,
}

/// What one successful ingestion wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestReceipt {
    /// New report row id.
    pub report_id: i64,
    /// New point row id.
    pub point_id: i64,
    /// Number of hotspot connection rows written.
    pub hotspot_connections: usize,
    /// Number of label associations written.
    pub labels: usize,
}
