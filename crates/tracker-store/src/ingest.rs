//! Turning one uplink into rows.
//!
//! A report is validated in full before any row is written, and every row
//! of one report is written inside a single [`ReportWriter`] transaction.
//!
//! [`ReportWriter`]: crate::ReportWriter

use tracing::{debug, info};

use tracker_types::{Eui, GpsFix, UplinkReport, parse_uplink};

use crate::error::Result;
use crate::models::{IngestReceipt, NewReport};
use crate::store::Store;

/// Why a decoded report cannot be stored.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// A field the schema requires is absent.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// A numeric field is outside its valid range.
    #[error("`{field}` out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    /// A hotspot observation carries an empty name.
    #[error("hotspot #{index} has no name")]
    UnnamedHotspot { index: usize },
}

/// The required parts of a report, checked.
#[derive(Debug, Clone, Copy)]
struct Validated<'a> {
    app_eui: Eui,
    dev_eui: Eui,
    reported_at_ms: i64,
    fix: &'a GpsFix,
}

/// Check that a report can be stored without writing anything.
pub fn validate(report: &UplinkReport) -> std::result::Result<(), ValidationError> {
    checked(report).map(|_| ())
}

fn checked(report: &UplinkReport) -> std::result::Result<Validated<'_>, ValidationError> {
    let app_eui = report
        .app_eui
        .ok_or(ValidationError::MissingField("app_eui"))?;
    let dev_eui = report
        .dev_eui
        .ok_or(ValidationError::MissingField("dev_eui"))?;
    let reported_at_ms = report
        .reported_at_ms
        .ok_or(ValidationError::MissingField("reported_at"))?;
    if reported_at_ms < 0 {
        return Err(ValidationError::OutOfRange {
            field: "reported_at",
            value: reported_at_ms as f64,
        });
    }

    let fix = report
        .fix
        .as_ref()
        .ok_or(ValidationError::MissingField("payload"))?;
    let latitude = fix
        .latitude
        .ok_or(ValidationError::MissingField("latitude"))?;
    let longitude = fix
        .longitude
        .ok_or(ValidationError::MissingField("longitude"))?;
    check_coordinate("latitude", latitude, 90.0)?;
    check_coordinate("longitude", longitude, 180.0)?;

    for (index, hotspot) in report.hotspots.iter().enumerate() {
        if hotspot.name.trim().is_empty() {
            return Err(ValidationError::UnnamedHotspot { index });
        }
    }

    Ok(Validated {
        app_eui,
        dev_eui,
        reported_at_ms,
        fix,
    })
}

fn check_coordinate(
    field: &'static str,
    value: f64,
    limit: f64,
) -> std::result::Result<(), ValidationError> {
    if value.is_finite() && value.abs() <= limit {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange { field, value })
    }
}

impl Store {
    /// Store one decoded report.
    ///
    /// Either every row of the report is committed or none is.
    pub fn ingest(&mut self, report: &UplinkReport) -> Result<IngestReceipt> {
        let valid = checked(report)?;

        let writer = self.begin()?;

        let app_eui_id = writer.lookup_or_insert_app_eui(valid.app_eui)?;
        let dev_eui_id = writer.lookup_or_insert_dev_eui(valid.dev_eui)?;
        let dev_addr_id = report
            .dev_addr
            .map(|addr| writer.lookup_or_insert_dev_addr(addr))
            .transpose()?;
        let name_id = report
            .device_name
            .as_deref()
            .map(|name| writer.lookup_or_insert_device_name(name))
            .transpose()?;

        let report_id = writer.insert_report(&NewReport {
            app_eui_id,
            dev_eui_id,
            dev_addr_id,
            dc_balance: report.dc_balance,
            fcnt: report.fcnt,
            port: report.port,
            name_id,
            battery_voltage: report.battery_voltage,
            reported_at_ms: valid.reported_at_ms,
        })?;

        let point_id = writer.insert_point(report_id, valid.fix)?;

        for hotspot in &report.hotspots {
            let hotspot_id = writer.lookup_or_insert_hotspot_name(
                &hotspot.name,
                hotspot.latitude,
                hotspot.longitude,
            )?;
            writer.insert_hotspot_connection(report_id, hotspot_id, hotspot)?;
        }

        for label in &report.labels {
            let label_id = writer.lookup_or_insert_label(label)?;
            writer.insert_label_report(report_id, label_id)?;
        }

        writer.commit()?;

        let receipt = IngestReceipt {
            report_id,
            point_id,
            hotspot_connections: report.hotspots.len(),
            labels: report.labels.len(),
        };
        info!(
            report_id,
            dev_eui = %valid.dev_eui,
            hotspots = receipt.hotspot_connections,
            "Stored report"
        );
        Ok(receipt)
    }

    /// Decode a raw relay body and store it.
    pub fn record(&mut self, body: &[u8]) -> Result<IngestReceipt> {
        debug!("Decoding {} byte report", body.len());
        let report = parse_uplink(body)?;
        self.ingest(&report)
    }
}
