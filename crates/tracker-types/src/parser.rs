//! Decoder for the relay's JSON uplink body.
//!
//! The relay (e.g. the Helium console HTTP integration) posts one JSON object
//! per uplink. The GPS fix is taken from `decoded.payload`, which is produced
//! by the console-side payload decoder for the tracker.

use serde::Deserialize;

use crate::error::{ParseError, ParseResult};
use crate::types::{DevAddr, Eui, GpsFix, HotspotObservation, UplinkReport};

#[derive(Debug, Deserialize)]
struct WireUplink {
    #[serde(rename = "type")]
    kind: Option<String>,
    app_eui: Option<String>,
    dev_eui: Option<String>,
    devaddr: Option<String>,
    dc: Option<WireDc>,
    fcnt: Option<u32>,
    port: Option<u8>,
    name: Option<String>,
    reported_at: Option<i64>,
    #[serde(default)]
    hotspots: Vec<WireHotspot>,
    metadata: Option<WireMetadata>,
    decoded: Option<WireDecoded>,
}

#[derive(Debug, Deserialize)]
struct WireDc {
    balance: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WireMetadata {
    #[serde(default)]
    labels: Vec<WireLabel>,
}

#[derive(Debug, Deserialize)]
struct WireLabel {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireHotspot {
    name: Option<String>,
    frequency: Option<f64>,
    rssi: Option<f64>,
    snr: Option<f64>,
    lat: Option<f64>,
    long: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WireDecoded {
    payload: Option<WirePayload>,
}

#[derive(Debug, Deserialize)]
struct WirePayload {
    #[serde(alias = "lat")]
    latitude: Option<f64>,
    #[serde(alias = "lon", alias = "lng")]
    longitude: Option<f64>,
    #[serde(alias = "alt")]
    altitude: Option<f64>,
    accuracy: Option<f64>,
    fix: Option<FixFlag>,
    #[serde(alias = "satellites")]
    sats: Option<u32>,
    #[serde(alias = "battery_voltage")]
    battery: Option<f64>,
}

/// Decoders disagree on whether the fix flag is a bool or 0/1.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FixFlag {
    Bool(bool),
    Int(i64),
}

impl From<FixFlag> for bool {
    fn from(flag: FixFlag) -> bool {
        match flag {
            FixFlag::Bool(b) => b,
            FixFlag::Int(i) => i != 0,
        }
    }
}

/// Decode one raw uplink body into an [`UplinkReport`].
///
/// Only structural problems are errors here: invalid JSON, wrong field types,
/// bad identifiers, or a non-uplink event. Missing fields come back as `None`
/// and are judged by the ingestion mapper.
pub fn parse_uplink(raw: &[u8]) -> ParseResult<UplinkReport> {
    let wire: WireUplink = serde_json::from_slice(raw)?;

    if let Some(kind) = &wire.kind
        && kind != "uplink"
    {
        return Err(ParseError::UnsupportedType(kind.clone()));
    }

    let app_eui = wire.app_eui.as_deref().map(str::parse::<Eui>).transpose()?;
    let dev_eui = wire.dev_eui.as_deref().map(str::parse::<Eui>).transpose()?;
    let dev_addr = wire
        .devaddr
        .as_deref()
        .map(str::parse::<DevAddr>)
        .transpose()?;

    let labels = wire
        .metadata
        .map(|m| m.labels.into_iter().filter_map(|l| l.name).collect())
        .unwrap_or_default();

    let hotspots = wire
        .hotspots
        .into_iter()
        .map(|h| HotspotObservation {
            name: h.name.unwrap_or_default(),
            frequency: h.frequency,
            rssi: h.rssi,
            snr: h.snr,
            latitude: h.lat,
            longitude: h.long,
        })
        .collect();

    let payload = wire.decoded.and_then(|d| d.payload);
    let battery_voltage = payload.as_ref().and_then(|p| p.battery);
    let fix = payload.map(|p| GpsFix {
        latitude: p.latitude,
        longitude: p.longitude,
        altitude: p.altitude,
        accuracy: p.accuracy,
        fix: p.fix.map(bool::from),
        satellites: p.sats,
    });

    Ok(UplinkReport {
        app_eui,
        dev_eui,
        dev_addr,
        dc_balance: wire.dc.and_then(|dc| dc.balance),
        fcnt: wire.fcnt,
        port: wire.port,
        device_name: wire.name,
        battery_voltage,
        reported_at_ms: wire.reported_at,
        labels,
        fix,
        hotspots,
    })
}
