//! Core types for tracker reports.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;

use crate::error::ParseError;

/// A 64-bit LoRaWAN extended unique identifier (AppEUI / DevEUI).
///
/// Displayed and serialized as 16 upper-case hex digits, the way network
/// consoles print them.
///
/// ```
/// use tracker_types::Eui;
///
/// let eui: Eui = "6081f9a1b2c3d4e5".parse().unwrap();
/// assert_eq!(eui.0, 0x6081_F9A1_B2C3_D4E5);
/// assert_eq!(eui.to_string(), "6081F9A1B2C3D4E5");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Eui(pub u64);

impl Eui {
    /// Raw value.
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl FromStr for Eui {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex(s, "EUI", 16).map(Eui)
    }
}

impl fmt::Display for Eui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

/// A 32-bit LoRaWAN device address assigned at join time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevAddr(pub u32);

impl DevAddr {
    /// Raw value widened to the identifier width used by the store.
    #[must_use]
    pub fn value(self) -> u64 {
        u64::from(self.0)
    }
}

impl FromStr for DevAddr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Width is checked to 8 digits, so the value always fits.
        parse_hex(s, "device address", 8).map(|v| DevAddr(v as u32))
    }
}

impl fmt::Display for DevAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

fn parse_hex(s: &str, kind: &'static str, max_digits: usize) -> Result<u64, ParseError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);

    let invalid = |reason| ParseError::InvalidIdentifier {
        kind,
        value: s.to_string(),
        reason,
    };

    if digits.is_empty() {
        return Err(invalid("empty"));
    }
    if digits.len() > max_digits {
        return Err(invalid("too many hex digits"));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid("not a hex string"));
    }

    u64::from_str_radix(digits, 16).map_err(|_| invalid("not a hex string"))
}

macro_rules! hex_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_serde!(Eui);
hex_serde!(DevAddr);

/// One GPS fix as reported by the tracker's decoded payload.
///
/// Everything is optional at this level; the ingestion mapper decides which
/// fields are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    /// Latitude in degrees.
    pub latitude: Option<f64>,
    /// Longitude in degrees.
    pub longitude: Option<f64>,
    /// Altitude in meters.
    pub altitude: Option<f64>,
    /// Horizontal accuracy estimate.
    pub accuracy: Option<f64>,
    /// Whether the receiver reported a valid fix.
    pub fix: Option<bool>,
    /// Number of satellites used for the fix.
    pub satellites: Option<u32>,
}

impl GpsFix {
    /// Create a fix at the given coordinates.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..Default::default()
        }
    }

    /// Set the altitude in meters.
    pub fn altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Set the accuracy estimate.
    pub fn accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    /// Set the satellite count. Also marks the fix as valid when it has any.
    pub fn satellites(mut self, satellites: u32) -> Self {
        self.satellites = Some(satellites);
        if self.fix.is_none() {
            self.fix = Some(satellites > 0);
        }
        self
    }
}

/// A hotspot (gateway) that heard the uplink.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HotspotObservation {
    /// Hotspot name, unique across the network.
    pub name: String,
    /// Receive frequency in MHz.
    pub frequency: Option<f64>,
    /// Received signal strength in dBm.
    pub rssi: Option<f64>,
    /// Signal-to-noise ratio in dB.
    pub snr: Option<f64>,
    /// Hotspot latitude, if the relay knows it.
    pub latitude: Option<f64>,
    /// Hotspot longitude, if the relay knows it.
    pub longitude: Option<f64>,
}

impl HotspotObservation {
    /// Create an observation for a named hotspot with no radio metadata.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the hotspot location.
    pub fn located(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    /// Set the radio metadata.
    pub fn signal(mut self, frequency: f64, rssi: f64, snr: f64) -> Self {
        self.frequency = Some(frequency);
        self.rssi = Some(rssi);
        self.snr = Some(snr);
        self
    }
}

/// One decoded uplink report: a GPS fix plus the hotspots that heard it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UplinkReport {
    /// Application EUI.
    pub app_eui: Option<Eui>,
    /// Device EUI.
    pub dev_eui: Option<Eui>,
    /// Session device address.
    pub dev_addr: Option<DevAddr>,
    /// Data-credit balance after this uplink.
    pub dc_balance: Option<i64>,
    /// Uplink frame counter.
    pub fcnt: Option<u32>,
    /// LoRaWAN FPort.
    pub port: Option<u8>,
    /// Device name as configured on the network console.
    pub device_name: Option<String>,
    /// Battery voltage from the payload.
    pub battery_voltage: Option<f64>,
    /// Relay timestamp in milliseconds since the Unix epoch.
    pub reported_at_ms: Option<i64>,
    /// Console labels attached to the device.
    pub labels: Vec<String>,
    /// The GPS fix carried by the payload.
    pub fix: Option<GpsFix>,
    /// Hotspots that received the uplink.
    pub hotspots: Vec<HotspotObservation>,
}

impl UplinkReport {
    /// Report timestamp as a UTC date-time, if present and representable.
    pub fn reported_at(&self) -> Option<OffsetDateTime> {
        let ms = self.reported_at_ms?;
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000).ok()
    }
}
