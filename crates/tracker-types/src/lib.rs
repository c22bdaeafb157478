//! Report types for a LoRaWAN GPS tracker.
//!
//! This crate provides the shape of one decoded uplink (network identifiers,
//! a GPS fix and the hotspots that heard it) and the parser that turns the
//! relay's JSON body into that shape.
//!
//! # Example
//!
//! ```
//! use tracker_types::parse_uplink;
//!
//! let body = br#"{"dev_eui": "70B3D57ED0051234", "reported_at": 1679140800000,
//!                 "decoded": {"payload": {"latitude": 10.0, "longitude": 20.0}}}"#;
//! let report = parse_uplink(body)?;
//! assert_eq!(report.fix.unwrap().latitude, Some(10.0));
//! # Ok::<(), tracker_types::ParseError>(())
//! ```

pub mod error;
pub mod parser;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use parser::parse_uplink;
pub use types::{DevAddr, Eui, GpsFix, HotspotObservation, UplinkReport};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_eui_parse_accepts_prefix_and_case() {
        assert_eq!("0x00000000000000ff".parse::<Eui>().unwrap(), Eui(255));
        assert_eq!("ABCDEF".parse::<Eui>().unwrap(), Eui(0xABCDEF));
    }

    #[test]
    fn test_eui_full_range() {
        let eui: Eui = "FFFFFFFFFFFFFFFF".parse().unwrap();
        assert_eq!(eui.value(), u64::MAX);
        assert_eq!(eui.to_string(), "FFFFFFFFFFFFFFFF");
    }

    #[test]
    fn test_eui_rejects_too_long() {
        let err = "1FFFFFFFFFFFFFFFF".parse::<Eui>().unwrap_err();
        assert!(err.to_string().contains("too many hex digits"));
    }

    #[test]
    fn test_eui_rejects_empty() {
        assert!("".parse::<Eui>().is_err());
        assert!("0x".parse::<Eui>().is_err());
    }

    #[test]
    fn test_dev_addr_width() {
        assert_eq!("2A000048".parse::<DevAddr>().unwrap(), DevAddr(0x2A00_0048));
        assert!("12A000048".parse::<DevAddr>().is_err());
        assert_eq!(DevAddr(0x48).to_string(), "00000048");
    }

    #[test]
    fn test_eui_serde_as_hex_string() {
        let json = serde_json::to_string(&Eui(0x70B3_D57E_D005_1234)).unwrap();
        assert_eq!(json, "\"70B3D57ED0051234\"");
        let back: Eui = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Eui(0x70B3_D57E_D005_1234));
    }

    #[test]
    fn test_gps_fix_builder() {
        let fix = GpsFix::new(10.0, 20.0).altitude(5.0).satellites(5);
        assert_eq!(fix.latitude, Some(10.0));
        assert_eq!(fix.altitude, Some(5.0));
        assert_eq!(fix.satellites, Some(5));
        assert_eq!(fix.fix, Some(true));
        assert_eq!(fix.accuracy, None);
    }

    #[test]
    fn test_reported_at_conversion() {
        let report = UplinkReport {
            reported_at_ms: Some(1_679_140_800_123),
            ..Default::default()
        };
        let dt = report.reported_at().unwrap();
        assert_eq!(dt.unix_timestamp(), 1_679_140_800);
        assert_eq!(dt.millisecond(), 123);
    }

    proptest! {
        #[test]
        fn parser_never_panics(body in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = parse_uplink(&body);
        }

        #[test]
        fn eui_display_parses_back(value in any::<u64>()) {
            let eui = Eui(value);
            prop_assert_eq!(eui.to_string().parse::<Eui>().unwrap(), eui);
        }
    }
}
