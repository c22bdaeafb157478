//! HTTP listener for LoRaWAN GPS tracker uplinks.
//!
//! The network relay (e.g. a Helium console HTTP integration) posts one JSON
//! body per uplink. This crate stores each one through
//! [`tracker_store::Store::record`] and answers with a fixed acknowledgement.
//!
//! # Endpoints
//!
//! - `POST <any path>` - Store one uplink
//! - `GET <any path>` - Acknowledgement only
//! - `GET /api/health` - Service health check
//! - `GET /api/stats` - Row counts and ingestion counters
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/lora-tracker/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//! ack_body = "42"
//!
//! [storage]
//! path = "~/.local/share/lora-tracker/tracker.db"
//! create_if_missing = true
//!
//! [ingest]
//! ack_policy = "always"   # or "on-success"
//! ```

pub mod api;
pub mod config;
pub mod state;

pub use config::{
    AckPolicy, Config, ConfigError, IngestConfig, ServerConfig, StorageConfig, ValidationError,
};
pub use state::{AppState, IngestCounters, IngestStats};
