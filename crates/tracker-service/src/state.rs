//! Application state shared across handlers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracker_store::Store;

use crate::config::Config;

/// Shared application state.
pub struct AppState {
    /// The data store (wrapped in Mutex for thread-safe access).
    pub store: Mutex<Store>,
    /// Configuration, fixed for the life of the process.
    pub config: Config,
    /// Outcome counters for posted uplinks.
    pub stats: IngestStats,
    /// When the service started.
    pub started_at: OffsetDateTime,
}

impl AppState {
    /// Create new application state.
    pub fn new(store: Store, config: Config) -> Arc<Self> {
        Arc::new(Self {
            store: Mutex::new(store),
            config,
            stats: IngestStats::default(),
            started_at: OffsetDateTime::now_utc(),
        })
    }
}

/// Counters of ingestion outcomes since startup.
#[derive(Debug, Default)]
pub struct IngestStats {
    accepted: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

impl IngestStats {
    /// Count a stored report.
    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a report that could not be decoded or validated.
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a report the store failed to write.
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters.
    pub fn snapshot(&self) -> IngestCounters {
        IngestCounters {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestCounters {
    pub accepted: u64,
    pub rejected: u64,
    pub failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_start_at_zero() {
        let stats = IngestStats::default();
        assert_eq!(stats.snapshot(), IngestCounters::default());
    }

    #[test]
    fn test_stats_count_independently() {
        let stats = IngestStats::default();
        stats.record_accepted();
        stats.record_accepted();
        stats.record_rejected();
        stats.record_failed();

        assert_eq!(
            stats.snapshot(),
            IngestCounters {
                accepted: 2,
                rejected: 1,
                failed: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_state_shares_store() {
        let store = Store::open_in_memory().unwrap();
        let state = AppState::new(store, Config::default());
        let other = Arc::clone(&state);

        let count = other.store.lock().await.count_reports().unwrap();
        assert_eq!(count, 0);
    }
}
