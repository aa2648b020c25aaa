use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A snapshot of a connection's activity, returned by [`crate::conn::ConnectionCore::statistics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionStatistics {
    pub requests_sent: u64,
    pub records_received: u64,
    pub resets_performed: u64,
}

/// The live, concurrently-updatable counters a connection keeps internally.
#[derive(Debug, Default)]
pub(crate) struct StatisticsCounters {
    requests_sent: AtomicU64,
    records_received: AtomicU64,
    resets_performed: AtomicU64,
}

impl StatisticsCounters {
    pub(crate) fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn note_request_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }
    pub(crate) fn note_record_received(&self) {
        self.records_received.fetch_add(1, Ordering::Relaxed);
    }
    pub(crate) fn note_reset(&self) {
        self.resets_performed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ConnectionStatistics {
        ConnectionStatistics {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            records_received: self.records_received.load(Ordering::Relaxed),
            resets_performed: self.resets_performed.load(Ordering::Relaxed),
        }
    }
}
