//! Cumulative transfer statistics
//!
//! One shared instance is attached by the registry to every transport it
//! constructs, so counts survive mirror substitutions. Counters are also
//! mirrored to the `metrics` facade for whatever recorder the host
//! application installs.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;

use crate::error::TransportError;
use crate::listener::{TransferEvent, TransferListener};

#[derive(Debug, Default)]
pub struct TransferStatistics {
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    bytes: AtomicU64,
}

impl TransferStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transfers_started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    pub fn transfers_completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn transfers_failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

impl TransferListener for TransferStatistics {
    fn transfer_started(&self, _event: &TransferEvent) {
        self.started.fetch_add(1, Ordering::Relaxed);
        counter!("relay_transfers_started_total").increment(1);
    }

    fn transfer_progress(&self, _event: &TransferEvent, bytes: usize) {
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        counter!("relay_transferred_bytes_total").increment(bytes as u64);
    }

    fn transfer_completed(&self, _event: &TransferEvent, _total_bytes: u64) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        counter!("relay_transfers_completed_total").increment(1);
    }

    fn transfer_failed(&self, _event: &TransferEvent, _error: &TransportError) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        counter!("relay_transfers_failed_total").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_across_events() {
        let stats = TransferStatistics::new();
        let event = TransferEvent::get("lib.jar", Some("central".to_string()));

        stats.transfer_started(&event);
        stats.transfer_progress(&event, 4096);
        stats.transfer_progress(&event, 1024);
        stats.transfer_completed(&event, 5120);

        assert_eq!(stats.transfers_started(), 1);
        assert_eq!(stats.transfers_completed(), 1);
        assert_eq!(stats.transfers_failed(), 0);
        assert_eq!(stats.bytes_transferred(), 5120);

        stats.transfer_started(&event);
        stats.transfer_failed(&event, &TransportError::transfer("lib.jar", "reset"));
        assert_eq!(stats.transfers_failed(), 1);
    }
}
