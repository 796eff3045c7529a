//! Session and transfer observer interfaces
//!
//! Listeners are registered as `Arc`s and compared by identity, so the same
//! listener instance can be moved between backends (the failover engine
//! replays its registered listeners onto every backend it adopts).

use crate::error::TransportError;

/// Emitted when a transport session opens or closes.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub repository_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Get,
    Put,
}

/// Emitted around a single resource transfer.
#[derive(Debug, Clone)]
pub struct TransferEvent {
    pub resource: String,
    pub repository_id: Option<String>,
    pub direction: TransferDirection,
}

impl TransferEvent {
    pub fn get(resource: &str, repository_id: Option<String>) -> Self {
        Self {
            resource: resource.to_string(),
            repository_id,
            direction: TransferDirection::Get,
        }
    }

    pub fn put(resource: &str, repository_id: Option<String>) -> Self {
        Self {
            resource: resource.to_string(),
            repository_id,
            direction: TransferDirection::Put,
        }
    }
}

pub trait SessionListener: Send + Sync {
    fn session_opened(&self, _event: &SessionEvent) {}
    fn session_closed(&self, _event: &SessionEvent) {}
}

pub trait TransferListener: Send + Sync {
    fn transfer_started(&self, _event: &TransferEvent) {}
    fn transfer_progress(&self, _event: &TransferEvent, _bytes: usize) {}
    fn transfer_completed(&self, _event: &TransferEvent, _total_bytes: u64) {}
    fn transfer_failed(&self, _event: &TransferEvent, _error: &TransportError) {}
}
