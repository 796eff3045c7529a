//! Protocol transports for artifact repositories
//!
//! This crate provides the transport capability surface shared by every
//! backend (connect, get, put, listing, listener registration), the closed
//! error taxonomy used across the workspace, and two concrete backends:
//! HTTP(S) on top of `reqwest` and local file repositories on top of
//! `tokio::fs`.

pub mod checksum;
pub mod error;
pub mod file;
pub mod http;
pub mod listener;
pub mod repository;
pub mod stats;
pub mod transport;

pub use error::TransportError;
pub use file::{FileTransport, FileTransportFactory};
pub use http::{HttpTransport, HttpTransportFactory};
pub use listener::{
    SessionEvent, SessionListener, TransferDirection, TransferEvent, TransferListener,
};
pub use repository::{Authentication, Permissions, ProxyInfo, Repository};
pub use stats::TransferStatistics;
pub use transport::{Transport, TransportBase, TransportFactory};
