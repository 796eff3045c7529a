//! Transport error taxonomy
//!
//! One closed set of failure kinds shared by the transport backends, the
//! registry and the failover engine. The failover scan dispatches on these
//! variants, so each kind carries a distinct recovery meaning: connection
//! and authentication failures disqualify a mirror permanently, transfer
//! failures trigger a retry against the next mirror, and `NotOnline` is
//! environmental and never held against the mirror itself.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    /// The remote side could not be reached or refused the session.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The remote side rejected the supplied credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A transfer started but did not complete, or the resource is missing.
    #[error("transfer of {resource} failed: {reason}")]
    Transfer { resource: String, reason: String },

    /// No transport factory is registered for the protocol.
    #[error("unsupported protocol {0:?}")]
    UnsupportedProtocol(String),

    /// The repository id has no binding in the registry.
    #[error("repository {0:?} is not registered")]
    RepositoryNotFound(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The registry is operating offline; no remote transport may be built.
    #[error("repository system is offline: {0}")]
    NotOnline(String),

    /// Every mirror of the repository has been tried and disqualified.
    #[error("every mirror of repository {0:?} has been exhausted")]
    MirrorsExhausted(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl TransportError {
    pub fn transfer(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transfer {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }
}
