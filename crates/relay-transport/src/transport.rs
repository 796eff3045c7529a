//! The transport capability surface
//!
//! `Transport` is the full set of operations a backend must offer; anything
//! implementing it is substitutable anywhere a backend is expected,
//! including the failover decorator in `relay-core`. `TransportBase` carries
//! the per-session state every concrete backend shares.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::TransportError;
use crate::listener::{SessionEvent, SessionListener, TransferEvent, TransferListener};
use crate::repository::{Authentication, Permissions, ProxyInfo, Repository};

#[async_trait]
pub trait Transport: Send {
    /// Protocol this handle speaks ("http", "file", ...).
    fn protocol(&self) -> &str;

    /// Open a session against the bound repository.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Bind the given repository (and optionally credentials and proxy),
    /// then connect.
    async fn connect_to(
        &mut self,
        repository: Repository,
        authentication: Option<Authentication>,
        proxy: Option<ProxyInfo>,
    ) -> Result<(), TransportError> {
        self.set_repository(repository);
        if let Some(authentication) = authentication {
            self.set_authentication(authentication);
        }
        if let Some(proxy) = proxy {
            self.set_proxy(proxy);
        }
        self.connect().await
    }

    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Download `resource` into `destination`, creating parent directories
    /// as needed.
    async fn get(&mut self, resource: &str, destination: &Path) -> Result<(), TransportError>;

    /// Download `resource` only if the remote copy is newer than
    /// `timestamp`. Returns whether a download happened.
    async fn get_if_newer(
        &mut self,
        resource: &str,
        destination: &Path,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, TransportError>;

    /// Upload the file at `source` as `resource`.
    async fn put(&mut self, source: &Path, resource: &str) -> Result<(), TransportError>;

    /// Upload a whole directory tree under `destination`.
    async fn put_directory(
        &mut self,
        source: &Path,
        destination: &str,
    ) -> Result<(), TransportError>;

    async fn resource_exists(&mut self, resource: &str) -> Result<bool, TransportError>;

    /// List entries directly under `directory`. Subdirectories carry a
    /// trailing `/`.
    async fn file_list(&mut self, directory: &str) -> Result<Vec<String>, TransportError>;

    fn is_connected(&self) -> bool;

    fn repository(&self) -> Option<&Repository>;
    fn set_repository(&mut self, repository: Repository);
    fn authentication(&self) -> Option<&Authentication>;
    fn set_authentication(&mut self, authentication: Authentication);
    fn proxy(&self) -> Option<&ProxyInfo>;
    fn set_proxy(&mut self, proxy: ProxyInfo);
    fn permissions(&self) -> Option<&Permissions>;
    fn set_permissions(&mut self, permissions: Permissions);
    fn is_interactive(&self) -> bool;
    fn set_interactive(&mut self, interactive: bool);

    fn add_session_listener(&mut self, listener: Arc<dyn SessionListener>);
    fn remove_session_listener(&mut self, listener: &Arc<dyn SessionListener>) -> bool;
    fn has_session_listener(&self, listener: &Arc<dyn SessionListener>) -> bool;
    fn add_transfer_listener(&mut self, listener: Arc<dyn TransferListener>);
    fn remove_transfer_listener(&mut self, listener: &Arc<dyn TransferListener>) -> bool;
    fn has_transfer_listener(&self, listener: &Arc<dyn TransferListener>) -> bool;
}

/// Constructs transport handles for one protocol family.
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn Transport>, TransportError>;

    /// Take a handle back once its consumer is done with it. The default
    /// drops it; pooling factories may keep it.
    fn release(&self, _transport: Box<dyn Transport>) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Session state shared by every concrete backend: the bound repository,
/// credentials, proxy, permissions, the interactive flag, the connected
/// flag and the registered listeners. Backends embed one and delegate
/// their accessor surface to it.
#[derive(Default)]
pub struct TransportBase {
    repository: Option<Repository>,
    authentication: Option<Authentication>,
    proxy: Option<ProxyInfo>,
    permissions: Option<Permissions>,
    interactive: bool,
    connected: bool,
    session_listeners: Vec<Arc<dyn SessionListener>>,
    transfer_listeners: Vec<Arc<dyn TransferListener>>,
}

impl TransportBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repository(&self) -> Option<&Repository> {
        self.repository.as_ref()
    }

    pub fn set_repository(&mut self, repository: Repository) {
        self.repository = Some(repository);
    }

    /// The bound repository, or a `Configuration` error when none is bound
    /// yet. Backends call this at the top of every operation.
    pub fn require_repository(&self) -> Result<&Repository, TransportError> {
        self.repository.as_ref().ok_or_else(|| {
            TransportError::Configuration("no repository bound to this transport".to_string())
        })
    }

    pub fn repository_id(&self) -> Option<String> {
        self.repository.as_ref().map(|r| r.id().to_string())
    }

    pub fn authentication(&self) -> Option<&Authentication> {
        self.authentication.as_ref()
    }

    pub fn set_authentication(&mut self, authentication: Authentication) {
        self.authentication = Some(authentication);
    }

    pub fn proxy(&self) -> Option<&ProxyInfo> {
        self.proxy.as_ref()
    }

    pub fn set_proxy(&mut self, proxy: ProxyInfo) {
        self.proxy = Some(proxy);
    }

    pub fn permissions(&self) -> Option<&Permissions> {
        self.permissions.as_ref()
    }

    pub fn set_permissions(&mut self, permissions: Permissions) {
        self.permissions = Some(permissions);
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn add_session_listener(&mut self, listener: Arc<dyn SessionListener>) {
        if !self.has_session_listener(&listener) {
            self.session_listeners.push(listener);
        }
    }

    pub fn remove_session_listener(&mut self, listener: &Arc<dyn SessionListener>) -> bool {
        let before = self.session_listeners.len();
        self.session_listeners.retain(|l| !Arc::ptr_eq(l, listener));
        self.session_listeners.len() != before
    }

    pub fn has_session_listener(&self, listener: &Arc<dyn SessionListener>) -> bool {
        self.session_listeners
            .iter()
            .any(|l| Arc::ptr_eq(l, listener))
    }

    pub fn add_transfer_listener(&mut self, listener: Arc<dyn TransferListener>) {
        if !self.has_transfer_listener(&listener) {
            self.transfer_listeners.push(listener);
        }
    }

    pub fn remove_transfer_listener(&mut self, listener: &Arc<dyn TransferListener>) -> bool {
        let before = self.transfer_listeners.len();
        self.transfer_listeners
            .retain(|l| !Arc::ptr_eq(l, listener));
        self.transfer_listeners.len() != before
    }

    pub fn has_transfer_listener(&self, listener: &Arc<dyn TransferListener>) -> bool {
        self.transfer_listeners
            .iter()
            .any(|l| Arc::ptr_eq(l, listener))
    }

    pub fn fire_session_opened(&self) {
        let event = SessionEvent {
            repository_id: self.repository_id(),
        };
        for listener in &self.session_listeners {
            listener.session_opened(&event);
        }
    }

    pub fn fire_session_closed(&self) {
        let event = SessionEvent {
            repository_id: self.repository_id(),
        };
        for listener in &self.session_listeners {
            listener.session_closed(&event);
        }
    }

    pub fn fire_transfer_started(&self, event: &TransferEvent) {
        for listener in &self.transfer_listeners {
            listener.transfer_started(event);
        }
    }

    pub fn fire_transfer_progress(&self, event: &TransferEvent, bytes: usize) {
        for listener in &self.transfer_listeners {
            listener.transfer_progress(event, bytes);
        }
    }

    pub fn fire_transfer_completed(&self, event: &TransferEvent, total_bytes: u64) {
        for listener in &self.transfer_listeners {
            listener.transfer_completed(event, total_bytes);
        }
    }

    pub fn fire_transfer_failed(&self, event: &TransferEvent, error: &TransportError) {
        for listener in &self.transfer_listeners {
            listener.transfer_failed(event, error);
        }
    }
}
