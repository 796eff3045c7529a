//! Scripted transport doubles for registry and failover tests

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use relay_transport::{
    Authentication, Permissions, ProxyInfo, Repository, SessionListener, Transport,
    TransportBase, TransportError, TransportFactory, TransferEvent, TransferListener,
};

pub(crate) enum GetOutcome {
    /// Write this payload to the destination and succeed.
    Write(Vec<u8>),
    Fail(TransportError),
}

#[derive(Default)]
struct Script {
    connect: VecDeque<Result<(), TransportError>>,
    get: VecDeque<GetOutcome>,
}

/// Shared behavior table keyed by repository id. Fake transports look up
/// their script when an operation runs, so one table drives every backend
/// a test's registry constructs. Unscripted operations succeed (a `get`
/// succeeds without writing anything).
#[derive(Default)]
pub(crate) struct ScriptTable {
    scripts: Mutex<HashMap<String, Script>>,
    connects: Mutex<Vec<String>>,
    disconnects: Mutex<Vec<String>>,
    released: Mutex<Vec<String>>,
}

impl ScriptTable {
    pub fn script_connect(&self, id: &str, result: Result<(), TransportError>) {
        self.scripts
            .lock()
            .entry(id.to_string())
            .or_default()
            .connect
            .push_back(result);
    }

    pub fn script_get(&self, id: &str, outcome: GetOutcome) {
        self.scripts
            .lock()
            .entry(id.to_string())
            .or_default()
            .get
            .push_back(outcome);
    }

    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().clone()
    }

    pub fn disconnects(&self) -> Vec<String> {
        self.disconnects.lock().clone()
    }

    pub fn released(&self) -> Vec<String> {
        self.released.lock().clone()
    }

    fn pop_connect(&self, id: &str) -> Option<Result<(), TransportError>> {
        self.scripts.lock().get_mut(id).and_then(|s| s.connect.pop_front())
    }

    fn pop_get(&self, id: &str) -> Option<GetOutcome> {
        self.scripts.lock().get_mut(id).and_then(|s| s.get.pop_front())
    }
}

pub(crate) struct FakeTransport {
    base: TransportBase,
    table: Arc<ScriptTable>,
}

impl FakeTransport {
    fn id(&self) -> String {
        self.base.repository_id().unwrap_or_default()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn protocol(&self) -> &str {
        match self.base.repository() {
            Some(repository) => repository.protocol(),
            None => "http",
        }
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        let id = self.id();
        self.table.connects.lock().push(id.clone());
        match self.table.pop_connect(&id) {
            Some(Err(err)) => Err(err),
            _ => {
                self.base.set_connected(true);
                self.base.fire_session_opened();
                Ok(())
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.table.disconnects.lock().push(self.id());
        self.base.set_connected(false);
        self.base.fire_session_closed();
        Ok(())
    }

    async fn get(&mut self, resource: &str, destination: &Path) -> Result<(), TransportError> {
        let event = TransferEvent::get(resource, self.base.repository_id());
        self.base.fire_transfer_started(&event);
        match self.table.pop_get(&self.id()) {
            Some(GetOutcome::Fail(err)) => {
                self.base.fire_transfer_failed(&event, &err);
                Err(err)
            }
            Some(GetOutcome::Write(data)) => {
                tokio::fs::write(destination, &data)
                    .await
                    .map_err(|e| TransportError::transfer(resource, e))?;
                self.base.fire_transfer_progress(&event, data.len());
                self.base.fire_transfer_completed(&event, data.len() as u64);
                Ok(())
            }
            None => {
                self.base.fire_transfer_completed(&event, 0);
                Ok(())
            }
        }
    }

    async fn get_if_newer(
        &mut self,
        _resource: &str,
        _destination: &Path,
        _timestamp: DateTime<Utc>,
    ) -> Result<bool, TransportError> {
        Ok(false)
    }

    async fn put(&mut self, _source: &Path, _resource: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn put_directory(
        &mut self,
        _source: &Path,
        _destination: &str,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn resource_exists(&mut self, _resource: &str) -> Result<bool, TransportError> {
        Ok(true)
    }

    async fn file_list(&mut self, _directory: &str) -> Result<Vec<String>, TransportError> {
        Ok(Vec::new())
    }

    fn is_connected(&self) -> bool {
        self.base.is_connected()
    }

    fn repository(&self) -> Option<&Repository> {
        self.base.repository()
    }

    fn set_repository(&mut self, repository: Repository) {
        self.base.set_repository(repository);
    }

    fn authentication(&self) -> Option<&Authentication> {
        self.base.authentication()
    }

    fn set_authentication(&mut self, authentication: Authentication) {
        self.base.set_authentication(authentication);
    }

    fn proxy(&self) -> Option<&ProxyInfo> {
        self.base.proxy()
    }

    fn set_proxy(&mut self, proxy: ProxyInfo) {
        self.base.set_proxy(proxy);
    }

    fn permissions(&self) -> Option<&Permissions> {
        self.base.permissions()
    }

    fn set_permissions(&mut self, permissions: Permissions) {
        self.base.set_permissions(permissions);
    }

    fn is_interactive(&self) -> bool {
        self.base.is_interactive()
    }

    fn set_interactive(&mut self, interactive: bool) {
        self.base.set_interactive(interactive);
    }

    fn add_session_listener(&mut self, listener: Arc<dyn SessionListener>) {
        self.base.add_session_listener(listener);
    }

    fn remove_session_listener(&mut self, listener: &Arc<dyn SessionListener>) -> bool {
        self.base.remove_session_listener(listener)
    }

    fn has_session_listener(&self, listener: &Arc<dyn SessionListener>) -> bool {
        self.base.has_session_listener(listener)
    }

    fn add_transfer_listener(&mut self, listener: Arc<dyn TransferListener>) {
        self.base.add_transfer_listener(listener);
    }

    fn remove_transfer_listener(&mut self, listener: &Arc<dyn TransferListener>) -> bool {
        self.base.remove_transfer_listener(listener)
    }

    fn has_transfer_listener(&self, listener: &Arc<dyn TransferListener>) -> bool {
        self.base.has_transfer_listener(listener)
    }
}

pub(crate) struct FakeFactory {
    table: Arc<ScriptTable>,
}

impl FakeFactory {
    pub fn new(table: Arc<ScriptTable>) -> Self {
        Self { table }
    }
}

impl TransportFactory for FakeFactory {
    fn create(&self) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(FakeTransport {
            base: TransportBase::new(),
            table: self.table.clone(),
        }))
    }

    fn release(&self, transport: Box<dyn Transport>) -> Result<(), TransportError> {
        let id = transport
            .repository()
            .map(|r| r.id().to_string())
            .unwrap_or_default();
        self.table.released.lock().push(id);
        Ok(())
    }
}

/// Transfer listener counting the events it sees.
#[derive(Default)]
pub(crate) struct CountingListener {
    started: AtomicUsize,
    completed: AtomicUsize,
}

impl CountingListener {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }
}

impl TransferListener for CountingListener {
    fn transfer_started(&self, _event: &TransferEvent) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    fn transfer_completed(&self, _event: &TransferEvent, _total_bytes: u64) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }
}
