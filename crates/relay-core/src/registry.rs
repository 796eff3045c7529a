//! Repository, proxy and transport-factory directory
//!
//! The registry is the process-wide source of truth consumed by the
//! failover engine: repository id -> binding (repository + credentials +
//! proxy), protocol -> proxy, protocol -> transport factory, and the map
//! of per-repository settings. Maps are written during setup and read
//! during resolution; writers sharing a registry across threads serialize
//! setup externally.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::{debug, warn};

use relay_transport::{
    Authentication, ProxyInfo, Repository, Transport, TransportError, TransportFactory,
    TransferStatistics,
};

use crate::settings::RepositorySettings;

/// Repository id -> everything needed to build a bound transport for it.
#[derive(Clone)]
struct RepositoryBinding {
    repository: Repository,
    authentication: Option<Authentication>,
    proxy: Option<ProxyInfo>,
}

pub struct Registry {
    factories: RwLock<HashMap<String, Arc<dyn TransportFactory>>>,
    proxies: RwLock<HashMap<String, ProxyInfo>>,
    bindings: RwLock<HashMap<String, RepositoryBinding>>,
    settings: RwLock<HashMap<String, Arc<RepositorySettings>>>,
    statistics: Arc<TransferStatistics>,
    online: AtomicBool,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            proxies: RwLock::new(HashMap::new()),
            bindings: RwLock::new(HashMap::new()),
            settings: RwLock::new(HashMap::new()),
            statistics: Arc::new(TransferStatistics::new()),
            online: AtomicBool::new(true),
        }
    }

    /// Register the transport factory answering for `protocol`. Replacing
    /// an earlier registration is allowed and only logged.
    pub fn register_factory(&self, protocol: &str, factory: Arc<dyn TransportFactory>) {
        if self
            .factories
            .write()
            .insert(protocol.to_string(), factory)
            .is_some()
        {
            warn!(protocol, "replacing transport factory registration");
        }
    }

    pub fn add_proxy(&self, protocol: &str, proxy: ProxyInfo) -> Result<(), TransportError> {
        if protocol.trim().is_empty() {
            return Err(TransportError::InvalidArgument(
                "proxy protocol must not be empty".to_string(),
            ));
        }
        if self
            .proxies
            .write()
            .insert(protocol.to_string(), proxy)
            .is_some()
        {
            warn!(protocol, "replacing proxy registration");
        }
        Ok(())
    }

    pub fn add_repository(
        &self,
        repository: Repository,
        authentication: Option<Authentication>,
        proxy: Option<ProxyInfo>,
    ) -> Result<(), TransportError> {
        if repository.id().trim().is_empty() {
            return Err(TransportError::InvalidArgument(
                "repository id must not be empty".to_string(),
            ));
        }
        let id = repository.id().to_string();
        let binding = RepositoryBinding {
            repository,
            authentication,
            proxy,
        };
        if self.bindings.write().insert(id.clone(), binding).is_some() {
            warn!(repository = %id, "replacing repository registration");
        }
        Ok(())
    }

    /// An unbound transport for `protocol`, with the shared statistics
    /// listener attached and the protocol's proxy (if any) applied. A
    /// missing factory and a factory that fails to construct are both
    /// reported as `UnsupportedProtocol`.
    pub fn get_raw_transport(&self, protocol: &str) -> Result<Box<dyn Transport>, TransportError> {
        let factory = self
            .factories
            .read()
            .get(protocol)
            .cloned()
            .ok_or_else(|| TransportError::UnsupportedProtocol(protocol.to_string()))?;
        let mut transport = factory
            .create()
            .map_err(|e| TransportError::UnsupportedProtocol(format!("{protocol}: {e}")))?;

        transport.add_transfer_listener(self.statistics.clone());
        if let Some(proxy) = self.proxies.read().get(protocol).cloned() {
            transport.set_proxy(proxy);
        }
        Ok(transport)
    }

    /// A transport bound to the repository registered under `id`:
    /// repository, credentials (the binding's, else the settings entry's),
    /// proxy override and permissions are all applied before returning.
    pub fn get_transport(&self, id: &str) -> Result<Box<dyn Transport>, TransportError> {
        if !self.is_online() {
            return Err(TransportError::NotOnline(format!(
                "registry is offline, cannot open {id}"
            )));
        }
        let binding = self
            .bindings
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| TransportError::RepositoryNotFound(id.to_string()))?;

        let mut transport = self.get_raw_transport(binding.repository.protocol())?;
        let settings = self.get_repository_settings(id);

        transport.set_repository(binding.repository);
        if let Some(authentication) = binding
            .authentication
            .or_else(|| settings.authentication())
        {
            transport.set_authentication(authentication);
        }
        if let Some(proxy) = binding.proxy {
            transport.set_proxy(proxy);
        }
        if let Some(permissions) = settings.permissions() {
            transport.set_permissions(permissions);
        }
        Ok(transport)
    }

    /// Shared settings for `id`, created with defaults on first use.
    pub fn get_repository_settings(&self, id: &str) -> Arc<RepositorySettings> {
        if let Some(settings) = self.settings.read().get(id) {
            return settings.clone();
        }
        self.settings
            .write()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(RepositorySettings::new(id)))
            .clone()
    }

    /// Install fully-built settings (typically from configuration loading).
    pub fn add_repository_settings(&self, settings: RepositorySettings) -> Arc<RepositorySettings> {
        let id = settings.id().to_string();
        let shared = Arc::new(settings);
        if self
            .settings
            .write()
            .insert(id.clone(), shared.clone())
            .is_some()
        {
            warn!(repository = %id, "replacing repository settings");
        }
        shared
    }

    pub fn get_repository(&self, id: &str) -> Option<Repository> {
        self.bindings.read().get(id).map(|b| b.repository.clone())
    }

    /// Take a transport back: disconnect it if it is still connected and
    /// hand it to its protocol's factory. Both steps downgrade failures to
    /// warnings; this never errors.
    pub async fn release(&self, mut transport: Box<dyn Transport>) {
        if transport.is_connected() {
            if let Err(err) = transport.disconnect().await {
                warn!(error = %err, "failed to disconnect released transport");
            }
        }
        let factory = self.factories.read().get(transport.protocol()).cloned();
        match factory {
            Some(factory) => {
                if let Err(err) = factory.release(transport) {
                    warn!(error = %err, "transport factory refused the released handle");
                }
            }
            None => debug!("dropping transport with no registered factory"),
        }
    }

    /// Global online switch. Offline, `get_transport` refuses with
    /// `NotOnline`, which the failover scan treats as transient.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    pub fn statistics(&self) -> Arc<TransferStatistics> {
        self.statistics.clone()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeFactory, ScriptTable};

    fn registry_with_fake_http() -> (Registry, Arc<ScriptTable>) {
        let registry = Registry::new();
        let table = Arc::new(ScriptTable::default());
        registry.register_factory("http", Arc::new(FakeFactory::new(table.clone())));
        (registry, table)
    }

    fn repository(id: &str) -> Repository {
        Repository::new(id, &format!("http://{id}.example.com/releases")).unwrap()
    }

    #[test]
    fn add_proxy_rejects_an_empty_protocol() {
        let registry = Registry::new();
        let err = registry
            .add_proxy("", ProxyInfo::new("proxy.internal", 3128))
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidArgument(_)));
    }

    #[test]
    fn add_repository_rejects_an_empty_id() {
        let registry = Registry::new();
        let repo = Repository::new("", "http://example.com/").unwrap();
        let err = registry.add_repository(repo, None, None).unwrap_err();
        assert!(matches!(err, TransportError::InvalidArgument(_)));
    }

    #[test]
    fn re_registering_a_repository_overwrites_silently() {
        let (registry, _table) = registry_with_fake_http();
        registry.add_repository(repository("central"), None, None).unwrap();
        registry.add_repository(repository("central"), None, None).unwrap();
        assert!(registry.get_repository("central").is_some());
    }

    #[test]
    fn unknown_repository_is_reported_as_such() {
        let (registry, _table) = registry_with_fake_http();
        let err = registry.get_transport("ghost").err().unwrap();
        assert!(matches!(err, TransportError::RepositoryNotFound(_)));
    }

    #[test]
    fn unknown_protocol_is_unsupported() {
        let registry = Registry::new();
        let err = registry.get_raw_transport("gopher").err().unwrap();
        assert!(matches!(err, TransportError::UnsupportedProtocol(_)));
        // a bound repository on an unregistered protocol reports the same
        registry
            .add_repository(repository("central"), None, None)
            .unwrap();
        let err = registry.get_transport("central").err().unwrap();
        assert!(matches!(err, TransportError::UnsupportedProtocol(_)));
    }

    #[test]
    fn get_transport_binds_repository_and_credentials() {
        let (registry, _table) = registry_with_fake_http();
        registry
            .add_repository(
                repository("central"),
                Some(Authentication::basic("deploy", "secret")),
                None,
            )
            .unwrap();

        let transport = registry.get_transport("central").unwrap();
        assert_eq!(transport.repository().unwrap().id(), "central");
        assert_eq!(transport.authentication().unwrap().username, "deploy");
    }

    #[test]
    fn binding_credentials_fall_back_to_settings() {
        let (registry, _table) = registry_with_fake_http();
        registry.add_repository(repository("central"), None, None).unwrap();
        let settings = RepositorySettings::new("central");
        settings.set_authentication(Authentication::basic("from-settings", "pw"));
        registry.add_repository_settings(settings);

        let transport = registry.get_transport("central").unwrap();
        assert_eq!(
            transport.authentication().unwrap().username,
            "from-settings"
        );
    }

    #[test]
    fn raw_transport_carries_the_statistics_listener() {
        let (registry, _table) = registry_with_fake_http();
        let transport = registry.get_raw_transport("http").unwrap();
        let stats = registry.statistics();
        let as_listener: Arc<dyn relay_transport::TransferListener> = stats;
        assert!(transport.has_transfer_listener(&as_listener));
    }

    #[test]
    fn offline_registry_refuses_with_not_online() {
        let (registry, _table) = registry_with_fake_http();
        registry.add_repository(repository("central"), None, None).unwrap();
        registry.set_online(false);
        let err = registry.get_transport("central").err().unwrap();
        assert!(matches!(err, TransportError::NotOnline(_)));
        registry.set_online(true);
        assert!(registry.get_transport("central").is_ok());
    }

    #[tokio::test]
    async fn release_disconnects_connected_transports_and_never_errors() {
        let (registry, table) = registry_with_fake_http();
        registry.add_repository(repository("central"), None, None).unwrap();

        let mut transport = registry.get_transport("central").unwrap();
        transport.connect().await.unwrap();
        assert!(transport.is_connected());

        registry.release(transport).await;
        assert_eq!(table.disconnects(), vec!["central".to_string()]);
        assert_eq!(table.released(), vec!["central".to_string()]);
    }

    #[test]
    fn settings_are_created_on_demand_and_shared() {
        let registry = Registry::new();
        let first = registry.get_repository_settings("mirror-a");
        first.blacklist();
        let second = registry.get_repository_settings("mirror-a");
        assert!(second.is_blacklisted());
    }
}
