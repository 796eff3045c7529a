//! Mirror failover engine
//!
//! `MirroredTransport` implements the full transport surface while owning
//! exactly one concrete backend at a time. When the backend fails to
//! connect or fails a download, the engine walks the logical repository's
//! mirror list for the next viable candidate, rebinds cross-cutting state
//! onto it and retries, so callers never observe the substitution.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use relay_transport::{
    Authentication, Permissions, ProxyInfo, Repository, SessionListener, Transport,
    TransportError, TransferListener,
};

use crate::registry::Registry;

/// Failover decorator for a logical repository id.
///
/// States: active (one owned backend) or exhausted (`current` is `None`,
/// reached when every remaining mirror has been tried and disqualified).
/// Exhaustion is terminal for the engine instance; a fresh engine built
/// against the same registry starts a new scan.
pub struct MirroredTransport {
    registry: Arc<Registry>,
    /// Logical repository whose mirror list drives failover.
    mirror_of: String,
    current: Option<Box<dyn Transport>>,
    /// Listeners live on the engine and are replayed onto every adopted
    /// backend, so registration survives substitutions.
    session_listeners: Vec<Arc<dyn SessionListener>>,
    transfer_listeners: Vec<Arc<dyn TransferListener>>,
    interactive: bool,
}

impl MirroredTransport {
    /// Build an engine for `repository_id`, adopting the first viable
    /// entry of its mirror list as the initial backend.
    pub fn new(
        registry: Arc<Registry>,
        repository_id: impl Into<String>,
    ) -> Result<Self, TransportError> {
        let mirror_of = repository_id.into();
        let mirrors = registry.get_repository_settings(&mirror_of).mirrors();
        let mut engine = Self {
            registry,
            mirror_of,
            current: None,
            session_listeners: Vec::new(),
            transfer_listeners: Vec::new(),
            interactive: false,
        };
        engine.current = engine.select_candidate(&mirrors, 0);
        if engine.current.is_none() {
            return Err(TransportError::MirrorsExhausted(engine.mirror_of));
        }
        Ok(engine)
    }

    /// Consumer-facing constructor: repositories with mirrors get the
    /// failover decorator, everything else gets a plain bound transport.
    pub fn for_repository(
        registry: &Arc<Registry>,
        id: &str,
    ) -> Result<Box<dyn Transport>, TransportError> {
        if registry.get_repository_settings(id).has_mirror() {
            Ok(Box::new(Self::new(registry.clone(), id)?))
        } else {
            registry.get_transport(id)
        }
    }

    /// Permanently disqualify a mirror for the rest of the run.
    pub fn blacklist_mirror(&self, id: &str) {
        self.registry.get_repository_settings(id).blacklist();
        match self.registry.get_repository(id) {
            Some(repository) => {
                warn!(mirror = id, url = %repository.url(), "mirror blacklisted for the rest of the run")
            }
            None => warn!(mirror = id, "mirror blacklisted for the rest of the run"),
        }
    }

    fn current_id(&self) -> String {
        self.current
            .as_deref()
            .and_then(|c| c.repository())
            .map(|r| r.id().to_string())
            .unwrap_or_default()
    }

    fn backend(&mut self) -> Result<&mut (dyn Transport + 'static), TransportError> {
        self.current
            .as_deref_mut()
            .ok_or_else(|| TransportError::MirrorsExhausted(self.mirror_of.clone()))
    }

    /// Walk `mirrors` from `start` and construct the first eligible
    /// candidate. Blacklisted and disabled entries are skipped untouched;
    /// a candidate whose construction fails is blacklisted unless the
    /// failure is environmental (`NotOnline`), which is never held against
    /// the mirror.
    fn select_candidate(&self, mirrors: &[String], start: usize) -> Option<Box<dyn Transport>> {
        for candidate_id in mirrors.iter().skip(start) {
            let candidate = self.registry.get_repository_settings(candidate_id);
            if candidate.is_blacklisted() {
                debug!(mirror = %candidate_id, "skipping blacklisted mirror");
                continue;
            }
            if !candidate.is_enabled() {
                debug!(mirror = %candidate_id, "skipping disabled mirror");
                continue;
            }
            match self.registry.get_transport(candidate_id) {
                Ok(transport) => return Some(transport),
                Err(TransportError::NotOnline(reason)) => {
                    info!(mirror = %candidate_id, %reason, "mirror unreachable for environmental reasons, not blacklisting");
                }
                Err(err) => {
                    warn!(mirror = %candidate_id, error = %err, "mirror failed to construct");
                    self.blacklist_mirror(candidate_id);
                }
            }
        }
        None
    }

    /// Replace the current backend with the next viable mirror.
    ///
    /// The scan resumes immediately after the failed backend's position in
    /// the mirror list; an id missing from the list leaves nothing to
    /// scan. The replaced backend is always released to the registry, and
    /// registered listeners, the interactive flag and connectedness carry
    /// over to the adopted one — credentials, proxy and repository binding
    /// are mirror-specific and never copied.
    async fn failover(&mut self) -> Result<(), TransportError> {
        let mut previous = self
            .current
            .take()
            .ok_or_else(|| TransportError::MirrorsExhausted(self.mirror_of.clone()))?;
        let settings = self.registry.get_repository_settings(&self.mirror_of);
        let was_connected = previous.is_connected();
        let previous_id = previous
            .repository()
            .map(|r| r.id().to_string())
            .unwrap_or_default();
        let mirrors = settings.mirrors();
        let start = mirrors
            .iter()
            .position(|m| *m == previous_id)
            .map_or(mirrors.len(), |i| i + 1);

        let mut adopted = self.select_candidate(&mirrors, start);
        let mut adoption_error = None;

        if let Some(next) = adopted.as_deref_mut() {
            for listener in &self.session_listeners {
                next.add_session_listener(listener.clone());
            }
            for listener in &self.transfer_listeners {
                next.add_transfer_listener(listener.clone());
            }
            next.set_interactive(self.interactive);

            if was_connected {
                if let Err(err) = previous.disconnect().await {
                    warn!(mirror = %previous_id, error = %err, "failed to disconnect replaced backend");
                }
                if let Err(err) = next.connect().await {
                    adoption_error = Some(err);
                }
            }

            let next_id = next
                .repository()
                .map(|r| r.id().to_string())
                .unwrap_or_default();
            info!(repository = %self.mirror_of, from = %previous_id, to = %next_id, "substituted failed mirror");
        }

        self.registry.release(previous).await;

        match adopted {
            Some(next) => {
                self.current = Some(next);
                match adoption_error {
                    // the adopted backend could not connect; surface the
                    // error and let the caller's retry loop take another
                    // pass against it
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }
            None => {
                warn!(repository = %self.mirror_of, "no usable mirror remains");
                Err(TransportError::MirrorsExhausted(self.mirror_of.clone()))
            }
        }
    }

    /// Exhaustion in the middle of a download is reported as success: the
    /// call returns `Ok(())` and the destination file is left unwritten,
    /// while `connect` surfaces the same condition as a connection error.
    /// Callers that must tell the two apart check the destination. Kept as
    /// its own path so the contract is visible in one place.
    fn finish_get_without_result(&self, resource: &str) -> Result<(), TransportError> {
        warn!(
            repository = %self.mirror_of,
            resource,
            "every mirror exhausted during download; destination left unwritten"
        );
        Ok(())
    }
}

#[async_trait]
impl Transport for MirroredTransport {
    fn protocol(&self) -> &str {
        match self.current.as_deref() {
            Some(current) => current.protocol(),
            None => "mirror",
        }
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        loop {
            let outcome = match self.current.as_deref_mut() {
                Some(current) => current.connect().await,
                None => {
                    return Err(TransportError::Connection(format!(
                        "every mirror of repository {} has been tried and disqualified",
                        self.mirror_of
                    )));
                }
            };
            match outcome {
                Ok(()) => return Ok(()),
                Err(
                    err @ (TransportError::Connection(_) | TransportError::Authentication(_)),
                ) => {
                    let failed_id = self.current_id();
                    warn!(repository = %failed_id, error = %err, "backend failed to connect, trying the next mirror");
                    if !failed_id.is_empty() {
                        self.blacklist_mirror(&failed_id);
                    }
                    match self.failover().await {
                        Ok(()) => {}
                        Err(TransportError::MirrorsExhausted(id)) => {
                            return Err(TransportError::Connection(format!(
                                "every mirror of repository {id} has been tried and disqualified"
                            )));
                        }
                        // adopted backend failed its first connect; the next
                        // pass anchors the scan at it
                        Err(_) => {}
                    }
                }
                Err(other) => return Err(other),
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        match self.current.as_deref_mut() {
            Some(current) => current.disconnect().await,
            None => Ok(()),
        }
    }

    async fn get(&mut self, resource: &str, destination: &Path) -> Result<(), TransportError> {
        loop {
            let outcome = match self.current.as_deref_mut() {
                Some(current) => current.get(resource, destination).await,
                None => return Err(TransportError::MirrorsExhausted(self.mirror_of.clone())),
            };
            match outcome {
                Ok(()) => return Ok(()),
                Err(err @ TransportError::Transfer { .. }) => {
                    warn!(repository = %self.current_id(), error = %err, "download failed, trying the next mirror");
                    match self.failover().await {
                        Ok(()) => {}
                        Err(TransportError::MirrorsExhausted(_)) => {
                            return self.finish_get_without_result(resource);
                        }
                        Err(_) => {}
                    }
                }
                Err(other) => return Err(other),
            }
        }
    }

    // Only connect() and get() are failover-protected; the remaining
    // operations ride whatever backend is current.

    async fn get_if_newer(
        &mut self,
        resource: &str,
        destination: &Path,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, TransportError> {
        self.backend()?
            .get_if_newer(resource, destination, timestamp)
            .await
    }

    async fn put(&mut self, source: &Path, resource: &str) -> Result<(), TransportError> {
        self.backend()?.put(source, resource).await
    }

    async fn put_directory(
        &mut self,
        source: &Path,
        destination: &str,
    ) -> Result<(), TransportError> {
        self.backend()?.put_directory(source, destination).await
    }

    async fn resource_exists(&mut self, resource: &str) -> Result<bool, TransportError> {
        self.backend()?.resource_exists(resource).await
    }

    async fn file_list(&mut self, directory: &str) -> Result<Vec<String>, TransportError> {
        self.backend()?.file_list(directory).await
    }

    fn is_connected(&self) -> bool {
        self.current
            .as_deref()
            .map(|c| c.is_connected())
            .unwrap_or(false)
    }

    fn repository(&self) -> Option<&Repository> {
        self.current.as_deref().and_then(|c| c.repository())
    }

    fn set_repository(&mut self, repository: Repository) {
        if let Some(current) = self.current.as_deref_mut() {
            current.set_repository(repository);
        }
    }

    fn authentication(&self) -> Option<&Authentication> {
        self.current.as_deref().and_then(|c| c.authentication())
    }

    fn set_authentication(&mut self, authentication: Authentication) {
        if let Some(current) = self.current.as_deref_mut() {
            current.set_authentication(authentication);
        }
    }

    fn proxy(&self) -> Option<&ProxyInfo> {
        self.current.as_deref().and_then(|c| c.proxy())
    }

    fn set_proxy(&mut self, proxy: ProxyInfo) {
        if let Some(current) = self.current.as_deref_mut() {
            current.set_proxy(proxy);
        }
    }

    fn permissions(&self) -> Option<&Permissions> {
        self.current.as_deref().and_then(|c| c.permissions())
    }

    fn set_permissions(&mut self, permissions: Permissions) {
        if let Some(current) = self.current.as_deref_mut() {
            current.set_permissions(permissions);
        }
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
        if let Some(current) = self.current.as_deref_mut() {
            current.set_interactive(interactive);
        }
    }

    fn add_session_listener(&mut self, listener: Arc<dyn SessionListener>) {
        if let Some(current) = self.current.as_deref_mut() {
            current.add_session_listener(listener.clone());
        }
        if !self
            .session_listeners
            .iter()
            .any(|l| Arc::ptr_eq(l, &listener))
        {
            self.session_listeners.push(listener);
        }
    }

    fn remove_session_listener(&mut self, listener: &Arc<dyn SessionListener>) -> bool {
        if let Some(current) = self.current.as_deref_mut() {
            current.remove_session_listener(listener);
        }
        let before = self.session_listeners.len();
        self.session_listeners.retain(|l| !Arc::ptr_eq(l, listener));
        self.session_listeners.len() != before
    }

    fn has_session_listener(&self, listener: &Arc<dyn SessionListener>) -> bool {
        self.session_listeners
            .iter()
            .any(|l| Arc::ptr_eq(l, listener))
    }

    fn add_transfer_listener(&mut self, listener: Arc<dyn TransferListener>) {
        if let Some(current) = self.current.as_deref_mut() {
            current.add_transfer_listener(listener.clone());
        }
        if !self
            .transfer_listeners
            .iter()
            .any(|l| Arc::ptr_eq(l, &listener))
        {
            self.transfer_listeners.push(listener);
        }
    }

    fn remove_transfer_listener(&mut self, listener: &Arc<dyn TransferListener>) -> bool {
        if let Some(current) = self.current.as_deref_mut() {
            current.remove_transfer_listener(listener);
        }
        let before = self.transfer_listeners.len();
        self.transfer_listeners
            .retain(|l| !Arc::ptr_eq(l, listener));
        self.transfer_listeners.len() != before
    }

    fn has_transfer_listener(&self, listener: &Arc<dyn TransferListener>) -> bool {
        self.transfer_listeners
            .iter()
            .any(|l| Arc::ptr_eq(l, listener))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::RepositorySettings;
    use crate::testing::{CountingListener, FakeFactory, GetOutcome, ScriptTable};

    fn http_repository(id: &str) -> Repository {
        Repository::new(id, &format!("http://{id}.example.com/releases")).unwrap()
    }

    /// Registry with a scripted http factory, a logical repository
    /// "central" and the given mirror ids registered in order.
    fn mirrored_registry(mirrors: &[&str]) -> (Arc<Registry>, Arc<ScriptTable>) {
        let registry = Arc::new(Registry::new());
        let table = Arc::new(ScriptTable::default());
        registry.register_factory("http", Arc::new(FakeFactory::new(table.clone())));

        registry
            .add_repository(http_repository("central"), None, None)
            .unwrap();
        let settings = RepositorySettings::new("central");
        for mirror in mirrors {
            settings.add_mirror(*mirror);
            registry
                .add_repository(http_repository(mirror), None, None)
                .unwrap();
            registry.add_repository_settings(RepositorySettings::mirror(*mirror, "central"));
        }
        registry.add_repository_settings(settings);
        (registry, table)
    }

    #[tokio::test]
    async fn engine_adopts_the_first_mirror_in_list_order() {
        let (registry, _table) = mirrored_registry(&["m1", "m2"]);
        let engine = MirroredTransport::new(registry, "central").unwrap();
        assert_eq!(engine.repository().unwrap().id(), "m1");
    }

    #[tokio::test]
    async fn for_repository_returns_a_plain_transport_without_mirrors() {
        let (registry, _table) = mirrored_registry(&[]);
        let transport = MirroredTransport::for_repository(&registry, "central").unwrap();
        assert_eq!(transport.repository().unwrap().id(), "central");
    }

    #[tokio::test]
    async fn connect_blacklists_failed_mirrors_and_walks_the_list() {
        let (registry, table) = mirrored_registry(&["m1", "m2", "m3"]);
        table.script_connect("m1", Err(TransportError::Connection("refused".to_string())));

        let mut engine = MirroredTransport::new(registry.clone(), "central").unwrap();
        engine.connect().await.unwrap();

        assert!(registry.get_repository_settings("m1").is_blacklisted());
        assert_eq!(engine.repository().unwrap().id(), "m2");
        assert!(engine.is_connected());

        // the next connect fails on m2 and moves on to m3
        table.script_connect("m2", Err(TransportError::Connection("refused".to_string())));
        engine.connect().await.unwrap();

        assert!(registry.get_repository_settings("m2").is_blacklisted());
        assert_eq!(engine.repository().unwrap().id(), "m3");
        // every replaced backend went back to the registry
        assert_eq!(table.released(), vec!["m1".to_string(), "m2".to_string()]);
    }

    #[tokio::test]
    async fn authentication_failures_drive_the_same_failover_as_connection_failures() {
        let (registry, table) = mirrored_registry(&["m1", "m2"]);
        table.script_connect(
            "m1",
            Err(TransportError::Authentication("bad credentials".to_string())),
        );

        let mut engine = MirroredTransport::new(registry.clone(), "central").unwrap();
        engine.connect().await.unwrap();

        assert!(registry.get_repository_settings("m1").is_blacklisted());
        assert_eq!(engine.repository().unwrap().id(), "m2");
    }

    #[tokio::test]
    async fn connect_surfaces_exhaustion_as_a_connection_error() {
        let (registry, table) = mirrored_registry(&["m1", "m2"]);
        let mut engine = MirroredTransport::new(registry.clone(), "central").unwrap();
        registry.get_repository_settings("m2").blacklist();
        table.script_connect("m1", Err(TransportError::Connection("refused".to_string())));

        let err = engine.connect().await.unwrap_err();
        match err {
            TransportError::Connection(message) => assert!(message.contains("central")),
            other => panic!("expected a connection error, got {other}"),
        }

        // terminal: a later connect is rejected the same way
        let err = engine.connect().await.unwrap_err();
        assert!(matches!(err, TransportError::Connection(_)));
    }

    #[tokio::test]
    async fn construction_fails_when_every_mirror_is_already_disqualified() {
        let (registry, _table) = mirrored_registry(&["m1", "m2"]);
        registry.get_repository_settings("m1").blacklist();
        registry.get_repository_settings("m2").blacklist();

        let err = MirroredTransport::new(registry, "central").err().unwrap();
        assert!(matches!(err, TransportError::MirrorsExhausted(_)));
    }

    #[tokio::test]
    async fn transfer_failure_retries_on_the_next_constructible_mirror() {
        // m2's protocol has no registered factory, so its construction
        // fails and it gets blacklisted; m3 serves the download
        let registry = Arc::new(Registry::new());
        let table = Arc::new(ScriptTable::default());
        registry.register_factory("http", Arc::new(FakeFactory::new(table.clone())));
        registry
            .add_repository(http_repository("m1"), None, None)
            .unwrap();
        registry
            .add_repository(
                Repository::new("m2", "scp://m2.example.com/releases").unwrap(),
                None,
                None,
            )
            .unwrap();
        registry
            .add_repository(http_repository("m3"), None, None)
            .unwrap();
        let settings = RepositorySettings::new("central");
        for mirror in ["m1", "m2", "m3"] {
            settings.add_mirror(mirror);
            registry.add_repository_settings(RepositorySettings::mirror(mirror, "central"));
        }
        registry.add_repository_settings(settings);

        table.script_get(
            "m1",
            GetOutcome::Fail(TransportError::transfer("lib.jar", "connection reset")),
        );
        table.script_get("m3", GetOutcome::Write(b"payload".to_vec()));

        let mut engine = MirroredTransport::new(registry.clone(), "central").unwrap();
        engine.connect().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("lib.jar");
        engine.get("lib.jar", &destination).await.unwrap();

        assert_eq!(tokio::fs::read(&destination).await.unwrap(), b"payload");
        assert_eq!(engine.repository().unwrap().id(), "m3");
        assert!(registry.get_repository_settings("m2").is_blacklisted());
        // a transfer failure alone never blacklists the mirror it hit
        assert!(!registry.get_repository_settings("m1").is_blacklisted());
    }

    #[tokio::test]
    async fn get_swallows_exhaustion_and_leaves_the_destination_untouched() {
        let (registry, table) = mirrored_registry(&["m1"]);
        table.script_get(
            "m1",
            GetOutcome::Fail(TransportError::transfer("lib.jar", "connection reset")),
        );

        let mut engine = MirroredTransport::new(registry, "central").unwrap();
        engine.connect().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("lib.jar");
        engine.get("lib.jar", &destination).await.unwrap();
        assert!(!destination.exists());

        // the engine is spent; later downloads are rejected outright
        let err = engine.get("lib.jar", &destination).await.unwrap_err();
        assert!(matches!(err, TransportError::MirrorsExhausted(_)));
    }

    #[tokio::test]
    async fn disabled_mirrors_are_skipped_without_blacklisting() {
        let (registry, table) = mirrored_registry(&["m1", "m2", "m3"]);
        registry.get_repository_settings("m2").set_enabled(false);
        table.script_get(
            "m1",
            GetOutcome::Fail(TransportError::transfer("a.jar", "reset")),
        );
        table.script_get("m3", GetOutcome::Write(b"from-m3".to_vec()));

        let mut engine = MirroredTransport::new(registry.clone(), "central").unwrap();
        engine.connect().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        engine.get("a.jar", &dir.path().join("a.jar")).await.unwrap();

        assert_eq!(engine.repository().unwrap().id(), "m3");
        assert!(!registry.get_repository_settings("m2").is_blacklisted());
    }

    #[tokio::test]
    async fn re_enabled_mirrors_become_eligible_again() {
        let (registry, _table) = mirrored_registry(&["m1", "m2"]);
        registry.get_repository_settings("m1").blacklist();
        registry.get_repository_settings("m2").set_enabled(false);
        assert!(MirroredTransport::new(registry.clone(), "central").is_err());

        registry.get_repository_settings("m2").set_enabled(true);
        let engine = MirroredTransport::new(registry, "central").unwrap();
        assert_eq!(engine.repository().unwrap().id(), "m2");
    }

    #[tokio::test]
    async fn offline_candidates_are_skipped_but_not_blacklisted() {
        let (registry, table) = mirrored_registry(&["m1", "m2"]);
        table.script_get(
            "m1",
            GetOutcome::Fail(TransportError::transfer("a.jar", "reset")),
        );

        let mut engine = MirroredTransport::new(registry.clone(), "central").unwrap();
        engine.connect().await.unwrap();
        registry.set_online(false);

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("a.jar");
        // m2 is unreachable while offline, so the scan exhausts quietly
        engine.get("a.jar", &destination).await.unwrap();
        assert!(!destination.exists());
        assert!(!registry.get_repository_settings("m2").is_blacklisted());
    }

    #[tokio::test]
    async fn listeners_follow_the_engine_across_failover() {
        let (registry, table) = mirrored_registry(&["m1", "m2"]);
        table.script_get(
            "m1",
            GetOutcome::Fail(TransportError::transfer("a.jar", "reset")),
        );
        table.script_get("m2", GetOutcome::Write(b"ok".to_vec()));

        let mut engine = MirroredTransport::new(registry, "central").unwrap();
        let listener = Arc::new(CountingListener::default());
        let as_dyn: Arc<dyn TransferListener> = listener.clone();
        engine.add_transfer_listener(as_dyn.clone());
        engine.connect().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        engine.get("a.jar", &dir.path().join("a.jar")).await.unwrap();

        assert!(engine.has_transfer_listener(&as_dyn));
        // the listener saw both the failed m1 attempt and the m2 retry
        assert_eq!(listener.started(), 2);
        assert_eq!(listener.completed(), 1);
    }

    #[tokio::test]
    async fn credentials_are_never_copied_between_backends() {
        let registry = Arc::new(Registry::new());
        let table = Arc::new(ScriptTable::default());
        registry.register_factory("http", Arc::new(FakeFactory::new(table.clone())));
        registry
            .add_repository(
                http_repository("m1"),
                Some(Authentication::basic("m1-user", "m1-secret")),
                None,
            )
            .unwrap();
        registry
            .add_repository(http_repository("m2"), None, None)
            .unwrap();
        let settings = RepositorySettings::new("central");
        settings.add_mirror("m1");
        settings.add_mirror("m2");
        registry.add_repository_settings(settings);

        table.script_get(
            "m1",
            GetOutcome::Fail(TransportError::transfer("a.jar", "reset")),
        );

        let mut engine = MirroredTransport::new(registry, "central").unwrap();
        engine.connect().await.unwrap();
        assert_eq!(engine.authentication().unwrap().username, "m1-user");

        let dir = tempfile::tempdir().unwrap();
        engine.get("a.jar", &dir.path().join("a.jar")).await.unwrap();

        assert_eq!(engine.repository().unwrap().id(), "m2");
        assert!(engine.authentication().is_none());
    }

    #[tokio::test]
    async fn pass_through_operations_reach_the_current_backend() {
        let (registry, _table) = mirrored_registry(&["m1"]);
        let mut engine = MirroredTransport::new(registry, "central").unwrap();
        engine.connect().await.unwrap();
        assert!(engine.resource_exists("anything").await.unwrap());
        assert!(engine.file_list("dir").await.unwrap().is_empty());
    }
}
