//! Per-repository mirror configuration

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use relay_transport::{Authentication, Permissions, ProxyInfo};

/// Runtime settings for one repository id: its ordered mirror list, the
/// enabled/blacklisted flags and the opaque credential records handed to
/// transport construction.
///
/// The registry hands these out as shared `Arc`s; interior mutability keeps
/// a blacklist write visible to every holder. An entry whose `mirror_of` is
/// set is itself a mirror and never has mirrors of its own — chains are
/// deliberately not a thing.
pub struct RepositorySettings {
    id: String,
    mirror_of: Option<String>,
    mirrors: RwLock<Vec<String>>,
    enabled: AtomicBool,
    blacklisted: AtomicBool,
    authentication: RwLock<Option<Authentication>>,
    proxy: RwLock<Option<ProxyInfo>>,
    permissions: RwLock<Option<Permissions>>,
}

impl RepositorySettings {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mirror_of: None,
            mirrors: RwLock::new(Vec::new()),
            enabled: AtomicBool::new(true),
            blacklisted: AtomicBool::new(false),
            authentication: RwLock::new(None),
            proxy: RwLock::new(None),
            permissions: RwLock::new(None),
        }
    }

    /// Settings for an entry that is itself a mirror of `mirror_of`.
    pub fn mirror(id: impl Into<String>, mirror_of: impl Into<String>) -> Self {
        Self {
            mirror_of: Some(mirror_of.into()),
            ..Self::new(id)
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mirror_of(&self) -> Option<&str> {
        self.mirror_of.as_deref()
    }

    /// Append a mirror id; append order is failover priority.
    pub fn add_mirror(&self, id: impl Into<String>) {
        self.mirrors.write().push(id.into());
    }

    /// Snapshot of the mirror list in priority order.
    pub fn mirrors(&self) -> Vec<String> {
        self.mirrors.read().clone()
    }

    pub fn is_mirror(&self) -> bool {
        self.mirror_of
            .as_deref()
            .is_some_and(|of| !of.trim().is_empty())
    }

    /// Whether failover applies to this repository. Always false for an
    /// entry that is itself a mirror, whatever its own list says.
    pub fn has_mirror(&self) -> bool {
        !self.is_mirror() && !self.mirrors.read().is_empty()
    }

    /// Permanently disqualify this repository for the rest of the run.
    /// There is intentionally no way to clear the flag.
    pub fn blacklist(&self) {
        self.blacklisted.store(true, Ordering::Relaxed);
    }

    pub fn is_blacklisted(&self) -> bool {
        self.blacklisted.load(Ordering::Relaxed)
    }

    /// Administrative on/off switch, independent of the blacklist and
    /// togglable in both directions.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_authentication(&self, authentication: Authentication) {
        *self.authentication.write() = Some(authentication);
    }

    pub fn authentication(&self) -> Option<Authentication> {
        self.authentication.read().clone()
    }

    pub fn set_proxy(&self, proxy: ProxyInfo) {
        *self.proxy.write() = Some(proxy);
    }

    pub fn proxy(&self) -> Option<ProxyInfo> {
        self.proxy.read().clone()
    }

    pub fn set_permissions(&self, permissions: Permissions) {
        *self.permissions.write() = Some(permissions);
    }

    pub fn permissions(&self) -> Option<Permissions> {
        self.permissions.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrors_keep_append_order() {
        let settings = RepositorySettings::new("central");
        settings.add_mirror("mirror-a");
        settings.add_mirror("mirror-b");
        settings.add_mirror("mirror-c");
        assert_eq!(settings.mirrors(), vec!["mirror-a", "mirror-b", "mirror-c"]);
        assert!(settings.has_mirror());
    }

    #[test]
    fn a_mirror_entry_never_reports_mirrors_of_its_own() {
        let settings = RepositorySettings::mirror("mirror-a", "central");
        settings.add_mirror("mirror-b");
        assert!(settings.is_mirror());
        assert!(!settings.has_mirror());
    }

    #[test]
    fn blank_mirror_of_does_not_make_an_entry_a_mirror() {
        let settings = RepositorySettings::mirror("weird", "   ");
        assert!(!settings.is_mirror());
    }

    #[test]
    fn blacklist_is_one_way() {
        let settings = RepositorySettings::new("mirror-a");
        assert!(!settings.is_blacklisted());
        settings.blacklist();
        assert!(settings.is_blacklisted());
        // the enabled flag is independent and does not clear it
        settings.set_enabled(false);
        settings.set_enabled(true);
        assert!(settings.is_blacklisted());
    }

    #[test]
    fn enabled_toggles_both_ways() {
        let settings = RepositorySettings::new("mirror-a");
        assert!(settings.is_enabled());
        settings.set_enabled(false);
        assert!(!settings.is_enabled());
        settings.set_enabled(true);
        assert!(settings.is_enabled());
    }

    #[test]
    fn empty_mirror_list_means_no_failover() {
        let settings = RepositorySettings::new("central");
        assert!(!settings.has_mirror());
    }
}
