//! Repository addresses and the opaque credential/proxy records passed
//! through to transport construction.

use std::path::PathBuf;

use url::Url;

use crate::error::TransportError;

/// A remote (or local) artifact repository address.
///
/// The protocol is the URL scheme; host, port and base directory are all
/// derived from the parsed URL. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Repository {
    id: String,
    url: Url,
}

impl Repository {
    pub fn new(id: impl Into<String>, url: &str) -> Result<Self, TransportError> {
        let parsed = Url::parse(url).map_err(|e| {
            TransportError::Configuration(format!("invalid repository url {url:?}: {e}"))
        })?;
        Ok(Self {
            id: id.into(),
            url: parsed,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn protocol(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    pub fn port(&self) -> Option<u16> {
        self.url.port_or_known_default()
    }

    /// Path component of the repository URL.
    pub fn basedir(&self) -> &str {
        self.url.path()
    }
}

/// Credentials bound to a repository or mirror.
#[derive(Debug, Clone, Default)]
pub struct Authentication {
    pub username: String,
    pub password: Option<String>,
    pub private_key: Option<PathBuf>,
    pub passphrase: Option<String>,
}

impl Authentication {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Some(password.into()),
            ..Self::default()
        }
    }
}

/// An outbound proxy for a given protocol.
#[derive(Debug, Clone)]
pub struct ProxyInfo {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
        }
    }

    /// Proxy address in URL form, as `reqwest::Proxy` expects it.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Filesystem permissions applied to uploaded artifacts, where the backend
/// supports them. Modes are octal strings ("0644").
#[derive(Debug, Clone, Default)]
pub struct Permissions {
    pub file_mode: Option<String>,
    pub directory_mode: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_derives_address_parts_from_url() {
        let repo = Repository::new("central", "https://repo.example.com:8443/releases").unwrap();
        assert_eq!(repo.id(), "central");
        assert_eq!(repo.protocol(), "https");
        assert_eq!(repo.host(), Some("repo.example.com"));
        assert_eq!(repo.port(), Some(8443));
        assert_eq!(repo.basedir(), "/releases");
    }

    #[test]
    fn repository_default_port_comes_from_scheme() {
        let repo = Repository::new("central", "http://repo.example.com/releases").unwrap();
        assert_eq!(repo.port(), Some(80));
    }

    #[test]
    fn invalid_url_is_a_configuration_error() {
        let err = Repository::new("broken", "not a url").unwrap_err();
        assert!(matches!(err, TransportError::Configuration(_)));
    }

    #[test]
    fn proxy_url_form() {
        let proxy = ProxyInfo::new("proxy.internal", 3128);
        assert_eq!(proxy.url(), "http://proxy.internal:3128");
    }
}
