//! Configuration loading and registry construction

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use relay_core::{Registry, RepositorySettings};
use relay_transport::{
    Authentication, FileTransportFactory, HttpTransportFactory, Permissions, ProxyInfo,
    Repository,
};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub proxies: Vec<ProxyConfig>,
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Outbound proxy for one protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// One repository (or mirror) entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Unique identifier for the repository
    pub id: String,
    /// Repository URL; the scheme selects the transport
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Set when this entry is itself a mirror of another repository id
    #[serde(default)]
    pub mirror_of: Option<String>,
    /// Fallback mirror ids, in priority order
    #[serde(default)]
    pub mirrors: Vec<String>,
    /// Whether this repository may be selected
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Octal mode applied to uploaded files, where supported
    #[serde(default)]
    pub file_mode: Option<String>,
}

impl RepositoryConfig {
    fn authentication(&self) -> Option<Authentication> {
        self.username.as_ref().map(|username| Authentication {
            username: username.clone(),
            password: self.password.clone(),
            ..Authentication::default()
        })
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_enabled() -> bool {
    true
}

impl Config {
    /// Load configuration from a file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);
        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {path}"))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Translate the file model into a populated registry: transport
    /// factories for http/https/file, proxies, repository bindings and
    /// per-repository mirror settings.
    pub fn build_registry(&self) -> Result<Arc<Registry>> {
        let registry = Arc::new(Registry::new());

        let http = Arc::new(HttpTransportFactory::new());
        registry.register_factory("http", http.clone());
        registry.register_factory("https", http);
        registry.register_factory("file", Arc::new(FileTransportFactory::new()));

        for proxy in &self.proxies {
            registry.add_proxy(
                &proxy.protocol,
                ProxyInfo {
                    host: proxy.host.clone(),
                    port: proxy.port,
                    username: proxy.username.clone(),
                    password: proxy.password.clone(),
                },
            )?;
        }

        for repo in &self.repositories {
            let repository = Repository::new(repo.id.as_str(), &repo.url)?;
            registry.add_repository(repository, repo.authentication(), None)?;

            let settings = match &repo.mirror_of {
                Some(of) => RepositorySettings::mirror(repo.id.as_str(), of.as_str()),
                None => RepositorySettings::new(repo.id.as_str()),
            };
            for mirror in &repo.mirrors {
                settings.add_mirror(mirror.as_str());
            }
            settings.set_enabled(repo.enabled);
            if let Some(authentication) = repo.authentication() {
                settings.set_authentication(authentication);
            }
            if let Some(mode) = &repo.file_mode {
                settings.set_permissions(Permissions {
                    file_mode: Some(mode.clone()),
                    directory_mode: None,
                });
            }
            registry.add_repository_settings(settings);
        }

        Ok(registry)
    }
}
