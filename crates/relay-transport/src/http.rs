//! HTTP(S) transport backend on top of `reqwest`

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use crate::error::TransportError;
use crate::listener::{SessionListener, TransferEvent, TransferListener};
use crate::repository::{Authentication, Permissions, ProxyInfo, Repository};
use crate::transport::{Transport, TransportBase, TransportFactory};

/// Transport for `http` and `https` repositories.
///
/// The session is connectionless: `connect` builds the client (applying the
/// configured proxy) and binds it to the repository; network failures
/// surface on the first transfer.
pub struct HttpTransport {
    base: TransportBase,
    client: Option<Client>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            base: TransportBase::new(),
            client: None,
        }
    }

    fn client(&self) -> Result<&Client, TransportError> {
        self.client
            .as_ref()
            .ok_or_else(|| TransportError::Connection("transport is not connected".to_string()))
    }

    /// Resolve a resource name against the repository URL. The base path is
    /// normalized to end in `/` so `Url::join` appends instead of replacing
    /// the last segment.
    fn resource_url(&self, resource: &str) -> Result<Url, TransportError> {
        let repository = self.base.require_repository()?;
        let mut base = repository.url().clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        base.join(resource.trim_start_matches('/')).map_err(|e| {
            TransportError::Configuration(format!("cannot resolve resource {resource:?}: {e}"))
        })
    }

    fn directory_url(&self, directory: &str) -> Result<Url, TransportError> {
        let mut url = self.resource_url(directory)?;
        if !url.path().ends_with('/') {
            url.set_path(&format!("{}/", url.path()));
        }
        Ok(url)
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match self.base.authentication() {
            Some(auth) => request.basic_auth(&auth.username, auth.password.as_deref()),
            None => request,
        }
    }

    fn check_status(url: &Url, resource: &str, status: StatusCode) -> Result<(), TransportError> {
        if status == StatusCode::NOT_FOUND {
            return Err(TransportError::transfer(resource, "resource not found (404)"));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TransportError::Authentication(format!(
                "{url} returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(TransportError::transfer(
                resource,
                format!("upstream returned {status}"),
            ));
        }
        Ok(())
    }

    async fn download(
        &self,
        url: &Url,
        resource: &str,
        destination: &Path,
        event: &TransferEvent,
    ) -> Result<u64, TransportError> {
        debug!(%url, "downloading");
        let request = self.apply_auth(self.client()?.get(url.clone()));
        let mut response = request
            .send()
            .await
            .map_err(|e| TransportError::transfer(resource, e))?;
        Self::check_status(url, resource, response.status())?;

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TransportError::transfer(resource, e))?;
        }
        let mut file = fs::File::create(destination)
            .await
            .map_err(|e| TransportError::transfer(resource, e))?;

        let mut total = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| TransportError::transfer(resource, e))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| TransportError::transfer(resource, e))?;
            total += chunk.len() as u64;
            self.base.fire_transfer_progress(event, chunk.len());
        }
        file.flush()
            .await
            .map_err(|e| TransportError::transfer(resource, e))?;

        Ok(total)
    }

    async fn upload(
        &self,
        url: &Url,
        source: &Path,
        resource: &str,
        event: &TransferEvent,
    ) -> Result<u64, TransportError> {
        let data = fs::read(source).await.map_err(|e| {
            TransportError::transfer(resource, format!("failed to read {}: {e}", source.display()))
        })?;
        let total = data.len() as u64;

        debug!(%url, bytes = total, "uploading");
        let request = self
            .apply_auth(self.client()?.put(url.clone()))
            .body(Bytes::from(data));
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::transfer(resource, e))?;
        Self::check_status(url, resource, response.status())?;

        self.base.fire_transfer_progress(event, total as usize);
        Ok(total)
    }

    /// Remote modification time from a `Last-Modified` header, when the
    /// server sends one.
    async fn last_modified(
        &self,
        url: &Url,
        resource: &str,
    ) -> Result<Option<DateTime<Utc>>, TransportError> {
        let request = self.apply_auth(self.client()?.head(url.clone()));
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::transfer(resource, e))?;
        Self::check_status(url, resource, response.status())?;

        Ok(response
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
            .map(|value| value.with_timezone(&Utc)))
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull relative entry names out of an index page. Only plain
/// double-quoted `href` attributes are considered; absolute links, query
/// anchors and parent references are skipped.
fn parse_directory_listing(html: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut rest = html;
    while let Some(start) = rest.find("href=\"") {
        rest = &rest[start + 6..];
        let Some(end) = rest.find('"') else { break };
        let href = &rest[..end];
        rest = &rest[end..];
        if href.is_empty()
            || href.starts_with('?')
            || href.starts_with('#')
            || href.starts_with('/')
            || href.starts_with("../")
            || href.contains("://")
        {
            continue;
        }
        entries.push(href.to_string());
    }
    entries
}

#[async_trait]
impl Transport for HttpTransport {
    fn protocol(&self) -> &str {
        match self.base.repository() {
            Some(repository) => repository.protocol(),
            None => "http",
        }
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.base.is_connected() {
            return Ok(());
        }
        let repository = self.base.require_repository()?.clone();

        let mut builder = Client::builder();
        if let Some(proxy) = self.base.proxy() {
            let mut configured = reqwest::Proxy::all(proxy.url()).map_err(|e| {
                TransportError::Configuration(format!("invalid proxy {}: {e}", proxy.url()))
            })?;
            if let Some(username) = &proxy.username {
                configured =
                    configured.basic_auth(username, proxy.password.as_deref().unwrap_or(""));
            }
            builder = builder.proxy(configured);
        }
        let client = builder.build().map_err(|e| {
            TransportError::Connection(format!(
                "failed to build http client for {}: {e}",
                repository.id()
            ))
        })?;

        self.client = Some(client);
        self.base.set_connected(true);
        self.base.fire_session_opened();
        debug!(repository = repository.id(), "http session opened");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if self.base.is_connected() {
            self.client = None;
            self.base.set_connected(false);
            self.base.fire_session_closed();
        }
        Ok(())
    }

    async fn get(&mut self, resource: &str, destination: &Path) -> Result<(), TransportError> {
        let url = self.resource_url(resource)?;
        let event = TransferEvent::get(resource, self.base.repository_id());
        self.base.fire_transfer_started(&event);
        match self.download(&url, resource, destination, &event).await {
            Ok(total) => {
                self.base.fire_transfer_completed(&event, total);
                Ok(())
            }
            Err(err) => {
                self.base.fire_transfer_failed(&event, &err);
                Err(err)
            }
        }
    }

    async fn get_if_newer(
        &mut self,
        resource: &str,
        destination: &Path,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, TransportError> {
        let url = self.resource_url(resource)?;
        match self.last_modified(&url, resource).await? {
            Some(modified) if modified <= timestamp => Ok(false),
            // no header means we cannot tell; fetch
            _ => {
                self.get(resource, destination).await?;
                Ok(true)
            }
        }
    }

    async fn put(&mut self, source: &Path, resource: &str) -> Result<(), TransportError> {
        let url = self.resource_url(resource)?;
        let event = TransferEvent::put(resource, self.base.repository_id());
        self.base.fire_transfer_started(&event);
        match self.upload(&url, source, resource, &event).await {
            Ok(total) => {
                self.base.fire_transfer_completed(&event, total);
                Ok(())
            }
            Err(err) => {
                self.base.fire_transfer_failed(&event, &err);
                Err(err)
            }
        }
    }

    async fn put_directory(
        &mut self,
        source: &Path,
        destination: &str,
    ) -> Result<(), TransportError> {
        let mut pending = vec![(
            source.to_path_buf(),
            destination.trim_matches('/').to_string(),
        )];
        while let Some((dir, prefix)) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await.map_err(|e| {
                TransportError::transfer(
                    prefix.clone(),
                    format!("failed to read directory {}: {e}", dir.display()),
                )
            })?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| TransportError::transfer(prefix.clone(), e))?
            {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                let target = if prefix.is_empty() {
                    name
                } else {
                    format!("{prefix}/{name}")
                };
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| TransportError::transfer(target.clone(), e))?;
                if file_type.is_dir() {
                    pending.push((path, target));
                } else {
                    self.put(&path, &target).await?;
                }
            }
        }
        Ok(())
    }

    async fn resource_exists(&mut self, resource: &str) -> Result<bool, TransportError> {
        let url = self.resource_url(resource)?;
        let request = self.apply_auth(self.client()?.head(url.clone()));
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::transfer(resource, e))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TransportError::Authentication(format!(
                "{url} returned {status}"
            )));
        }
        Ok(status.is_success())
    }

    async fn file_list(&mut self, directory: &str) -> Result<Vec<String>, TransportError> {
        let url = self.directory_url(directory)?;
        let request = self.apply_auth(self.client()?.get(url.clone()));
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::transfer(directory, e))?;
        Self::check_status(&url, directory, response.status())?;
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::transfer(directory, e))?;
        Ok(parse_directory_listing(&body))
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

/// Factory for `http` and `https`. Register the same instance under both
/// protocols.
#[derive(Default)]
pub struct HttpTransportFactory;

impl HttpTransportFactory {
    pub fn new() -> Self {
        Self
    }
}

impl TransportFactory for HttpTransportFactory {
    fn create(&self) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(HttpTransport::new()))
    }
}
