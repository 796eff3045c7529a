//! Local filesystem transport backend
//!
//! Serves `file://` repositories straight off the local disk with
//! `tokio::fs`. Mostly used for directory-backed mirrors and for exercising
//! consumers without a network.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::listener::{SessionListener, TransferEvent, TransferListener};
use crate::repository::{Authentication, Permissions, ProxyInfo, Repository};
use crate::transport::{Transport, TransportBase, TransportFactory};

pub struct FileTransport {
    base: TransportBase,
}

impl FileTransport {
    pub fn new() -> Self {
        Self {
            base: TransportBase::new(),
        }
    }

    fn root(&self) -> Result<PathBuf, TransportError> {
        let repository = self.base.require_repository()?;
        repository.url().to_file_path().map_err(|_| {
            TransportError::Configuration(format!(
                "repository {} is not a file url: {}",
                repository.id(),
                repository.url()
            ))
        })
    }

    fn resolve(&self, resource: &str) -> Result<PathBuf, TransportError> {
        Ok(self.root()?.join(resource.trim_start_matches('/')))
    }

    async fn copy_in(
        &self,
        source: &Path,
        destination: &Path,
        resource: &str,
        event: &TransferEvent,
    ) -> Result<u64, TransportError> {
        if !fs::try_exists(source)
            .await
            .map_err(|e| TransportError::transfer(resource, e))?
        {
            return Err(TransportError::transfer(resource, "resource not found"));
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TransportError::transfer(resource, e))?;
        }
        let bytes = fs::copy(source, destination)
            .await
            .map_err(|e| TransportError::transfer(resource, e))?;
        self.base.fire_transfer_progress(event, bytes as usize);
        Ok(bytes)
    }

    #[cfg(unix)]
    async fn apply_file_mode(&self, target: &Path) {
        use std::os::unix::fs::PermissionsExt;

        let Some(mode) = self
            .base
            .permissions()
            .and_then(|p| p.file_mode.as_deref())
        else {
            return;
        };
        match u32::from_str_radix(mode, 8) {
            Ok(bits) => {
                let permissions = std::fs::Permissions::from_mode(bits);
                if let Err(err) = fs::set_permissions(target, permissions).await {
                    warn!(path = %target.display(), error = %err, "failed to apply file mode");
                }
            }
            Err(_) => warn!(mode, "file mode is not a valid octal string"),
        }
    }

    #[cfg(not(unix))]
    async fn apply_file_mode(&self, _target: &Path) {}
}

impl Default for FileTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for FileTransport {
    fn protocol(&self) -> &str {
        "file"
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.base.is_connected() {
            return Ok(());
        }
        let root = self.root()?;
        if !fs::try_exists(&root)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?
        {
            return Err(TransportError::Connection(format!(
                "repository directory {} does not exist",
                root.display()
            )));
        }
        self.base.set_connected(true);
        self.base.fire_session_opened();
        debug!(root = %root.display(), "file session opened");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if self.base.is_connected() {
            self.base.set_connected(false);
            self.base.fire_session_closed();
        }
        Ok(())
    }

    async fn get(&mut self, resource: &str, destination: &Path) -> Result<(), TransportError> {
        let source = self.resolve(resource)?;
        let event = TransferEvent::get(resource, self.base.repository_id());
        self.base.fire_transfer_started(&event);
        match self.copy_in(&source, destination, resource, &event).await {
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
        let source = self.resolve(resource)?;
        let metadata = fs::metadata(&source)
            .await
            .map_err(|_| TransportError::transfer(resource, "resource not found"))?;
        let modified: DateTime<Utc> = metadata
            .modified()
            .map_err(|e| TransportError::transfer(resource, e))?
            .into();
        if modified <= timestamp {
            return Ok(false);
        }
        self.get(resource, destination).await?;
        Ok(true)
    }

    async fn put(&mut self, source: &Path, resource: &str) -> Result<(), TransportError> {
        let target = self.resolve(resource)?;
        let event = TransferEvent::put(resource, self.base.repository_id());
        self.base.fire_transfer_started(&event);

        let result = async {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| TransportError::transfer(resource, e))?;
            }
            fs::copy(source, &target)
                .await
                .map_err(|e| TransportError::transfer(resource, e))
        }
        .await;

        match result {
            Ok(total) => {
                self.apply_file_mode(&target).await;
                self.base.fire_transfer_progress(&event, total as usize);
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
        let path = self.resolve(resource)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| TransportError::transfer(resource, e))
    }

    async fn file_list(&mut self, directory: &str) -> Result<Vec<String>, TransportError> {
        let dir = self.resolve(directory)?;
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|_| TransportError::transfer(directory, "directory not found"))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| TransportError::transfer(directory, e))?
        {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| TransportError::transfer(directory, e))?;
            if file_type.is_dir() {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
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

#[derive(Default)]
pub struct FileTransportFactory;

impl FileTransportFactory {
    pub fn new() -> Self {
        Self
    }
}

impl TransportFactory for FileTransportFactory {
    fn create(&self) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(FileTransport::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_repository(root: &Path) -> Repository {
        Repository::new("local", &format!("file://{}", root.display())).unwrap()
    }

    #[tokio::test]
    async fn connect_fails_when_the_repository_directory_is_missing() {
        let mut transport = FileTransport::new();
        transport.set_repository(
            Repository::new("local", "file:///definitely/not/a/real/path").unwrap(),
        );
        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, TransportError::Connection(_)));
    }

    #[tokio::test]
    async fn get_and_put_round_trip_through_the_repository() {
        let repo_dir = tempfile::tempdir().unwrap();
        let work_dir = tempfile::tempdir().unwrap();

        let mut transport = FileTransport::new();
        transport
            .connect_to(file_repository(repo_dir.path()), None, None)
            .await
            .unwrap();

        let source = work_dir.path().join("artifact.txt");
        tokio::fs::write(&source, b"artifact body").await.unwrap();
        transport.put(&source, "lib/artifact.txt").await.unwrap();
        assert!(transport.resource_exists("lib/artifact.txt").await.unwrap());

        let fetched = work_dir.path().join("fetched.txt");
        transport.get("lib/artifact.txt", &fetched).await.unwrap();
        let body = tokio::fs::read_to_string(&fetched).await.unwrap();
        assert_eq!(body, "artifact body");
    }

    #[tokio::test]
    async fn get_of_a_missing_resource_is_a_transfer_error() {
        let repo_dir = tempfile::tempdir().unwrap();
        let work_dir = tempfile::tempdir().unwrap();

        let mut transport = FileTransport::new();
        transport
            .connect_to(file_repository(repo_dir.path()), None, None)
            .await
            .unwrap();

        let err = transport
            .get("nope.txt", &work_dir.path().join("nope.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Transfer { .. }));
    }

    #[tokio::test]
    async fn file_list_marks_directories_with_a_trailing_slash() {
        let repo_dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(repo_dir.path().join("sub")).await.unwrap();
        tokio::fs::write(repo_dir.path().join("a.txt"), b"a").await.unwrap();

        let mut transport = FileTransport::new();
        transport
            .connect_to(file_repository(repo_dir.path()), None, None)
            .await
            .unwrap();

        let listing = transport.file_list("").await.unwrap();
        assert_eq!(listing, vec!["a.txt".to_string(), "sub/".to_string()]);
    }

    #[tokio::test]
    async fn get_if_newer_respects_the_reference_timestamp() {
        let repo_dir = tempfile::tempdir().unwrap();
        let work_dir = tempfile::tempdir().unwrap();
        tokio::fs::write(repo_dir.path().join("a.txt"), b"a").await.unwrap();

        let mut transport = FileTransport::new();
        transport
            .connect_to(file_repository(repo_dir.path()), None, None)
            .await
            .unwrap();

        let destination = work_dir.path().join("a.txt");
        let epoch = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        assert!(transport
            .get_if_newer("a.txt", &destination, epoch)
            .await
            .unwrap());
        assert!(destination.exists());

        let future = Utc::now() + chrono::Duration::hours(1);
        assert!(!transport
            .get_if_newer("a.txt", &destination, future)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn put_directory_copies_the_whole_tree() {
        let repo_dir = tempfile::tempdir().unwrap();
        let work_dir = tempfile::tempdir().unwrap();
        let tree = work_dir.path().join("tree");
        tokio::fs::create_dir_all(tree.join("nested")).await.unwrap();
        tokio::fs::write(tree.join("top.txt"), b"top").await.unwrap();
        tokio::fs::write(tree.join("nested/deep.txt"), b"deep").await.unwrap();

        let mut transport = FileTransport::new();
        transport
            .connect_to(file_repository(repo_dir.path()), None, None)
            .await
            .unwrap();

        transport.put_directory(&tree, "drop").await.unwrap();
        assert!(repo_dir.path().join("drop/top.txt").exists());
        assert!(repo_dir.path().join("drop/nested/deep.txt").exists());
    }
}
