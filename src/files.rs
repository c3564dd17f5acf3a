use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    Read,
    ReadWrite,
}

impl AccessMode {
    fn covers(self, requested: AccessMode) -> bool {
        match self {
            Self::ReadWrite => true,
            Self::Read => requested == Self::Read,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionState {
    Granted,
    Denied,
}

/// Session-scoped capability to touch one file. Permissions are not durable
/// across sessions, so grants carry no persistence beyond this process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileGrant {
    pub id: String,
    pub path: String,
    pub mode: AccessMode,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Capability-style handle to the backing file. The store never touches
/// storage directly; everything goes through this seam, which keeps the
/// in-memory state intact when access fails.
#[async_trait]
pub trait FileHandle: Send + Sync {
    fn name(&self) -> String;
    async fn query_permission(&self, mode: AccessMode) -> PermissionState;
    async fn request_permission(&self, mode: AccessMode) -> AppResult<PermissionState>;
    async fn read(&self) -> AppResult<String>;
    async fn write(&self, contents: &str) -> AppResult<()>;
}

/// File handle backed by a local path.
#[derive(Debug)]
pub struct LocalFileHandle {
    path: PathBuf,
    grant: Mutex<FileGrant>,
}

impl LocalFileHandle {
    pub fn new(path: impl Into<PathBuf>, mode: AccessMode) -> Self {
        let path = path.into();
        let grant = FileGrant {
            id: Uuid::new_v4().to_string(),
            path: path.display().to_string(),
            mode,
            granted_at: Utc::now(),
            revoked_at: None,
        };
        Self {
            path,
            grant: Mutex::new(grant),
        }
    }

    pub fn grant(&self) -> FileGrant {
        self.lock_grant().clone()
    }

    /// Kill the capability. Subsequent reads and writes fail with a
    /// permission error until a fresh handle is issued.
    pub fn revoke(&self) {
        self.lock_grant().revoked_at = Some(Utc::now());
    }

    fn lock_grant(&self) -> std::sync::MutexGuard<'_, FileGrant> {
        self.grant.lock().expect("file grant lock")
    }

    fn check(&self, mode: AccessMode) -> AppResult<()> {
        let grant = self.lock_grant();
        if grant.revoked_at.is_some() || !grant.mode.covers(mode) {
            return Err(AppError::Permission(format!(
                "access to {} was denied",
                grant.path
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl FileHandle for LocalFileHandle {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    async fn query_permission(&self, mode: AccessMode) -> PermissionState {
        if self.check(mode).is_ok() {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        }
    }

    async fn request_permission(&self, mode: AccessMode) -> AppResult<PermissionState> {
        let mut grant = self.lock_grant();
        if grant.revoked_at.is_some() {
            return Ok(PermissionState::Denied);
        }
        if !grant.mode.covers(mode) {
            grant.mode = mode;
        }
        Ok(PermissionState::Granted)
    }

    async fn read(&self) -> AppResult<String> {
        self.check(AccessMode::Read)?;
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }

    async fn write(&self, contents: &str) -> AppResult<()> {
        self.check(AccessMode::ReadWrite)?;
        tokio::fs::write(&self.path, contents).await?;
        Ok(())
    }
}

/// Issues handles and remembers the most recent one for the session,
/// standing in for the host's native picker at the core's boundary.
#[derive(Default)]
pub struct FileService {
    stored: Mutex<Option<Arc<LocalFileHandle>>>,
}

impl FileService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a read-write handle for an existing file.
    pub async fn open(&self, path: impl AsRef<Path>) -> AppResult<Arc<LocalFileHandle>> {
        let path = path.as_ref();
        if tokio::fs::metadata(path).await.is_err() {
            return Err(AppError::NotFound(format!(
                "no such file: {}",
                path.display()
            )));
        }
        Ok(Arc::new(LocalFileHandle::new(path, AccessMode::ReadWrite)))
    }

    /// Create (or truncate) a file and issue a read-write handle for it.
    pub async fn create(&self, path: impl AsRef<Path>) -> AppResult<Arc<LocalFileHandle>> {
        let path = path.as_ref();
        tokio::fs::write(path, "").await?;
        Ok(Arc::new(LocalFileHandle::new(path, AccessMode::ReadWrite)))
    }

    pub fn remember(&self, handle: &Arc<LocalFileHandle>) {
        *self.stored.lock().expect("stored handle lock") = Some(Arc::clone(handle));
    }

    pub fn stored_handle(&self) -> Option<Arc<LocalFileHandle>> {
        self.stored.lock().expect("stored handle lock").clone()
    }

    pub fn clear_stored(&self) {
        self.stored.lock().expect("stored handle lock").take();
    }
}
