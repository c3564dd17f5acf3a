mod autosave;
mod categories;
mod document;
mod errors;
mod files;
mod models;
mod store;

pub use autosave::{AutoSaver, DEFAULT_DEBOUNCE};
pub use categories::{
    ensure_categories, group_by_home_category, group_by_shop_category, move_category_down,
    move_category_up, unique_home_categories, unique_shop_categories, UNCATEGORIZED,
};
pub use document::{default_data, deserialize, serialize};
pub use errors::{AppError, AppResult};
pub use files::{
    AccessMode, FileGrant, FileHandle, FileService, LocalFileHandle, PermissionState,
};
pub use models::{
    CategoryGroup, Item, ItemUpdate, NewItem, NewShop, SaveStatus, Shop, ShopAvailability,
    ShopUpdate, ShoppingListData,
};
pub use store::ShoppingStore;

use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

struct ActiveFile {
    handle: Arc<LocalFileHandle>,
    autosaver: AutoSaver,
}

/// Composition root. Owns the store, the file boundary, and the auto-saver
/// attached to the currently open file; the presentation layer talks to
/// this and re-reads the store after each mutation.
pub struct ShoppingApp {
    store: Arc<ShoppingStore>,
    files: FileService,
    debounce: Duration,
    active: Mutex<Option<ActiveFile>>,
}

impl Default for ShoppingApp {
    fn default() -> Self {
        Self::new()
    }
}

impl ShoppingApp {
    pub fn new() -> Self {
        Self::with_debounce(DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            store: Arc::new(ShoppingStore::new()),
            files: FileService::new(),
            debounce,
            active: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<ShoppingStore> {
        &self.store
    }

    /// Open an existing list file, load it, and start auto-saving to it.
    /// A document that fails validation leaves the current state untouched.
    pub async fn open_file(&self, path: impl AsRef<Path>) -> AppResult<()> {
        let handle = self.files.open(path).await?;
        let text = handle.read().await?;
        let data = document::deserialize(&text)?;
        self.store.load_data(data);
        tracing::info!(file = %handle.name(), "list file opened");
        self.attach(handle).await;
        Ok(())
    }

    /// Create a fresh list file with an empty aggregate and attach to it.
    pub async fn create_file(&self, path: impl AsRef<Path>) -> AppResult<()> {
        let handle = self.files.create(path).await?;
        let text = document::serialize(&document::default_data())?;
        handle.write(&text).await?;
        self.store.load_data(document::default_data());
        tracing::info!(file = %handle.name(), "list file created");
        self.attach(handle).await;
        Ok(())
    }

    async fn attach(&self, handle: Arc<LocalFileHandle>) {
        self.files.remember(&handle);
        let autosaver = AutoSaver::spawn(self.store.clone(), handle.clone(), self.debounce);
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            previous.autosaver.shutdown();
        }
        *active = Some(ActiveFile { handle, autosaver });
    }

    /// Write immediately, skipping the debounce. Also the manual retry
    /// path after an auto-save error.
    pub async fn save_now(&self) -> AppResult<()> {
        let active = self.active.lock().await;
        let Some(file) = active.as_ref() else {
            return Err(AppError::NotFound("no file is open".to_string()));
        };
        autosave::save_once(&self.store, file.handle.as_ref()).await
    }

    /// Detach from the current file, dropping any pending auto-save.
    pub async fn close_file(&self) {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            previous.autosaver.shutdown();
        }
        self.files.clear_stored();
    }

    pub async fn file_name(&self) -> Option<String> {
        let active = self.active.lock().await;
        active.as_ref().map(|file| file.handle.name())
    }
}

/// File logging in the host's data directory, daily rotation.
pub fn init_logging(app_data_dir: &Path) -> Result<(), String> {
    let log_dir = app_data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "shopping-list.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
