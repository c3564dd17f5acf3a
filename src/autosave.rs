use crate::document;
use crate::errors::AppResult;
use crate::files::FileHandle;
use crate::models::SaveStatus;
use crate::store::ShoppingStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

/// Debounced background saver. One task per attached file; edits restart
/// the quiet period so bursts coalesce into a single write, and at most one
/// write is ever in flight.
pub struct AutoSaver {
    task: JoinHandle<()>,
}

impl AutoSaver {
    pub fn spawn(
        store: Arc<ShoppingStore>,
        handle: Arc<dyn FileHandle>,
        debounce: Duration,
    ) -> Self {
        let task = tokio::spawn(run_loop(store, handle, debounce));
        Self { task }
    }

    /// Stop the saver, dropping any pending debounce timer. An in-flight
    /// write may still complete on the runtime; it is never interrupted
    /// mid-buffer by new saves, only superseded by later ones.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_loop(store: Arc<ShoppingStore>, handle: Arc<dyn FileHandle>, debounce: Duration) {
    let mut status_rx = store.status_watch();
    let mut revision_rx = store.subscribe();
    loop {
        // Park until an edit dirties the state.
        while *status_rx.borrow_and_update() != SaveStatus::Unsaved {
            if status_rx.changed().await.is_err() {
                return;
            }
        }

        // Quiet period; every further edit restarts it.
        revision_rx.borrow_and_update();
        loop {
            tokio::select! {
                _ = tokio::time::sleep(debounce) => break,
                changed = revision_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }

        // Outcome lands in the save status; nothing to surface here.
        let _ = save_once(&store, handle.as_ref()).await;
    }
}

/// One save attempt: snapshot, serialize, write. Drives the status through
/// `saving` to `saved` or `error`; in-memory state is never rolled back.
/// Edits racing the write leave the state `unsaved` so the next cycle picks
/// them up (last write wins).
pub(crate) async fn save_once(store: &ShoppingStore, handle: &dyn FileHandle) -> AppResult<()> {
    let revision = store.revision();
    let snapshot = store.snapshot();
    store.set_save_status(SaveStatus::Saving);

    let outcome = match document::serialize(&snapshot) {
        Ok(text) => handle.write(&text).await,
        Err(error) => Err(error),
    };

    match outcome {
        Ok(()) => {
            store.mark_saved(revision);
            tracing::debug!(file = %handle.name(), revision, "auto-save complete");
            Ok(())
        }
        Err(error) => {
            tracing::warn!(file = %handle.name(), %error, "auto-save failed");
            store.set_save_status(SaveStatus::Error);
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{save_once, AutoSaver};
    use crate::document;
    use crate::errors::{AppError, AppResult};
    use crate::files::{AccessMode, FileHandle, FileService, PermissionState};
    use crate::models::{NewItem, SaveStatus};
    use crate::store::ShoppingStore;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::time::{timeout, Duration};

    struct BrokenHandle;

    #[async_trait]
    impl FileHandle for BrokenHandle {
        fn name(&self) -> String {
            "broken.yaml".to_string()
        }

        async fn query_permission(&self, _mode: AccessMode) -> PermissionState {
            PermissionState::Granted
        }

        async fn request_permission(&self, _mode: AccessMode) -> AppResult<PermissionState> {
            Ok(PermissionState::Granted)
        }

        async fn read(&self) -> AppResult<String> {
            Err(AppError::Io("disk gone".to_string()))
        }

        async fn write(&self, _contents: &str) -> AppResult<()> {
            Err(AppError::Io("disk gone".to_string()))
        }
    }

    fn new_item(name: &str) -> NewItem {
        NewItem {
            name: name.to_string(),
            home_category: "Pantry".to_string(),
            notes: None,
            shop_availability: Vec::new(),
        }
    }

    async fn wait_for_status(store: &ShoppingStore, wanted: SaveStatus) {
        let mut status_rx = store.status_watch();
        timeout(Duration::from_secs(5), async {
            while *status_rx.borrow_and_update() != wanted {
                status_rx.changed().await.expect("store alive");
            }
        })
        .await
        .expect("status reached in time");
    }

    #[tokio::test]
    async fn bursts_coalesce_into_one_save() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = FileService::new();
        let handle = service
            .create(dir.path().join("list.yaml"))
            .await
            .expect("create");

        let store = Arc::new(ShoppingStore::new());
        let saver = AutoSaver::spawn(
            store.clone(),
            handle.clone(),
            Duration::from_millis(25),
        );

        for name in ["Milk", "Rice", "Jam"] {
            store.add_item(new_item(name)).expect("added");
        }
        wait_for_status(&store, SaveStatus::Saved).await;

        let text = handle.read().await.expect("read back");
        let data = document::deserialize(&text).expect("parse saved file");
        assert_eq!(data.items.len(), 3);

        saver.shutdown();
    }

    #[tokio::test]
    async fn write_failure_lands_in_error_status_and_keeps_state() {
        let store = Arc::new(ShoppingStore::new());
        let saver = AutoSaver::spawn(
            store.clone(),
            Arc::new(BrokenHandle),
            Duration::from_millis(10),
        );

        store.add_item(new_item("Milk")).expect("added");
        wait_for_status(&store, SaveStatus::Error).await;
        assert_eq!(store.items().len(), 1);

        saver.shutdown();
    }

    #[tokio::test]
    async fn error_is_not_retried_until_the_next_edit() {
        let store = Arc::new(ShoppingStore::new());
        let saver = AutoSaver::spawn(
            store.clone(),
            Arc::new(BrokenHandle),
            Duration::from_millis(10),
        );

        store.add_item(new_item("Milk")).expect("added");
        wait_for_status(&store, SaveStatus::Error).await;

        // Stays in error until a fresh edit restarts the cycle.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.save_status(), SaveStatus::Error);

        store.add_item(new_item("Rice")).expect("added");
        wait_for_status(&store, SaveStatus::Error).await;

        saver.shutdown();
    }

    #[tokio::test]
    async fn shutdown_clears_the_pending_save() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = FileService::new();
        let handle = service
            .create(dir.path().join("list.yaml"))
            .await
            .expect("create");
        handle.write("sentinel").await.expect("seed");

        let store = Arc::new(ShoppingStore::new());
        let saver = AutoSaver::spawn(
            store.clone(),
            handle.clone(),
            Duration::from_secs(60),
        );

        store.add_item(new_item("Milk")).expect("added");
        saver.shutdown();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.read().await.expect("read"), "sentinel");
        assert_eq!(store.save_status(), SaveStatus::Unsaved);
    }

    #[tokio::test]
    async fn manual_save_succeeds_without_a_debounce_wait() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = FileService::new();
        let handle = service
            .create(dir.path().join("list.yaml"))
            .await
            .expect("create");

        let store = ShoppingStore::new();
        store.add_item(new_item("Milk")).expect("added");
        save_once(&store, handle.as_ref()).await.expect("save");

        assert_eq!(store.save_status(), SaveStatus::Saved);
        let data =
            document::deserialize(&handle.read().await.expect("read")).expect("parse");
        assert_eq!(data.items.len(), 1);
    }
}
