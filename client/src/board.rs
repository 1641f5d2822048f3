//! The board controller: one backend, one mounted view.

use std::future::Future;
use std::sync::{Arc, Mutex};

use shared::types::FeedConfig;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::error::BoardError;
use crate::session;
use crate::view::{BoardState, Notice, Tab};

pub(crate) struct BoardInner {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) state: RwLock<BoardState>,
    pub(crate) feed: FeedConfig,
    /// Lives as long as the view; every remote call runs under it.
    pub(crate) cancel: CancellationToken,
    changes: watch::Sender<u64>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for BoardInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Handle to a mounted board. Clones share the same view.
#[derive(Clone)]
pub struct Board {
    pub(crate) inner: Arc<BoardInner>,
}

impl Board {
    /// Subscribe to auth changes, read the current session and load the
    /// feed. Failures along the way are logged; the board still mounts.
    pub async fn mount(backend: Arc<dyn Backend>, feed: FeedConfig) -> Board {
        // Subscribe before reading the session so no change in between is
        // missed.
        let subscription = backend.subscribe_auth_changes();

        let (changes, _) = watch::channel(0);
        let board = Board {
            inner: Arc::new(BoardInner {
                backend,
                state: RwLock::new(BoardState::new()),
                feed,
                cancel: CancellationToken::new(),
                changes,
                listener: Mutex::new(None),
            }),
        };

        let user = session::initial_user(board.inner.backend.as_ref()).await;
        match &user {
            Some(user) => info!("Mounted with user {}", user.id),
            None => info!("Mounted without a session"),
        }
        board.update(|s| s.session_changed(user)).await;

        let handle = session::spawn_listener(
            Arc::downgrade(&board.inner),
            subscription,
            board.inner.cancel.clone(),
        );
        *board.listener() = Some(handle);

        let _ = board.refresh_feed().await;
        board
    }

    /// Cancel outstanding work and release the auth subscription. Waits for
    /// the listener task to finish.
    pub async fn unmount(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        info!("Unmounting board");
        self.inner.cancel.cancel();

        let handle = self.listener().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Auth listener ended abnormally: {}", e);
            }
        }
    }

    pub fn is_mounted(&self) -> bool {
        !self.inner.cancel.is_cancelled()
    }

    fn listener(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    // -----------------------------------------------------------------------
    // State access
    // -----------------------------------------------------------------------

    pub async fn snapshot(&self) -> BoardState {
        self.inner.state.read().await.clone()
    }

    pub async fn with_state<R>(&self, f: impl FnOnce(&BoardState) -> R) -> R {
        f(&*self.inner.state.read().await)
    }

    /// Apply one transition under the write lock and notify watchers.
    pub async fn update<R>(&self, f: impl FnOnce(&mut BoardState) -> R) -> R {
        let result = {
            let mut state = self.inner.state.write().await;
            f(&mut state)
        };
        self.inner.changes.send_modify(|n| *n = n.wrapping_add(1));
        result
    }

    /// Change counter, bumped after every state transition.
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    pub async fn select_tab(&self, tab: Tab) -> bool {
        let selected = self.update(|s| s.select_tab(tab)).await;
        if !selected {
            debug!("Tab {:?} is not available", tab);
        }
        selected
    }

    pub async fn edit_draft(&self, text: impl Into<String>) {
        let text = text.into();
        self.update(|s| s.draft_edited(text)).await;
    }

    pub async fn set_notice(&self, notice: Notice) {
        self.update(|s| s.set_notice(notice)).await;
    }

    pub async fn clear_notice(&self) {
        self.update(|s| s.clear_notice()).await;
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    /// Run a remote call under the view's lifetime. Resolves to
    /// [`BoardError::Cancelled`] when the board is unmounted first, and also
    /// when it is unmounted while the result is in flight.
    pub(crate) async fn guarded<T, F>(&self, fut: F) -> Result<T, BoardError>
    where
        F: Future<Output = Result<T, BoardError>>,
    {
        let token = self.inner.cancel.child_token();
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(BoardError::Cancelled),
            result = fut => result,
        };
        if token.is_cancelled() {
            return Err(BoardError::Cancelled);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, Table};
    use serde_json::json;
    use std::time::Duration;

    fn feed_config() -> FeedConfig {
        FeedConfig::default()
    }

    #[tokio::test]
    async fn test_mount_loads_feed_and_registers_listener() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(Table::Jokes, vec![json!({"id": "1", "content": "A"})]);

        let board = Board::mount(backend.clone(), feed_config()).await;

        assert_eq!(board.snapshot().await.jokes.len(), 1);
        assert_eq!(backend.listener_count(), 1);
        assert!(board.is_mounted());
    }

    #[tokio::test]
    async fn test_unmount_is_idempotent_and_releases_listener() {
        let backend = Arc::new(MemoryBackend::new());
        let board = Board::mount(backend.clone(), feed_config()).await;

        board.unmount().await;
        board.unmount().await;

        assert!(!board.is_mounted());
        assert_eq!(backend.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_dropping_last_handle_releases_listener() {
        let backend = Arc::new(MemoryBackend::new());
        let board = Board::mount(backend.clone(), feed_config()).await;
        drop(board);

        for _ in 0..50 {
            if backend.listener_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(backend.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_update_bumps_change_counter() {
        let backend = Arc::new(MemoryBackend::new());
        let board = Board::mount(backend, feed_config()).await;
        let mut changes = board.subscribe_changes();
        let before = *changes.borrow_and_update();

        board.edit_draft("hi").await;

        assert!(changes.has_changed().unwrap());
        assert!(*changes.borrow() > before);
        assert_eq!(board.snapshot().await.draft, "hi");
    }

    #[tokio::test]
    async fn test_guarded_after_unmount_is_cancelled() {
        let backend = Arc::new(MemoryBackend::new());
        let board = Board::mount(backend, feed_config()).await;
        board.unmount().await;

        let result = board.guarded(async { Ok::<_, BoardError>(1) }).await;
        assert!(matches!(result, Err(BoardError::Cancelled)));
    }
}
