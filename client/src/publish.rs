use shared::types::NewJoke;
use tracing::{debug, error, info};

use crate::backend::Table;
use crate::board::Board;
use crate::error::BoardError;
use crate::view::Notice;

pub const SIGN_IN_TO_PUBLISH: &str = "You must sign in to publish a joke";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// One row was inserted; `id` is the stored id when the backend echoed it.
    Published { id: Option<String> },
    /// Nothing to publish; no insert, no notice.
    EmptyDraft,
    /// Refused locally with a notice.
    NotSignedIn,
}

impl Board {
    /// Publish the current draft as the signed-in user.
    ///
    /// On success the draft is cleared and the feed reloaded. On failure the
    /// provider's message becomes a notice and the draft is kept.
    pub async fn publish(&self) -> Result<PublishOutcome, BoardError> {
        let (draft, user) = self
            .with_state(|s| (s.draft.clone(), s.user.clone()))
            .await;

        if draft.trim().is_empty() {
            debug!("Publish skipped: empty draft");
            return Ok(PublishOutcome::EmptyDraft);
        }

        let Some(user) = user else {
            self.set_notice(Notice::Error(SIGN_IN_TO_PUBLISH.to_string()))
                .await;
            return Ok(PublishOutcome::NotSignedIn);
        };

        let row = serde_json::to_value(NewJoke::new(draft.clone(), user.id.clone()))?;
        info!("Publishing joke for {} ({} bytes)", user.id, draft.len());

        let backend = self.inner.backend.clone();
        let stored = match self.guarded(backend.insert(Table::Jokes, vec![row])).await {
            Ok(stored) => stored,
            Err(BoardError::Cancelled) => return Err(BoardError::Cancelled),
            Err(e) => {
                error!("Error publishing joke: {}", e);
                self.set_notice(Notice::Error(format!("Error: {}", e.user_message())))
                    .await;
                return Err(e);
            }
        };

        let id = stored
            .first()
            .and_then(|row| row.get("id"))
            .map(|id| match id {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            });

        self.update(|s| s.publish_succeeded(&draft)).await;
        let _ = self.refresh_feed().await;

        Ok(PublishOutcome::Published { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FailPoint, MemoryBackend};
    use shared::types::FeedConfig;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_whitespace_draft_is_empty() {
        let backend = Arc::new(MemoryBackend::new());
        let user = backend.add_user("a@b.c", "pw");
        backend.set_session(&user);
        let board = Board::mount(backend.clone(), FeedConfig::default()).await;

        board.edit_draft("   \n").await;
        assert_eq!(board.publish().await.unwrap(), PublishOutcome::EmptyDraft);
        assert!(backend.inserted(Table::Jokes).is_empty());
        assert_eq!(board.snapshot().await.draft, "   \n");
    }

    #[tokio::test]
    async fn test_signed_out_publish_sets_notice() {
        let backend = Arc::new(MemoryBackend::new());
        let board = Board::mount(backend.clone(), FeedConfig::default()).await;

        board.edit_draft("knock knock").await;
        assert_eq!(board.publish().await.unwrap(), PublishOutcome::NotSignedIn);

        let state = board.snapshot().await;
        assert_eq!(state.notice, Some(Notice::Error(SIGN_IN_TO_PUBLISH.into())));
        assert_eq!(state.draft, "knock knock");
        assert!(backend.inserted(Table::Jokes).is_empty());
    }

    #[tokio::test]
    async fn test_published_joke_shows_up_in_feed() {
        let backend = Arc::new(MemoryBackend::new());
        let user = backend.add_user("a@b.c", "pw");
        backend.set_session(&user);
        let board = Board::mount(backend.clone(), FeedConfig::default()).await;

        board.edit_draft("knock knock").await;
        let outcome = board.publish().await.unwrap();
        assert!(matches!(outcome, PublishOutcome::Published { id: Some(_) }));

        let state = board.snapshot().await;
        assert!(state.draft.is_empty());
        assert_eq!(state.jokes.len(), 1);
        assert_eq!(state.jokes[0].content, "knock knock");
        assert!(!state.jokes[0].is_joke_of_the_month);
    }

    #[tokio::test]
    async fn test_insert_failure_keeps_draft() {
        let backend = Arc::new(MemoryBackend::new());
        let user = backend.add_user("a@b.c", "pw");
        backend.set_session(&user);
        backend.fail(FailPoint::Insert(Table::Jokes), "permission denied");
        let board = Board::mount(backend.clone(), FeedConfig::default()).await;

        board.edit_draft("knock knock").await;
        assert!(board.publish().await.is_err());

        let state = board.snapshot().await;
        assert_eq!(state.draft, "knock knock");
        assert_eq!(
            state.notice,
            Some(Notice::Error("Error: permission denied".into()))
        );
    }
}
