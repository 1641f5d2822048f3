//! Session manager: the startup session read, the auth listener and the
//! explicit auth actions.

use std::sync::Weak;

use shared::types::{NewProfile, User};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth_events::AuthSubscription;
use crate::backend::{Backend, Table};
use crate::board::{Board, BoardInner};
use crate::error::BoardError;
use crate::view::Notice;

pub const CONFIRM_EMAIL_NOTICE: &str =
    "Registration successful! Check your email to verify your account before signing in.";
pub const REGISTERED_NOTICE: &str = "Registration successful!";
pub const OTP_SENT_NOTICE: &str = "Check your email for a sign-in link";

/// User of the session the provider holds at startup. A failed read is
/// logged and treated as signed out.
pub(crate) async fn initial_user(backend: &dyn Backend) -> Option<User> {
    match backend.current_session().await {
        Ok(session) => session.map(|s| s.user),
        Err(e) => {
            error!("Error getting session: {}", e);
            None
        }
    }
}

/// Forward every auth event to the board until the view goes away.
///
/// The task only holds a weak reference, so it never keeps a dropped board
/// alive; the subscription is released when the task ends.
pub(crate) fn spawn_listener(
    board: Weak<BoardInner>,
    mut subscription: AuthSubscription,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = subscription.recv() => event,
            };

            let Some(event) = event else {
                debug!("Auth event source closed");
                break;
            };
            let Some(inner) = board.upgrade() else {
                break;
            };

            info!("Auth state changed: {}", event.name());
            Board { inner }.apply_session(event.user().cloned()).await;
        }
        debug!("Auth listener stopped");
    })
}

impl Board {
    /// Overwrite the local user and reload the feed if the identity changed.
    pub(crate) async fn apply_session(&self, user: Option<User>) {
        if !self.is_mounted() {
            return;
        }
        let changed = self.update(|s| s.session_changed(user)).await;
        if changed {
            let _ = self.refresh_feed().await;
        }
    }

    /// Show a failed action to the user; cancellations stay silent.
    async fn report(&self, action: &str, e: BoardError) -> BoardError {
        if matches!(e, BoardError::Cancelled) {
            debug!("{} cancelled", action);
            return e;
        }
        error!("{} failed: {}", action, e);
        let message = format!("Error: {}", e.user_message());
        self.set_notice(Notice::Error(message)).await;
        e
    }

    // -----------------------------------------------------------------------
    // Sign in
    // -----------------------------------------------------------------------

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), BoardError> {
        self.update(|s| {
            s.login_form.email = email.to_string();
            s.login_form.password = password.to_string();
        })
        .await;
        self.submit_login().await
    }

    /// Submit the login form as it currently stands.
    pub async fn submit_login(&self) -> Result<(), BoardError> {
        let form = self.with_state(|s| s.login_form.clone()).await;
        let credentials = match form.validate() {
            Ok(credentials) => credentials,
            Err(e) => return Err(self.report("Sign in", e.into()).await),
        };
        self.update(|s| s.login_form.clear_secret()).await;

        let backend = self.inner.backend.clone();
        match self
            .guarded(backend.sign_in_with_password(&credentials))
            .await
        {
            Ok(session) => {
                info!("Signed in as {}", session.user.id);
                self.update(|s| s.clear_notice()).await;
                self.apply_session(Some(session.user)).await;
                Ok(())
            }
            Err(e) => Err(self.report("Sign in", e).await),
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<(), BoardError> {
        self.update(|s| {
            s.register_form.email = email.to_string();
            s.register_form.password = password.to_string();
            s.register_form.username = username.to_string();
        })
        .await;
        self.submit_registration().await
    }

    /// Register the account, then create its profile row. A session is only
    /// applied when the provider returned one.
    pub async fn submit_registration(&self) -> Result<(), BoardError> {
        let form = self.with_state(|s| s.register_form.clone()).await;
        let request = match form.validate() {
            Ok(request) => request,
            Err(e) => return Err(self.report("Sign up", e.into()).await),
        };
        self.update(|s| s.register_form.clear_secret()).await;

        let backend = self.inner.backend.clone();
        let outcome = match self.guarded(backend.sign_up(&request.credentials)).await {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.report("Sign up", e).await),
        };

        let mut notice = if outcome.needs_confirmation() {
            Notice::Info(CONFIRM_EMAIL_NOTICE.to_string())
        } else {
            Notice::Info(REGISTERED_NOTICE.to_string())
        };

        if let Some(user) = &outcome.user {
            let profile = NewProfile {
                id: user.id.clone(),
                username: request.username.clone(),
            };
            let row = serde_json::to_value(&profile)?;
            match self.guarded(backend.insert(Table::Profiles, vec![row])).await {
                Ok(_) => info!("Profile created for {}", user.id),
                Err(BoardError::Cancelled) => return Err(BoardError::Cancelled),
                Err(e) => {
                    error!("Error creating profile for {}: {}", user.id, e);
                    notice = Notice::Error(format!(
                        "Registered, but the profile could not be saved: {}",
                        e.user_message()
                    ));
                }
            }
        } else {
            warn!("Sign-up returned no user");
        }

        self.update(|s| {
            s.register_form = Default::default();
            s.set_notice(notice);
        })
        .await;

        if let Some(session) = outcome.session {
            self.apply_session(Some(session.user)).await;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // One-time code
    // -----------------------------------------------------------------------

    pub async fn sign_in_with_otp(&self, email: &str) -> Result<(), BoardError> {
        self.update(|s| s.otp_form.email = email.to_string()).await;
        self.submit_otp().await
    }

    /// Request a sign-in link. The session arrives later through the auth
    /// listener once the link is followed.
    pub async fn submit_otp(&self) -> Result<(), BoardError> {
        let form = self.with_state(|s| s.otp_form.clone()).await;
        let email = match form.validate() {
            Ok(email) => email,
            Err(e) => return Err(self.report("Sign-in link", e.into()).await),
        };

        let backend = self.inner.backend.clone();
        match self.guarded(backend.sign_in_with_otp(&email)).await {
            Ok(()) => {
                info!("Sign-in link sent to {}", email);
                self.set_notice(Notice::Info(OTP_SENT_NOTICE.to_string()))
                    .await;
                Ok(())
            }
            Err(e) => Err(self.report("Sign-in link", e).await),
        }
    }

    // -----------------------------------------------------------------------
    // Sign out
    // -----------------------------------------------------------------------

    /// Sign out. Local state is cleared even when the provider call fails.
    pub async fn sign_out(&self) -> Result<(), BoardError> {
        let backend = self.inner.backend.clone();
        let result = self.guarded(backend.sign_out()).await;
        if let Err(e) = &result {
            error!("Error signing out: {}", e);
        }
        self.apply_session(None).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FailPoint, MemoryBackend};
    use crate::view::Tab;
    use shared::types::FeedConfig;
    use std::sync::Arc;

    async fn mounted(backend: &Arc<MemoryBackend>) -> Board {
        Board::mount(backend.clone(), FeedConfig::default()).await
    }

    #[tokio::test]
    async fn test_initial_session_is_picked_up() {
        let backend = Arc::new(MemoryBackend::new());
        let user = backend.add_user("a@b.c", "pw");
        backend.set_session(&user);

        let board = mounted(&backend).await;
        assert_eq!(board.snapshot().await.user.unwrap().id, user.id);
    }

    #[tokio::test]
    async fn test_session_read_failure_leaves_user_signed_out() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail(FailPoint::CurrentSession, "auth down");

        let board = mounted(&backend).await;
        assert!(board.snapshot().await.user.is_none());
    }

    #[tokio::test]
    async fn test_sign_in_sets_user_and_clears_password() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_user("a@b.c", "pw");
        let board = mounted(&backend).await;

        board.sign_in("a@b.c", "pw").await.unwrap();

        let state = board.snapshot().await;
        assert_eq!(state.user.unwrap().email.as_deref(), Some("a@b.c"));
        assert!(state.login_form.password.is_empty());
        assert!(state.notice.is_none());
    }

    #[tokio::test]
    async fn test_bad_credentials_show_provider_message() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_user("a@b.c", "pw");
        let board = mounted(&backend).await;

        assert!(board.sign_in("a@b.c", "nope").await.is_err());

        let state = board.snapshot().await;
        assert!(state.user.is_none());
        assert_eq!(
            state.notice,
            Some(Notice::Error("Error: Invalid login credentials".into()))
        );
    }

    #[tokio::test]
    async fn test_empty_email_never_reaches_provider() {
        let backend = Arc::new(MemoryBackend::new());
        let board = mounted(&backend).await;

        let err = board.sign_in_with_otp("  ").await.unwrap_err();
        assert!(matches!(err, BoardError::Form(_)));
        assert!(backend.otp_requests().is_empty());
    }

    #[tokio::test]
    async fn test_otp_request_sets_notice() {
        let backend = Arc::new(MemoryBackend::new());
        let board = mounted(&backend).await;

        board.sign_in_with_otp("a@b.c").await.unwrap();
        assert_eq!(backend.otp_requests(), vec!["a@b.c".to_string()]);
        assert_eq!(
            board.snapshot().await.notice,
            Some(Notice::Info(OTP_SENT_NOTICE.into()))
        );
    }

    #[tokio::test]
    async fn test_sign_up_without_confirmation_signs_in() {
        let backend = Arc::new(MemoryBackend::without_confirmation());
        let board = mounted(&backend).await;

        board.sign_up("a@b.c", "pw", "Bob").await.unwrap();

        let state = board.snapshot().await;
        let user = state.user.unwrap();
        assert_eq!(backend.inserted(Table::Profiles), vec![serde_json::json!({
            "id": user.id,
            "username": "Bob"
        })]);
        assert_eq!(state.register_form, Default::default());
    }

    #[tokio::test]
    async fn test_profile_failure_still_completes_registration() {
        let backend = Arc::new(MemoryBackend::without_confirmation());
        backend.fail(FailPoint::Insert(Table::Profiles), "profiles down");
        let board = mounted(&backend).await;

        board.sign_up("a@b.c", "pw", "Bob").await.unwrap();

        let state = board.snapshot().await;
        assert!(state.user.is_some());
        assert!(state.notice.unwrap().is_error());
    }

    #[tokio::test]
    async fn test_sign_out_clears_user_even_when_provider_fails() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_user("a@b.c", "pw");
        let board = mounted(&backend).await;
        board.sign_in("a@b.c", "pw").await.unwrap();
        board.select_tab(Tab::Publish).await;

        backend.fail(FailPoint::SignOut, "revoke failed");
        assert!(board.sign_out().await.is_err());

        let state = board.snapshot().await;
        assert!(state.user.is_none());
        assert_eq!(state.tab, Tab::Month);
    }
}
