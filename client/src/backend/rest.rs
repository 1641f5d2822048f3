//! [`Backend`] over the hosted service's HTTP APIs: the auth API under
//! `/auth/v1` and the row API under `/rest/v1`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use shared::types::{
    AuthEvent, BackendConfig, ErrorResponse, PasswordCredentials, Session, SignUpOutcome, User,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::{Backend, Query, Table};
use crate::auth_events::{AuthEvents, AuthSubscription};
use crate::error::BoardError;

/// Access tokens this close to expiry are refreshed before use.
const EXPIRY_MARGIN: Duration = Duration::from_secs(10);

/// A session plus the instant its access token stops being accepted.
struct HeldSession {
    session: Session,
    expires_at: Option<Instant>,
}

impl HeldSession {
    fn new(session: Session) -> Self {
        let expires_at = session
            .expires_in
            .and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs)));
        Self {
            session,
            expires_at,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| Instant::now() + EXPIRY_MARGIN >= at)
    }
}

pub struct RestBackend {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    /// The provider session; in memory only, never persisted.
    session: RwLock<Option<HeldSession>>,
    /// Serialises refresh grants so concurrent requests share one refresh.
    refresh_lock: Mutex<()>,
    events: AuthEvents,
}

impl RestBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BoardError> {
        let anon_key = config
            .resolved_anon_key()
            .ok_or_else(|| BoardError::Config("anon key is not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        info!("REST backend targeting {}", config.base_url());

        Ok(Self::with_client(client, config.base_url(), anon_key))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, anon_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
            session: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            events: AuthEvents::new(),
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn rest_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.as_str())
    }

    /// User access token when signed in, the anon key otherwise. An expired
    /// token is refreshed first; if that fails the request goes out anonymous.
    async fn bearer(&self) -> String {
        let (token, expired) = match self.session.read().await.as_ref() {
            Some(held) => (held.session.access_token.clone(), held.is_expired()),
            None => return self.anon_key.clone(),
        };
        if !expired {
            return token;
        }

        debug!("Access token expired, refreshing before request");
        self.refresh_session(&token)
            .await
            .unwrap_or_else(|_| self.anon_key.clone())
    }

    /// Send a request built for the current bearer. A user token rejected
    /// with 401 is refreshed and the request retried once.
    async fn send_authorized<F>(&self, build: F) -> Result<Response, BoardError>
    where
        F: Fn(&str) -> RequestBuilder + Send + Sync,
    {
        let bearer = self.bearer().await;
        let response = build(&bearer).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED || bearer == self.anon_key {
            return Ok(response);
        }

        warn!("Access token rejected, refreshing session");
        let bearer = self
            .refresh_session(&bearer)
            .await
            .unwrap_or_else(|_| self.anon_key.clone());
        Ok(build(&bearer).send().await?)
    }

    /// Exchange the refresh token for a new session and return its access
    /// token. On failure the session is dropped and `SignedOut` emitted.
    async fn refresh_session(&self, stale_token: &str) -> Result<String, BoardError> {
        let _guard = self.refresh_lock.lock().await;

        let refresh_token = match self.session.read().await.as_ref() {
            None => return Err(BoardError::provider(401, "Session expired")),
            // Another request already refreshed while we waited.
            Some(held) if held.session.access_token != stale_token => {
                return Ok(held.session.access_token.clone());
            }
            Some(held) => held.session.refresh_token.clone(),
        };

        let Some(refresh_token) = refresh_token else {
            warn!("Session expired without a refresh token");
            self.expire_session().await;
            return Err(BoardError::provider(401, "Session expired"));
        };

        info!("Refreshing access token");
        let refreshed: Result<Session, BoardError> = async {
            let response = self
                .request(
                    Method::POST,
                    self.auth_url("token?grant_type=refresh_token"),
                    &self.anon_key,
                )
                .json(&json!({ "refresh_token": refresh_token }))
                .send()
                .await?;
            read_json::<Session>(response).await
        }
        .await;

        match refreshed {
            Ok(session) => {
                let token = session.access_token.clone();
                self.store_session(session, AuthEvent::TokenRefreshed)
                    .await;
                Ok(token)
            }
            Err(e) => {
                error!("Token refresh failed: {}", e);
                self.expire_session().await;
                Err(e)
            }
        }
    }

    async fn expire_session(&self) {
        if let Some(held) = self.session.write().await.take() {
            info!("Session for {} expired, signing out", held.session);
            self.events.emit(AuthEvent::SignedOut);
        }
    }

    fn request(&self, method: Method, url: String, bearer: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn store_session(&self, session: Session, event: fn(Session) -> AuthEvent) {
        info!("Session established for {}", session);
        *self.session.write().await = Some(HeldSession::new(session.clone()));
        self.events.emit(event(session));
    }
}

// ---------------------------------------------------------------------------
// Response handling
// ---------------------------------------------------------------------------

/// Map a non-success response to [`BoardError::Provider`] using the
/// provider's error envelope.
async fn check_status(response: Response) -> Result<Response, BoardError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    let envelope: ErrorResponse = serde_json::from_slice(&body).unwrap_or_default();
    let message = envelope.message().unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    });

    warn!("Provider returned {}: {}", status.as_u16(), message);

    Err(BoardError::Provider {
        status: status.as_u16(),
        code: envelope.code(),
        message,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, BoardError> {
    let response = check_status(response).await?;
    let body = response.bytes().await?;
    debug!("Decoding response body, size: {} bytes", body.len());
    Ok(serde_json::from_slice(&body)?)
}

/// Row lists; an empty body (no representation requested) is an empty list.
async fn read_rows(response: Response) -> Result<Vec<Value>, BoardError> {
    let response = check_status(response).await?;
    let body = response.bytes().await?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(&body)?)
}

/// Sign-up answers with a full session when email confirmation is off, and
/// with the bare user (or `{user, session: null}`) when it is on.
fn parse_sign_up(body: Value) -> Result<SignUpOutcome, BoardError> {
    if body.get("access_token").is_some() {
        let session: Session = serde_json::from_value(body)?;
        return Ok(SignUpOutcome {
            user: Some(session.user.clone()),
            session: Some(session),
        });
    }

    if let Some(user) = body.get("user").filter(|u| !u.is_null()) {
        let user: User = serde_json::from_value(user.clone())?;
        let session = match body.get("session").filter(|s| !s.is_null()) {
            Some(s) => Some(serde_json::from_value::<Session>(s.clone())?),
            None => None,
        };
        return Ok(SignUpOutcome {
            user: Some(user),
            session,
        });
    }

    if body.get("id").is_some() {
        let user: User = serde_json::from_value(body)?;
        return Ok(SignUpOutcome {
            user: Some(user),
            session: None,
        });
    }

    Ok(SignUpOutcome::default())
}

// ---------------------------------------------------------------------------
// Backend impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Backend for RestBackend {
    async fn current_session(&self) -> Result<Option<Session>, BoardError> {
        Ok(self
            .session
            .read()
            .await
            .as_ref()
            .map(|held| held.session.clone()))
    }

    fn subscribe_auth_changes(&self) -> AuthSubscription {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        credentials: &PasswordCredentials,
    ) -> Result<Session, BoardError> {
        info!("Password sign-in for {}", credentials.email);

        let response = self
            .request(
                Method::POST,
                self.auth_url("token?grant_type=password"),
                &self.anon_key,
            )
            .json(credentials)
            .send()
            .await?;

        let session: Session = read_json(response).await?;
        self.store_session(session.clone(), AuthEvent::SignedIn)
            .await;
        Ok(session)
    }

    async fn sign_up(
        &self,
        credentials: &PasswordCredentials,
    ) -> Result<SignUpOutcome, BoardError> {
        info!("Sign-up for {}", credentials.email);

        let response = self
            .request(Method::POST, self.auth_url("signup"), &self.anon_key)
            .json(credentials)
            .send()
            .await?;

        let outcome = parse_sign_up(read_json(response).await?)?;

        match &outcome.session {
            Some(session) => {
                self.store_session(session.clone(), AuthEvent::SignedIn)
                    .await;
            }
            None => info!("Sign-up for {} awaits email confirmation", credentials.email),
        }

        Ok(outcome)
    }

    async fn sign_in_with_otp(&self, email: &str) -> Result<(), BoardError> {
        info!("One-time code requested for {}", email);

        let response = self
            .request(Method::POST, self.auth_url("otp"), &self.anon_key)
            .json(&json!({ "email": email, "create_user": true }))
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), BoardError> {
        // Local state is cleared first so a failed revoke still signs out.
        let session = self.session.write().await.take().map(|held| held.session);
        self.events.emit(AuthEvent::SignedOut);

        let Some(session) = session else {
            debug!("Sign-out without a session");
            return Ok(());
        };

        info!("Revoking session for {}", session);

        let response = self
            .request(Method::POST, self.auth_url("logout"), &session.access_token)
            .send()
            .await?;

        check_status(response).await.map_err(|e| {
            error!("Failed to revoke session: {}", e);
            e
        })?;
        Ok(())
    }

    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, BoardError> {
        debug!("select {} {:?}", table, query);

        let params = query.to_params();
        let response = self
            .send_authorized(|bearer| {
                self.request(Method::GET, self.rest_url(table), bearer)
                    .query(&params)
            })
            .await?;

        read_rows(response).await
    }

    async fn insert(&self, table: Table, rows: Vec<Value>) -> Result<Vec<Value>, BoardError> {
        debug!("insert {} ({} rows)", table, rows.len());

        let response = self
            .send_authorized(|bearer| {
                self.request(Method::POST, self.rest_url(table), bearer)
                    .header("Prefer", "return=representation")
                    .json(&rows)
            })
            .await?;

        read_rows(response).await
    }
}
