use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::joke::de_opaque_id;

// ---------------------------------------------------------------------------
// Identity issued by the auth provider
// ---------------------------------------------------------------------------

/// The authenticated account. Only `id` and `email` are read by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "de_opaque_id")]
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Provider session. The client only attaches the access token to requests
/// and exchanges the refresh token when the access token expires.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: User,
}

/// Result of a sign-up request.
///
/// Providers that require email confirmation return the user without a
/// session; the account exists but cannot act until it is verified.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignUpOutcome {
    pub user: Option<User>,
    pub session: Option<Session>,
}

impl SignUpOutcome {
    pub fn needs_confirmation(&self) -> bool {
        self.session.is_none()
    }
}

/// Email + password pair sent to the provider.
#[derive(Clone, PartialEq, Serialize)]
pub struct PasswordCredentials {
    pub email: String,
    pub password: String,
}

// ---------------------------------------------------------------------------
// Auth state notifications
// ---------------------------------------------------------------------------

/// Every change of authentication state the provider reports.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
}

impl AuthEvent {
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::SignedIn(session) | Self::TokenRefreshed(session) => Some(session),
            Self::SignedOut => None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.session().map(|session| &session.user)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SignedIn(_) => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed(_) => "TOKEN_REFRESHED",
        }
    }
}

// ---------------------------------------------------------------------------
// Display / Debug (never print tokens or passwords)
// ---------------------------------------------------------------------------

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user_id={}, email={:?}", self.user.id, self.user.email)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("user", &self.user)
            .finish()
    }
}

impl fmt::Debug for PasswordCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}
