use std::fmt;

use crate::types::auth::PasswordCredentials;

// ---------------------------------------------------------------------------
// Form state
//
// Credentials are collected into explicit form objects and validated
// synchronously before anything is sent to the provider. Validation is
// emptiness only; the provider owns every other rule.
// ---------------------------------------------------------------------------

#[derive(Clone, Default, PartialEq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Default, PartialEq)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub username: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OtpForm {
    pub email: String,
}

/// A validated registration, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterRequest {
    pub credentials: PasswordCredentials,
    pub username: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<PasswordCredentials, FormError> {
        Ok(PasswordCredentials {
            email: required("email", &self.email)?,
            password: required_secret("password", &self.password)?,
        })
    }

    /// Drop the password once it has been submitted.
    pub fn clear_secret(&mut self) {
        self.password.clear();
    }
}

impl RegisterForm {
    pub fn validate(&self) -> Result<RegisterRequest, FormError> {
        let email = required("email", &self.email)?;
        let password = required_secret("password", &self.password)?;
        let username = required("username", &self.username)?;

        Ok(RegisterRequest {
            credentials: PasswordCredentials { email, password },
            username,
        })
    }

    pub fn clear_secret(&mut self) {
        self.password.clear();
    }
}

impl OtpForm {
    pub fn validate(&self) -> Result<String, FormError> {
        required("email", &self.email)
    }
}

fn required(field: &str, value: &str) -> Result<String, FormError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FormError::MissingField(field.to_string()));
    }
    Ok(value.to_string())
}

/// Passwords are sent verbatim; surrounding whitespace is significant.
fn required_secret(field: &str, value: &str) -> Result<String, FormError> {
    if value.is_empty() {
        return Err(FormError::MissingField(field.to_string()));
    }
    Ok(value.to_string())
}

// ---------------------------------------------------------------------------
// Form errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    MissingField(String),
}

impl FormError {
    pub fn to_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "MISSING_FIELD",
        }
    }

    pub fn to_message(&self) -> String {
        match self {
            Self::MissingField(field) => format!("Missing required field: {}", field),
        }
    }
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.to_code(), self.to_message())
    }
}

impl std::error::Error for FormError {}

// ---------------------------------------------------------------------------
// Debug (passwords redacted)
// ---------------------------------------------------------------------------

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for RegisterForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterForm")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("username", &self.username)
            .finish()
    }
}
