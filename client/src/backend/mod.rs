//! The hosted backend seam.
//!
//! The board never talks HTTP directly; it goes through [`Backend`], which
//! mirrors the provider SDK surface: a handful of auth calls, one
//! auth-change subscription, and generic `select` / `insert` over tables.

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use serde_json::Value;
use shared::types::{PasswordCredentials, Session, SignUpOutcome};

use crate::auth_events::AuthSubscription;
use crate::error::BoardError;

pub use memory::{FailPoint, MemoryBackend};
pub use rest::RestBackend;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Session held by the provider client right now, if any.
    async fn current_session(&self) -> Result<Option<Session>, BoardError>;

    /// Register for every subsequent auth state change.
    fn subscribe_auth_changes(&self) -> AuthSubscription;

    async fn sign_in_with_password(
        &self,
        credentials: &PasswordCredentials,
    ) -> Result<Session, BoardError>;

    async fn sign_up(&self, credentials: &PasswordCredentials)
    -> Result<SignUpOutcome, BoardError>;

    /// Ask the provider to email a one-time sign-in code / link.
    async fn sign_in_with_otp(&self, email: &str) -> Result<(), BoardError>;

    async fn sign_out(&self) -> Result<(), BoardError>;

    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, BoardError>;

    /// Insert rows and return them as stored.
    async fn insert(&self, table: Table, rows: Vec<Value>) -> Result<Vec<Value>, BoardError>;
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Jokes,
    Profiles,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jokes => "jokes",
            Self::Profiles => "profiles",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { column: String, value: String },
    In { column: String, values: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Column projection, filters and ordering for one `select`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    /// `None` selects every column.
    pub columns: Option<String>,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn columns(mut self, columns: &str) -> Self {
        self.columns = Some(columns.to_string());
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<String>) -> Self {
        self.filters.push(Filter::Eq {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn in_list<I, S>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.push(Filter::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    /// Row-API query string pairs: `select`, `order` and one pair per filter.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![(
            "select".to_string(),
            self.columns.clone().unwrap_or_else(|| "*".to_string()),
        )];

        for filter in &self.filters {
            match filter {
                Filter::Eq { column, value } => {
                    params.push((column.clone(), format!("eq.{}", value)));
                }
                Filter::In { column, values } => {
                    let list = values
                        .iter()
                        .map(|v| quote_list_value(v))
                        .collect::<Vec<_>>()
                        .join(",");
                    params.push((column.clone(), format!("in.({})", list)));
                }
            }
        }

        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
        }

        params
    }
}

/// List members are always double-quoted so commas and parentheses inside
/// ids cannot break the list syntax.
fn quote_list_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}
