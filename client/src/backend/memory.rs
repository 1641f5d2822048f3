//! In-process [`Backend`] for tests and local demos.
//!
//! Keeps users, the current session and table rows in memory, evaluates the
//! same [`Query`] filters the row API understands, and records every call so
//! tests can assert on round trips. Failures and latency can be injected.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use shared::types::{AuthEvent, PasswordCredentials, Session, SignUpOutcome, User};
use tracing::debug;

use super::{Backend, Filter, Query, Table};
use crate::auth_events::{AuthEvents, AuthSubscription};
use crate::error::BoardError;

/// Calls that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CurrentSession,
    SignIn,
    SignUp,
    SignOut,
    Otp,
    Select(Table),
    Insert(Table),
}

#[derive(Debug, Clone)]
struct Account {
    user: User,
    password: String,
    confirmed: bool,
}

#[derive(Debug, Default)]
struct Store {
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    tables: HashMap<Table, Vec<Value>>,
    selects: Vec<(Table, Query)>,
    inserts: Vec<(Table, Vec<Value>)>,
    otp_requests: Vec<String>,
    failures: HashMap<FailPoint, String>,
    latency: Option<Duration>,
}

pub struct MemoryBackend {
    store: Mutex<Store>,
    events: AuthEvents,
    require_confirmation: bool,
    seq: AtomicU64,
}

impl MemoryBackend {
    /// Sign-ups need email confirmation, like a default hosted project.
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
            events: AuthEvents::new(),
            require_confirmation: true,
            seq: AtomicU64::new(0),
        }
    }

    /// Sign-ups are signed in immediately.
    pub fn without_confirmation() -> Self {
        Self {
            require_confirmation: false,
            ..Self::new()
        }
    }

    fn store(&self) -> std::sync::MutexGuard<'_, Store> {
        // A panicking test thread must not wedge the others.
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn check(&self, point: FailPoint) -> Result<(), BoardError> {
        match self.store().failures.get(&point) {
            Some(message) => Err(BoardError::provider(500, message.clone())),
            None => Ok(()),
        }
    }

    async fn delay(&self) {
        let latency = self.store().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn new_session(&self, user: &User) -> Session {
        Session {
            access_token: format!("memory-token-{}", self.next_seq()),
            token_type: Some("bearer".to_string()),
            expires_in: Some(3600),
            refresh_token: Some(format!("memory-refresh-{}", self.next_seq())),
            user: user.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Test / demo helpers
    // -----------------------------------------------------------------------

    /// Create a confirmed account that can sign in right away.
    pub fn add_user(&self, email: &str, password: &str) -> User {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
        };
        self.store().accounts.insert(
            email.to_string(),
            Account {
                user: user.clone(),
                password: password.to_string(),
                confirmed: true,
            },
        );
        user
    }

    pub fn confirm_email(&self, email: &str) {
        if let Some(account) = self.store().accounts.get_mut(email) {
            account.confirmed = true;
        }
    }

    /// Install a session without going through sign-in, e.g. one restored
    /// by the provider SDK before the view mounts.
    pub fn set_session(&self, user: &User) -> Session {
        let session = self.new_session(user);
        self.store().session = Some(session.clone());
        session
    }

    /// Simulate a provider-side auth change (expiry, refresh, another tab).
    pub fn emit(&self, event: AuthEvent) -> usize {
        self.store().session = event.session().cloned();
        self.events.emit(event)
    }

    pub fn seed(&self, table: Table, rows: Vec<Value>) {
        self.store().tables.entry(table).or_default().extend(rows);
    }

    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.store().tables.get(&table).cloned().unwrap_or_default()
    }

    pub fn fail(&self, point: FailPoint, message: &str) {
        self.store().failures.insert(point, message.to_string());
    }

    pub fn clear_failures(&self) {
        self.store().failures.clear();
    }

    /// Delay every data call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.store().latency = Some(latency);
    }

    pub fn select_count(&self, table: Table) -> usize {
        self.store().selects.iter().filter(|(t, _)| *t == table).count()
    }

    pub fn selects(&self, table: Table) -> Vec<Query> {
        self.store()
            .selects
            .iter()
            .filter(|(t, _)| *t == table)
            .map(|(_, q)| q.clone())
            .collect()
    }

    /// Every row passed to `insert` for `table`, in call order.
    pub fn inserted(&self, table: Table) -> Vec<Value> {
        self.store()
            .inserts
            .iter()
            .filter(|(t, _)| *t == table)
            .flat_map(|(_, rows)| rows.clone())
            .collect()
    }

    pub fn otp_requests(&self) -> Vec<String> {
        self.store().otp_requests.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.events.listener_count()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Row evaluation
// ---------------------------------------------------------------------------

fn cell_text(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn matches(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq { column, value } => cell_text(row, column).as_deref() == Some(value.as_str()),
        Filter::In { column, values } => {
            cell_text(row, column).is_some_and(|cell| values.contains(&cell))
        }
    })
}

fn project(row: &Value, columns: &Option<String>) -> Value {
    let Some(columns) = columns.as_deref().filter(|c| *c != "*") else {
        return row.clone();
    };
    let wanted: HashSet<&str> = columns.split(',').map(str::trim).collect();
    match row {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| wanted.contains(k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

// ---------------------------------------------------------------------------
// Backend impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Backend for MemoryBackend {
    async fn current_session(&self) -> Result<Option<Session>, BoardError> {
        self.check(FailPoint::CurrentSession)?;
        Ok(self.store().session.clone())
    }

    fn subscribe_auth_changes(&self) -> AuthSubscription {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        credentials: &PasswordCredentials,
    ) -> Result<Session, BoardError> {
        self.delay().await;
        self.check(FailPoint::SignIn)?;

        let account = self.store().accounts.get(&credentials.email).cloned();
        let account = match account {
            Some(account) if account.password == credentials.password => account,
            _ => return Err(BoardError::provider(400, "Invalid login credentials")),
        };
        if !account.confirmed {
            return Err(BoardError::provider(400, "Email not confirmed"));
        }

        let session = self.new_session(&account.user);
        self.store().session = Some(session.clone());
        self.events.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        credentials: &PasswordCredentials,
    ) -> Result<SignUpOutcome, BoardError> {
        self.delay().await;
        self.check(FailPoint::SignUp)?;

        if self.store().accounts.contains_key(&credentials.email) {
            return Err(BoardError::provider(422, "User already registered"));
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: Some(credentials.email.clone()),
        };
        self.store().accounts.insert(
            credentials.email.clone(),
            Account {
                user: user.clone(),
                password: credentials.password.clone(),
                confirmed: !self.require_confirmation,
            },
        );

        if self.require_confirmation {
            return Ok(SignUpOutcome {
                user: Some(user),
                session: None,
            });
        }

        let session = self.new_session(&user);
        self.store().session = Some(session.clone());
        self.events.emit(AuthEvent::SignedIn(session.clone()));
        Ok(SignUpOutcome {
            user: Some(user),
            session: Some(session),
        })
    }

    async fn sign_in_with_otp(&self, email: &str) -> Result<(), BoardError> {
        self.delay().await;
        self.check(FailPoint::Otp)?;
        self.store().otp_requests.push(email.to_string());
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), BoardError> {
        self.delay().await;
        let had_session = self.store().session.take().is_some();
        self.events.emit(AuthEvent::SignedOut);
        self.check(FailPoint::SignOut)?;
        debug!("Memory sign-out (had session: {})", had_session);
        Ok(())
    }

    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, BoardError> {
        self.store().selects.push((table, query.clone()));
        self.check(FailPoint::Select(table))?;

        // The answer reflects the rows at request time, however late it
        // arrives.
        let mut rows: Vec<Value> = self
            .store()
            .tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches(row, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = cell_text(a, &order.column).cmp(&cell_text(b, &order.column));
                if order.ascending { ord } else { ord.reverse() }
            });
        }

        let rows = rows
            .iter()
            .map(|row| project(row, &query.columns))
            .collect();
        self.delay().await;
        Ok(rows)
    }

    async fn insert(&self, table: Table, rows: Vec<Value>) -> Result<Vec<Value>, BoardError> {
        self.store().inserts.push((table, rows.clone()));
        self.delay().await;
        self.check(FailPoint::Insert(table))?;

        let mut stored = Vec::with_capacity(rows.len());
        for mut row in rows {
            if let Value::Object(map) = &mut row {
                if table == Table::Jokes {
                    map.entry("id")
                        .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
                    let offset = chrono::Duration::microseconds(self.next_seq() as i64);
                    let created_at = (chrono::Utc::now() + offset)
                        .to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
                    map.entry("created_at")
                        .or_insert_with(|| Value::String(created_at));
                }
            }
            stored.push(row);
        }

        self.store()
            .tables
            .entry(table)
            .or_default()
            .extend(stored.iter().cloned());
        Ok(stored)
    }
}
