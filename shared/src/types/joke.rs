use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Row types (as stored in the `jokes` table)
// ---------------------------------------------------------------------------

/// A `jokes` row exactly as the row API returns it.
///
/// `is_joke_of_the_month` is absent on rows written by older clients, and
/// `user_id` is null for anonymous / system-authored jokes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JokeRow {
    #[serde(deserialize_with = "de_opaque_id")]
    pub id: String,
    pub content: String,
    /// Only used for ordering.
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "de_null_as_false")]
    pub is_joke_of_the_month: bool,
}

/// Insert payload for a freshly published joke.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewJoke {
    pub content: String,
    pub user_id: String,
    pub is_joke_of_the_month: bool,
}

impl NewJoke {
    pub fn new(content: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            user_id: user_id.into(),
            is_joke_of_the_month: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved joke (row + display name computed at load time)
// ---------------------------------------------------------------------------

/// A joke with its display name attached. The name is derived per feed load
/// and never written back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Joke {
    pub id: String,
    pub content: String,
    pub created_at: String,
    pub user_id: Option<String>,
    pub is_joke_of_the_month: bool,
    pub username: String,
}

impl Joke {
    pub fn resolved(row: JokeRow, username: impl Into<String>) -> Self {
        Self {
            id: row.id,
            content: row.content,
            created_at: row.created_at,
            user_id: row.user_id,
            is_joke_of_the_month: row.is_joke_of_the_month,
            username: username.into(),
        }
    }
}

impl fmt::Display for Joke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} — {}", self.content, self.username)
    }
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

/// Ids are opaque to the client: accept both text and numeric primary keys.
pub(crate) fn de_opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or numeric id, got {}",
            other
        ))),
    }
}

fn de_null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}
