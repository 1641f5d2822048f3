//! Feed loading: all jokes newest first, each with a display name.

use std::collections::{BTreeSet, HashMap};

use futures::future::join_all;
use serde_json::Value;
use shared::types::{FeedConfig, Joke, JokeRow, Profile, ProfileLookup};
use tracing::{debug, error, info, warn};

use crate::backend::{Backend, Query, Table};
use crate::board::Board;
use crate::error::BoardError;

/// Fetch the whole feed and resolve display names.
///
/// A failed joke fetch fails the load. A failed profile lookup only
/// degrades the affected jokes to the anonymous label.
pub async fn load_feed(backend: &dyn Backend, config: &FeedConfig) -> Result<Vec<Joke>, BoardError> {
    let rows = backend
        .select(Table::Jokes, &Query::all().order_by("created_at", false))
        .await?;

    let rows = decode_rows(rows);
    debug!("Fetched {} jokes", rows.len());

    let jokes = match config.profile_lookup {
        ProfileLookup::Batched => resolve_batched(backend, rows, &config.anon_label).await,
        ProfileLookup::PerRecord => resolve_per_record(backend, rows, &config.anon_label).await,
    };

    Ok(jokes)
}

fn decode_rows(rows: Vec<Value>) -> Vec<JokeRow> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<JokeRow>(row) {
            Ok(row) => Some(row),
            Err(e) => {
                warn!("Skipping malformed joke row: {}", e);
                None
            }
        })
        .collect()
}

/// `"Anon"` without an owner, the owner's profile name when one exists,
/// `"Anon"` otherwise.
fn display_name(row: &JokeRow, names: &HashMap<String, String>, anon: &str) -> String {
    row.user_id
        .as_ref()
        .and_then(|id| names.get(id))
        .cloned()
        .unwrap_or_else(|| anon.to_string())
}

fn name_map(rows: Vec<Value>) -> HashMap<String, String> {
    rows.into_iter()
        .filter_map(|row| serde_json::from_value::<Profile>(row).ok())
        .filter_map(|profile| {
            let name = profile.display_name()?.to_string();
            Some((profile.id, name))
        })
        .collect()
}

/// One profile query for every distinct owner in the feed.
async fn resolve_batched(backend: &dyn Backend, rows: Vec<JokeRow>, anon: &str) -> Vec<Joke> {
    let owners: BTreeSet<&str> = rows.iter().filter_map(|r| r.user_id.as_deref()).collect();

    let names = if owners.is_empty() {
        HashMap::new()
    } else {
        let query = Query::all()
            .columns("id,username")
            .in_list("id", owners.iter().copied());
        match backend.select(Table::Profiles, &query).await {
            Ok(profiles) => name_map(profiles),
            Err(e) => {
                warn!("Profile lookup for {} owners failed: {}", owners.len(), e);
                HashMap::new()
            }
        }
    };

    rows.into_iter()
        .map(|row| {
            let name = display_name(&row, &names, anon);
            Joke::resolved(row, name)
        })
        .collect()
}

/// One profile query per owned joke, all in flight at once and joined
/// before anything is returned.
async fn resolve_per_record(backend: &dyn Backend, rows: Vec<JokeRow>, anon: &str) -> Vec<Joke> {
    let lookups = rows.into_iter().map(|row| async move {
        let Some(owner) = row.user_id.clone() else {
            return Joke::resolved(row, anon);
        };

        let query = Query::all().columns("id,username").eq("id", owner.clone());
        let names = match backend.select(Table::Profiles, &query).await {
            Ok(profiles) => name_map(profiles),
            Err(e) => {
                warn!("Profile lookup for {} failed: {}", owner, e);
                HashMap::new()
            }
        };

        let name = display_name(&row, &names, anon);
        Joke::resolved(row, name)
    });

    join_all(lookups).await
}

// ---------------------------------------------------------------------------
// Board integration
// ---------------------------------------------------------------------------

impl Board {
    /// Reload the feed into the view. Returns the number of jokes applied.
    ///
    /// Errors are logged and leave the current feed untouched. A load that
    /// finishes after a newer one started, or after unmount, is dropped.
    pub async fn refresh_feed(&self) -> Result<usize, BoardError> {
        let generation = self.update(|s| s.begin_feed_load()).await;
        debug!("Feed load {} started", generation);

        let inner = &self.inner;
        let loaded = self
            .guarded(load_feed(inner.backend.as_ref(), &inner.feed))
            .await;

        let jokes = match loaded {
            Ok(jokes) => jokes,
            Err(BoardError::Cancelled) => {
                debug!("Feed load {} cancelled", generation);
                return Err(BoardError::Cancelled);
            }
            Err(e) => {
                error!("Error fetching jokes: {}", e);
                return Err(e);
            }
        };

        let count = jokes.len();
        if self.update(|s| s.feed_loaded(generation, jokes)).await {
            info!("Feed load {} applied ({} jokes)", generation, count);
        } else {
            debug!("Feed load {} superseded, discarded", generation);
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FailPoint, MemoryBackend};
    use serde_json::json;

    fn config(lookup: ProfileLookup) -> FeedConfig {
        FeedConfig {
            profile_lookup: lookup,
            anon_label: "Anon".into(),
        }
    }

    fn seeded() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.seed(
            Table::Jokes,
            vec![
                json!({"id": "1", "content": "A", "created_at": "2025-01-03T00:00:00Z", "user_id": null}),
                json!({"id": "2", "content": "B", "created_at": "2025-01-02T00:00:00Z", "user_id": "u1"}),
                json!({"id": "3", "content": "C", "created_at": "2025-01-01T00:00:00Z", "user_id": "ghost"}),
                json!({"id": "4", "content": "D", "created_at": "2025-01-04T00:00:00Z", "user_id": "u1"}),
                json!({"id": "5", "content": "E", "created_at": "2025-01-05T00:00:00Z", "user_id": "u2"}),
            ],
        );
        backend.seed(
            Table::Profiles,
            vec![
                json!({"id": "u1", "username": "Bob"}),
                json!({"id": "u2", "username": null}),
            ],
        );
        backend
    }

    fn names(jokes: &[Joke]) -> Vec<(&str, &str)> {
        jokes
            .iter()
            .map(|j| (j.id.as_str(), j.username.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn test_batched_resolves_names_in_feed_order() {
        let backend = seeded();
        let jokes = load_feed(&backend, &config(ProfileLookup::Batched))
            .await
            .unwrap();

        assert_eq!(names(&jokes), vec![
            ("5", "Anon"),
            ("4", "Bob"),
            ("1", "Anon"),
            ("2", "Bob"),
            ("3", "Anon"),
        ]);
    }

    #[tokio::test]
    async fn test_batched_uses_one_deduplicated_lookup() {
        let backend = seeded();
        load_feed(&backend, &config(ProfileLookup::Batched))
            .await
            .unwrap();

        let lookups = backend.selects(Table::Profiles);
        assert_eq!(lookups.len(), 1);
        assert_eq!(
            lookups[0].to_params()[1],
            ("id".to_string(), r#"in.("ghost","u1","u2")"#.to_string())
        );
    }

    #[tokio::test]
    async fn test_per_record_issues_one_lookup_per_owned_joke() {
        let backend = seeded();
        let jokes = load_feed(&backend, &config(ProfileLookup::PerRecord))
            .await
            .unwrap();

        assert_eq!(backend.select_count(Table::Profiles), 4);
        assert_eq!(jokes[1].username, "Bob");
        assert_eq!(jokes[2].username, "Anon");
    }

    #[tokio::test]
    async fn test_no_owners_means_no_profile_lookup() {
        let backend = MemoryBackend::new();
        backend.seed(Table::Jokes, vec![json!({"id": "1", "content": "A"})]);
        let jokes = load_feed(&backend, &config(ProfileLookup::Batched))
            .await
            .unwrap();
        assert_eq!(jokes[0].username, "Anon");
        assert_eq!(backend.select_count(Table::Profiles), 0);
    }

    #[tokio::test]
    async fn test_profile_failure_degrades_to_anon() {
        let backend = seeded();
        backend.fail(FailPoint::Select(Table::Profiles), "profiles down");

        for lookup in [ProfileLookup::Batched, ProfileLookup::PerRecord] {
            let jokes = load_feed(&backend, &config(lookup)).await.unwrap();
            assert_eq!(jokes.len(), 5);
            assert!(jokes.iter().all(|j| j.username == "Anon"));
        }
    }

    #[tokio::test]
    async fn test_joke_fetch_failure_fails_load() {
        let backend = seeded();
        backend.fail(FailPoint::Select(Table::Jokes), "jokes down");
        let err = load_feed(&backend, &config(ProfileLookup::Batched))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "jokes down");
    }

    #[tokio::test]
    async fn test_malformed_rows_are_skipped() {
        let backend = MemoryBackend::new();
        backend.seed(
            Table::Jokes,
            vec![
                json!({"id": "1", "content": "A"}),
                json!({"id": "2"}),
            ],
        );
        let jokes = load_feed(&backend, &config(ProfileLookup::Batched))
            .await
            .unwrap();
        assert_eq!(jokes.len(), 1);
    }

    #[tokio::test]
    async fn test_custom_anon_label() {
        let backend = seeded();
        let cfg = FeedConfig {
            profile_lookup: ProfileLookup::Batched,
            anon_label: "Anónimo".into(),
        };
        let jokes = load_feed(&backend, &cfg).await.unwrap();
        assert_eq!(jokes[0].username, "Anónimo");
    }
}
