use serde::{Deserialize, Serialize};

use crate::types::joke::de_opaque_id;

/// A `profiles` row. `id` equals the owning user's id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Profile {
    #[serde(deserialize_with = "de_opaque_id")]
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl Profile {
    /// The stored name, if it is set and non-empty.
    pub fn display_name(&self) -> Option<&str> {
        self.username.as_deref().filter(|name| !name.is_empty())
    }
}

/// Insert payload written once, right after sign-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProfile {
    pub id: String,
    pub username: String,
}
