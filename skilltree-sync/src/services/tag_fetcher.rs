//! Per-machine technique fetcher

use super::catalog_client::{CatalogClient, CatalogError, FetchOutcome};
use serde::Deserialize;
use serde_json::Value;
use skilltree_common::db::Technique;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Tag category kept by the pipeline; everything else is ignored
pub const TECHNIQUE_CATEGORY: &str = "Technique";

/// Tag as returned by `/machine/tags/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct RawTag {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// Entries stay untyped until their category is known
#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    info: Option<Vec<Value>>,
}

/// Decode the `Technique` entries of a raw tag list
///
/// Entries in other categories are dropped unread. A `Technique` entry
/// missing its id or name is skipped with a warning.
pub fn technique_tags(entries: Vec<Value>) -> Vec<RawTag> {
    entries
        .into_iter()
        .filter(|entry| entry.get("category").and_then(Value::as_str) == Some(TECHNIQUE_CATEGORY))
        .filter_map(|entry| match serde_json::from_value::<RawTag>(entry) {
            Ok(tag) => Some(tag),
            Err(e) => {
                warn!("Skipping malformed technique tag: {}", e);
                None
            }
        })
        .collect()
}

/// Keep `Technique` tags only, first occurrence of each id wins
pub fn select_techniques(tags: Vec<RawTag>) -> Vec<Technique> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .filter(|tag| tag.category.as_deref() == Some(TECHNIQUE_CATEGORY))
        .filter(|tag| seen.insert(tag.id))
        .map(|tag| Technique {
            id: tag.id,
            name: tag.name,
            category: TECHNIQUE_CATEGORY.to_string(),
        })
        .collect()
}

pub struct TagFetcher {
    client: Arc<CatalogClient>,
    request_delay: Duration,
}

impl TagFetcher {
    pub fn new(client: Arc<CatalogClient>, request_delay: Duration) -> Self {
        Self {
            client,
            request_delay,
        }
    }

    /// Current technique set of one machine
    ///
    /// Waits `request_delay` before the request. An inaccessible machine or
    /// a response without tags yields an empty set.
    pub async fn fetch_techniques(&self, machine_id: i64) -> Result<Vec<Technique>, CatalogError> {
        tokio::time::sleep(self.request_delay).await;

        let url = self.client.url(&format!("/machine/tags/{}", machine_id));
        let tags = match self.client.fetch_json::<TagsResponse>(&url).await? {
            FetchOutcome::Body(body) => technique_tags(body.info.unwrap_or_default()),
            FetchOutcome::Inaccessible => Vec::new(),
        };

        Ok(select_techniques(tags))
    }
}
