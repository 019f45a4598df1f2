//! PostgREST-backed [`CatalogStore`] (hosted Supabase projects)
//!
//! Every call is an independent HTTP request, so there is no transaction
//! around the delete + insert of [`CatalogStore::replace_api_links`]. A crash
//! between the two leaves the affected machines with no API links; re-running
//! the sync for them restores the exact set.

use super::{CatalogStore, ConflictPolicy, LinkWriteError};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use skilltree_common::db::{
    Certification, Machine, MachineRef, Technique, TechniqueLink, TechniqueUsage,
};
use skilltree_common::{Error, Result};
use std::time::Duration;

/// Rows requested per page when listing machines
const LIST_PAGE_SIZE: usize = 1000;

#[derive(Clone)]
pub struct RestStore {
    http_client: reqwest::Client,
    rest_url: String,
    key: String,
}

impl RestStore {
    /// `project_url` is the project root, e.g. `https://abc.supabase.co`
    pub fn new(project_url: &str, key: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http_client,
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            key: key.to_string(),
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(format!("{}: {}", operation, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::Http(format!("{} returned {}: {}", operation, status, body)))
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<T> {
        self.send(request, operation)
            .await?
            .json::<T>()
            .await
            .map_err(|e| Error::Http(format!("{}: invalid response body: {}", operation, e)))
    }

    async fn select_certification(&self, name: &str) -> Result<Option<Certification>> {
        let name_filter = format!("eq.{}", name);
        let rows: Vec<Certification> = self
            .fetch(
                self.request(Method::GET, "certifications")
                    .query(&[("select", "id,name"), ("name", name_filter.as_str())]),
                "select certification",
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_api_links(&self, machine_ids: &str) -> Result<()> {
        self.send(
            self.request(Method::DELETE, "machine_techniques").query(&[
                ("machine_id", format!("in.({})", machine_ids)),
                ("source", "eq.api".to_string()),
            ]),
            "delete technique links",
        )
        .await?;
        Ok(())
    }
}

fn resolution(policy: ConflictPolicy) -> &'static str {
    match policy {
        ConflictPolicy::IgnoreDuplicates => "resolution=ignore-duplicates,return=minimal",
        ConflictPolicy::Overwrite => "resolution=merge-duplicates,return=minimal",
    }
}

#[derive(Deserialize)]
struct CountEmbed {
    count: i64,
}

#[derive(Deserialize)]
struct UsageRow {
    id: i64,
    name: String,
    #[serde(default)]
    machine_techniques: Vec<CountEmbed>,
}

#[async_trait]
impl CatalogStore for RestStore {
    async fn upsert_machine(&self, machine: &Machine) -> Result<()> {
        self.send(
            self.request(Method::POST, "htb_machines")
                .query(&[("on_conflict", "id")])
                .header("Prefer", resolution(ConflictPolicy::Overwrite))
                .json(&[machine]),
            "upsert machine",
        )
        .await?;
        Ok(())
    }

    async fn list_machines(&self) -> Result<Vec<MachineRef>> {
        let mut machines = Vec::new();
        loop {
            let page: Vec<MachineRef> = self
                .fetch(
                    self.request(Method::GET, "htb_machines").query(&[
                        ("select", "id,name".to_string()),
                        ("order", "id.asc".to_string()),
                        ("limit", LIST_PAGE_SIZE.to_string()),
                        ("offset", machines.len().to_string()),
                    ]),
                    "list machines",
                )
                .await?;

            let page_len = page.len();
            machines.extend(page);
            if page_len < LIST_PAGE_SIZE {
                return Ok(machines);
            }
        }
    }

    async fn find_machine_by_name(&self, name: &str) -> Result<Option<MachineRef>> {
        let rows: Vec<MachineRef> = self
            .fetch(
                self.request(Method::GET, "htb_machines").query(&[
                    ("select", "id,name".to_string()),
                    ("name", name_filter(name)),
                    ("order", "id.asc".to_string()),
                    ("limit", "1".to_string()),
                ]),
                "find machine",
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn set_video_url(&self, machine_id: i64, video_url: &str) -> Result<()> {
        self.send(
            self.request(Method::PATCH, "htb_machines")
                .query(&[("id", format!("eq.{}", machine_id))])
                .json(&json!({ "video_url": video_url })),
            "update video url",
        )
        .await?;
        Ok(())
    }

    async fn upsert_techniques(
        &self,
        techniques: &[Technique],
        policy: ConflictPolicy,
    ) -> Result<()> {
        if techniques.is_empty() {
            return Ok(());
        }
        self.send(
            self.request(Method::POST, "techniques")
                .query(&[("on_conflict", "id")])
                .header("Prefer", resolution(policy))
                .json(techniques),
            "upsert techniques",
        )
        .await?;
        Ok(())
    }

    async fn find_technique_by_name(&self, name: &str) -> Result<Option<Technique>> {
        let rows: Vec<Technique> = self
            .fetch(
                self.request(Method::GET, "techniques").query(&[
                    ("select", "id,name,category".to_string()),
                    ("name", format!("eq.{}", name)),
                    ("order", "id.asc".to_string()),
                    ("limit", "1".to_string()),
                ]),
                "find technique",
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_technique(&self, technique: &Technique) -> Result<()> {
        self.send(
            self.request(Method::POST, "techniques")
                .header("Prefer", "return=minimal")
                .json(technique),
            "insert technique",
        )
        .await?;
        Ok(())
    }

    async fn replace_api_links(
        &self,
        links: &[(i64, Vec<i64>)],
    ) -> std::result::Result<usize, LinkWriteError> {
        if links.is_empty() {
            return Ok(0);
        }

        let machine_ids = links
            .iter()
            .map(|(machine_id, _)| machine_id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.delete_api_links(&machine_ids)
            .await
            .map_err(LinkWriteError::Clear)?;

        let rows: Vec<_> = links
            .iter()
            .flat_map(|(machine_id, technique_ids)| {
                technique_ids.iter().map(move |technique_id| {
                    json!({ "machine_id": machine_id, "technique_id": technique_id, "source": "api" })
                })
            })
            .collect();
        if rows.is_empty() {
            return Ok(0);
        }

        // One POST is one statement server-side: all rows land or none do.
        self.send(
            self.request(Method::POST, "machine_techniques")
                .query(&[("on_conflict", "machine_id,technique_id")])
                .header("Prefer", resolution(ConflictPolicy::IgnoreDuplicates))
                .json(&rows),
            "insert technique links",
        )
        .await
        .map_err(LinkWriteError::Insert)?;

        Ok(rows.len())
    }

    async fn link_curated_technique(&self, machine_id: i64, technique_id: i64) -> Result<()> {
        self.send(
            self.request(Method::POST, "machine_techniques")
                .query(&[("on_conflict", "machine_id,technique_id")])
                .header("Prefer", resolution(ConflictPolicy::IgnoreDuplicates))
                .json(&json!([{ "machine_id": machine_id, "technique_id": technique_id, "source": "curated" }])),
            "link curated technique",
        )
        .await?;
        Ok(())
    }

    async fn links_for_machine(&self, machine_id: i64) -> Result<Vec<TechniqueLink>> {
        self.fetch(
            self.request(Method::GET, "machine_techniques").query(&[
                ("select", "machine_id,technique_id,source".to_string()),
                ("machine_id", format!("eq.{}", machine_id)),
                ("order", "technique_id.asc".to_string()),
            ]),
            "list technique links",
        )
        .await
    }

    async fn find_or_create_certification(&self, name: &str) -> Result<Certification> {
        if let Some(existing) = self.select_certification(name).await? {
            return Ok(existing);
        }

        let created: Result<Vec<Certification>> = self
            .fetch(
                self.request(Method::POST, "certifications")
                    .header("Prefer", "return=representation")
                    .json(&json!({ "name": name })),
                "create certification",
            )
            .await;

        if let Some(certification) = created.ok().and_then(|rows| rows.into_iter().next()) {
            return Ok(certification);
        }

        // Lost a race with another writer, or the insert was rejected: re-read.
        self.select_certification(name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("certification '{}'", name)))
    }

    async fn link_certification(&self, machine_id: i64, certification_id: i64) -> Result<()> {
        self.send(
            self.request(Method::POST, "machine_certifications")
                .query(&[("on_conflict", "machine_id,certification_id")])
                .header("Prefer", resolution(ConflictPolicy::IgnoreDuplicates))
                .json(&json!([{ "machine_id": machine_id, "certification_id": certification_id }])),
            "link certification",
        )
        .await?;
        Ok(())
    }

    async fn technique_usage(&self) -> Result<Vec<TechniqueUsage>> {
        let rows: Vec<UsageRow> = self
            .fetch(
                self.request(Method::GET, "techniques")
                    .query(&[("select", "id,name,machine_techniques(count)")]),
                "technique usage",
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| TechniqueUsage {
                id: row.id,
                name: row.name,
                machine_count: row.machine_techniques.first().map_or(0, |c| c.count),
            })
            .collect())
    }
}

/// Case-insensitive exact-name filter
///
/// `%`, `_` and `\` are escaped for LIKE. PostgREST rewrites every `*` in a
/// like pattern to `%` with no escape, so names containing `*` fall back to
/// an exact `eq.` match.
fn name_filter(name: &str) -> String {
    if name.contains('*') {
        return format!("eq.{}", name);
    }
    let mut escaped = String::with_capacity(name.len());
    for ch in name.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    format!("ilike.{}", escaped)
}
