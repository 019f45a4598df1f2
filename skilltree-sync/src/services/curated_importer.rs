//! Curated catalogue importer
//!
//! Reads the hand-maintained JSON catalogue (one object per machine with a
//! walkthrough video, certifications and techniques) and links it onto
//! machines already in the store. Everything written here is additive:
//! curated links are never removed by the automated sync, and this importer
//! never removes anything either.

use crate::db::CatalogStore;
use rand::Rng;
use serde::Deserialize;
use skilltree_common::db::{MachineRef, Technique};
use skilltree_common::{Error, Result};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Category given to techniques created by this importer
pub const CURATED_CATEGORY: &str = "S4vitar";

/// Id namespace for curated techniques, above any catalog-assigned id
pub const CURATED_ID_RANGE: Range<i64> = 1_000_000..2_000_000;

/// Insert attempts before giving up on a curated technique (id collisions)
const MAX_ID_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CuratedEntry {
    #[serde(rename = "Máquina", default)]
    pub machine: Option<String>,
    #[serde(rename = "Video", default)]
    pub video: Option<String>,
    /// Newline-separated certification names
    #[serde(rename = "Cert", default)]
    pub certifications: Option<String>,
    /// Newline-separated technique names
    #[serde(rename = "Técnicas Vistas", default)]
    pub techniques: Option<String>,
}

/// Parse the catalogue
///
/// Accepts a JSON array, or a bare comma-separated sequence of objects that
/// only becomes an array once wrapped in brackets.
pub fn parse_catalogue(raw: &str) -> Result<Vec<CuratedEntry>> {
    match serde_json::from_str::<Vec<CuratedEntry>>(raw) {
        Ok(entries) => Ok(entries),
        Err(array_error) => {
            let body = raw.trim().trim_end_matches(',');
            serde_json::from_str::<Vec<CuratedEntry>>(&format!("[{}]", body)).map_err(|_| {
                Error::InvalidInput(format!("curated catalogue is not valid JSON: {}", array_error))
            })
        }
    }
}

/// Trimmed non-empty lines of a multi-line cell
pub fn split_lines(cell: Option<&str>) -> Vec<&str> {
    cell.map(|value| {
        value
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn curated_technique_id() -> i64 {
    rand::thread_rng().gen_range(CURATED_ID_RANGE)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub entries: usize,
    /// Entries matched to a stored machine
    pub updated: usize,
    pub not_found: usize,
    pub errors: usize,
    pub certifications_linked: usize,
    pub techniques_created: usize,
    pub techniques_linked: usize,
}

pub struct CuratedImporter {
    store: Arc<dyn CatalogStore>,
}

impl CuratedImporter {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub async fn import_file(&self, path: &Path) -> Result<ImportSummary> {
        let raw = tokio::fs::read_to_string(path).await?;
        let entries = parse_catalogue(&raw)?;
        info!(path = %path.display(), entries = entries.len(), "Loaded curated catalogue");
        Ok(self.import_entries(&entries).await)
    }

    /// Import every entry; failures are counted and the loop continues
    pub async fn import_entries(&self, entries: &[CuratedEntry]) -> ImportSummary {
        let mut summary = ImportSummary {
            entries: entries.len(),
            ..Default::default()
        };

        for entry in entries {
            let Some(name) = entry.machine.as_deref().map(str::trim).filter(|n| !n.is_empty())
            else {
                warn!("Curated entry without a machine name, skipping");
                summary.errors += 1;
                continue;
            };

            let machine = match self.store.find_machine_by_name(name).await {
                Ok(Some(machine)) => machine,
                Ok(None) => {
                    warn!(machine = name, "Machine not found in store");
                    summary.not_found += 1;
                    continue;
                }
                Err(e) => {
                    error!(machine = name, error = %e, "Machine lookup failed");
                    summary.errors += 1;
                    continue;
                }
            };

            info!("Processing: {} (ID: {})", machine.name, machine.id);
            self.import_entry(&machine, entry, &mut summary).await;
            summary.updated += 1;
        }

        info!(
            updated = summary.updated,
            not_found = summary.not_found,
            errors = summary.errors,
            "Curated import completed"
        );
        summary
    }

    async fn import_entry(
        &self,
        machine: &MachineRef,
        entry: &CuratedEntry,
        summary: &mut ImportSummary,
    ) {
        if let Some(video) = entry.video.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            if let Err(e) = self.store.set_video_url(machine.id, video).await {
                error!(machine_id = machine.id, error = %e, "Failed to update video URL");
            }
        }

        for certification in split_lines(entry.certifications.as_deref()) {
            let linked = match self.store.find_or_create_certification(certification).await {
                Ok(cert) => self.store.link_certification(machine.id, cert.id).await,
                Err(e) => Err(e),
            };
            match linked {
                Ok(()) => summary.certifications_linked += 1,
                Err(e) => {
                    error!(machine_id = machine.id, certification, error = %e, "Failed to link certification")
                }
            }
        }

        for name in split_lines(entry.techniques.as_deref()) {
            let technique = match self.find_or_create_technique(name, summary).await {
                Ok(technique) => technique,
                Err(e) => {
                    warn!(machine_id = machine.id, technique = name, error = %e, "Could not create technique");
                    continue;
                }
            };
            match self
                .store
                .link_curated_technique(machine.id, technique.id)
                .await
            {
                Ok(()) => summary.techniques_linked += 1,
                Err(e) => {
                    error!(machine_id = machine.id, technique = name, error = %e, "Failed to link technique")
                }
            }
        }
    }

    async fn find_or_create_technique(
        &self,
        name: &str,
        summary: &mut ImportSummary,
    ) -> Result<Technique> {
        if let Some(existing) = self.store.find_technique_by_name(name).await? {
            return Ok(existing);
        }

        let mut last_error = None;
        for _ in 0..MAX_ID_ATTEMPTS {
            let technique = Technique {
                id: curated_technique_id(),
                name: name.to_string(),
                category: CURATED_CATEGORY.to_string(),
            };
            match self.store.insert_technique(&technique).await {
                Ok(()) => {
                    debug!(id = technique.id, technique = name, "Created curated technique");
                    summary.techniques_created += 1;
                    return Ok(technique);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::Internal(format!("no id attempts for technique '{}'", name))))
    }
}
