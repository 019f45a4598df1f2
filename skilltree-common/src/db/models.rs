//! Database models
//!
//! Shapes shared by every store backend. Serialized field names match the
//! column names so the same structs double as PostgREST request bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle partition a machine was listed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    Active,
    Retired,
}

impl MachineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineStatus::Active => "active",
            MachineStatus::Retired => "retired",
        }
    }
}

/// Machine attribute record, keyed by the catalog-assigned id
///
/// `video_url` is deliberately absent: it belongs to the curated importer
/// and the automated upsert must never overwrite it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: i64,
    pub name: String,
    pub os: Option<String>,
    pub ip: Option<String>,
    pub avatar: Option<String>,
    pub points: Option<i64>,
    pub difficulty_text: Option<String>,
    pub status: MachineStatus,
    pub release_date: Option<String>,
    pub user_owns_count: Option<i64>,
    pub root_owns_count: Option<i64>,
    pub free: Option<bool>,
    pub stars: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

/// Id and name of a machine already known to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRef {
    pub id: i64,
    pub name: String,
}

/// Technique (tag) reference row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Technique {
    pub id: i64,
    pub name: String,
    pub category: String,
}

/// Which pipeline wrote an association row
///
/// API rows are snapshot-replaced on every sync of their machine; curated
/// rows are additive and never deleted by the automated pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Api,
    Curated,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Api => "api",
            Provenance::Curated => "curated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "api" => Some(Provenance::Api),
            "curated" => Some(Provenance::Curated),
            _ => None,
        }
    }
}

/// Machine ↔ technique association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TechniqueLink {
    pub machine_id: i64,
    pub technique_id: i64,
    pub source: Provenance,
}

/// Certification reference row (curated only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certification {
    pub id: i64,
    pub name: String,
}

/// Technique together with the number of machines linked to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechniqueUsage {
    pub id: i64,
    pub name: String,
    pub machine_count: i64,
}
