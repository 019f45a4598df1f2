//! SQLite-backed [`CatalogStore`]

use super::{certifications, machines, techniques, CatalogStore, ConflictPolicy, LinkWriteError};
use async_trait::async_trait;
use skilltree_common::db::{
    init_database, Certification, Machine, MachineRef, Technique, TechniqueLink, TechniqueUsage,
};
use skilltree_common::Result;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database and its schema
    pub async fn connect(url: &str) -> Result<Self> {
        Ok(Self {
            pool: init_database(url).await?,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn upsert_machine(&self, machine: &Machine) -> Result<()> {
        machines::save_machine(&self.pool, machine).await
    }

    async fn list_machines(&self) -> Result<Vec<MachineRef>> {
        machines::load_machine_refs(&self.pool).await
    }

    async fn find_machine_by_name(&self, name: &str) -> Result<Option<MachineRef>> {
        machines::load_machine_by_name(&self.pool, name).await
    }

    async fn set_video_url(&self, machine_id: i64, video_url: &str) -> Result<()> {
        machines::update_video_url(&self.pool, machine_id, video_url).await
    }

    async fn upsert_techniques(
        &self,
        techniques: &[Technique],
        policy: ConflictPolicy,
    ) -> Result<()> {
        techniques::save_techniques(&self.pool, techniques, policy).await
    }

    async fn find_technique_by_name(&self, name: &str) -> Result<Option<Technique>> {
        techniques::load_technique_by_name(&self.pool, name).await
    }

    async fn insert_technique(&self, technique: &Technique) -> Result<()> {
        techniques::insert_technique(&self.pool, technique).await
    }

    async fn replace_api_links(
        &self,
        links: &[(i64, Vec<i64>)],
    ) -> std::result::Result<usize, LinkWriteError> {
        techniques::replace_api_links(&self.pool, links).await
    }

    async fn link_curated_technique(&self, machine_id: i64, technique_id: i64) -> Result<()> {
        techniques::link_curated(&self.pool, machine_id, technique_id).await
    }

    async fn links_for_machine(&self, machine_id: i64) -> Result<Vec<TechniqueLink>> {
        techniques::load_links(&self.pool, machine_id).await
    }

    async fn find_or_create_certification(&self, name: &str) -> Result<Certification> {
        certifications::find_or_create(&self.pool, name).await
    }

    async fn link_certification(&self, machine_id: i64, certification_id: i64) -> Result<()> {
        certifications::link_machine(&self.pool, machine_id, certification_id).await
    }

    async fn technique_usage(&self) -> Result<Vec<TechniqueUsage>> {
        techniques::load_usage(&self.pool).await
    }
}
