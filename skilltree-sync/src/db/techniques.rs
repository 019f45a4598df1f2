//! Technique and machine-technique link database operations

use super::{ConflictPolicy, LinkWriteError};
use skilltree_common::db::{Provenance, Technique, TechniqueLink, TechniqueUsage};
use skilltree_common::{Error, Result};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, Transaction};

/// Rows per multi-row INSERT (3 binds each, well under SQLite's bind limit)
const INSERT_CHUNK: usize = 300;

/// Upsert techniques keyed by id
pub async fn save_techniques(
    pool: &SqlitePool,
    techniques: &[Technique],
    policy: ConflictPolicy,
) -> Result<()> {
    for chunk in techniques.chunks(INSERT_CHUNK) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT INTO techniques (id, name, category) ");
        builder.push_values(chunk, |mut row, technique| {
            row.push_bind(technique.id)
                .push_bind(&technique.name)
                .push_bind(&technique.category);
        });
        builder.push(match policy {
            ConflictPolicy::IgnoreDuplicates => " ON CONFLICT(id) DO NOTHING",
            ConflictPolicy::Overwrite => {
                " ON CONFLICT(id) DO UPDATE SET name = excluded.name, category = excluded.category"
            }
        });
        builder.build().execute(pool).await?;
    }

    Ok(())
}

pub async fn insert_technique(pool: &SqlitePool, technique: &Technique) -> Result<()> {
    sqlx::query("INSERT INTO techniques (id, name, category) VALUES (?, ?, ?)")
        .bind(technique.id)
        .bind(&technique.name)
        .bind(&technique.category)
        .execute(pool)
        .await?;

    Ok(())
}

/// First technique with exactly this name (lowest id wins)
pub async fn load_technique_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Technique>> {
    let row = sqlx::query("SELECT id, name, category FROM techniques WHERE name = ? ORDER BY id LIMIT 1")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| Technique {
        id: row.get("id"),
        name: row.get("name"),
        category: row.get("category"),
    }))
}

/// Snapshot-replace API links for the given machines in one transaction
///
/// A crash before commit rolls back to the previous links. A failed insert
/// clears the machines' API links again and commits, so they end with none
/// rather than a stale or partial set.
pub async fn replace_api_links(
    pool: &SqlitePool,
    links: &[(i64, Vec<i64>)],
) -> std::result::Result<usize, LinkWriteError> {
    if links.is_empty() {
        return Ok(0);
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| LinkWriteError::Clear(e.into()))?;

    clear_api_links(&mut tx, links)
        .await
        .map_err(LinkWriteError::Clear)?;

    let rows: Vec<(i64, i64)> = links
        .iter()
        .flat_map(|(machine_id, technique_ids)| {
            technique_ids.iter().map(move |technique_id| (*machine_id, *technique_id))
        })
        .collect();

    match insert_api_links(&mut tx, &rows).await {
        Ok(inserted) => {
            tx.commit()
                .await
                .map_err(|e| LinkWriteError::Insert(e.into()))?;
            Ok(inserted)
        }
        Err(insert_error) => {
            // Earlier chunks may have landed; drop them before committing the clear.
            clear_api_links(&mut tx, links)
                .await
                .map_err(LinkWriteError::Insert)?;
            tx.commit()
                .await
                .map_err(|e| LinkWriteError::Insert(e.into()))?;
            Err(LinkWriteError::Insert(insert_error))
        }
    }
}

async fn clear_api_links(tx: &mut Transaction<'_, Sqlite>, links: &[(i64, Vec<i64>)]) -> Result<()> {
    for (machine_id, _) in links {
        sqlx::query("DELETE FROM machine_techniques WHERE machine_id = ? AND source = 'api'")
            .bind(machine_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn insert_api_links(tx: &mut Transaction<'_, Sqlite>, rows: &[(i64, i64)]) -> Result<usize> {
    let mut inserted = 0;
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT INTO machine_techniques (machine_id, technique_id, source) ");
        builder.push_values(chunk, |mut row, (machine_id, technique_id)| {
            row.push_bind(*machine_id)
                .push_bind(*technique_id)
                .push_bind(Provenance::Api.as_str());
        });
        builder.push(" ON CONFLICT(machine_id, technique_id) DO NOTHING");
        let result = builder.build().execute(&mut **tx).await?;
        inserted += result.rows_affected() as usize;
    }
    Ok(inserted)
}

pub async fn link_curated(pool: &SqlitePool, machine_id: i64, technique_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO machine_techniques (machine_id, technique_id, source)
        VALUES (?, ?, 'curated')
        ON CONFLICT(machine_id, technique_id) DO NOTHING
        "#,
    )
    .bind(machine_id)
    .bind(technique_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_links(pool: &SqlitePool, machine_id: i64) -> Result<Vec<TechniqueLink>> {
    let rows = sqlx::query(
        "SELECT machine_id, technique_id, source FROM machine_techniques WHERE machine_id = ? ORDER BY technique_id",
    )
    .bind(machine_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let source: String = row.get("source");
            Ok(TechniqueLink {
                machine_id: row.get("machine_id"),
                technique_id: row.get("technique_id"),
                source: Provenance::parse(&source)
                    .ok_or_else(|| Error::Internal(format!("Unknown link source '{}'", source)))?,
            })
        })
        .collect()
}

pub async fn load_usage(pool: &SqlitePool) -> Result<Vec<TechniqueUsage>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.name, COUNT(mt.machine_id) AS machine_count
        FROM techniques t
        LEFT JOIN machine_techniques mt ON mt.technique_id = t.id
        GROUP BY t.id, t.name
        ORDER BY t.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| TechniqueUsage {
            id: row.get("id"),
            name: row.get("name"),
            machine_count: row.get("machine_count"),
        })
        .collect())
}
