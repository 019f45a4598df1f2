//! Certification database operations (curated data only)

use skilltree_common::db::Certification;
use skilltree_common::Result;
use sqlx::{Row, SqlitePool};

/// Return the certification with this name, creating it if missing
pub async fn find_or_create(pool: &SqlitePool, name: &str) -> Result<Certification> {
    sqlx::query("INSERT INTO certifications (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
        .bind(name)
        .execute(pool)
        .await?;

    let row = sqlx::query("SELECT id, name FROM certifications WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await?;

    Ok(Certification {
        id: row.get("id"),
        name: row.get("name"),
    })
}

pub async fn link_machine(pool: &SqlitePool, machine_id: i64, certification_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO machine_certifications (machine_id, certification_id)
        VALUES (?, ?)
        ON CONFLICT(machine_id, certification_id) DO NOTHING
        "#,
    )
    .bind(machine_id)
    .bind(certification_id)
    .execute(pool)
    .await?;

    Ok(())
}
