//! Machine database operations

use skilltree_common::db::{Machine, MachineRef};
use skilltree_common::Result;
use sqlx::{Row, SqlitePool};

/// Insert machine or overwrite every attribute column on id conflict
pub async fn save_machine(pool: &SqlitePool, machine: &Machine) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO htb_machines (
            id, name, os, ip, avatar, points, difficulty_text, status, release_date,
            user_owns_count, root_owns_count, free, stars, last_updated
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            os = excluded.os,
            ip = excluded.ip,
            avatar = excluded.avatar,
            points = excluded.points,
            difficulty_text = excluded.difficulty_text,
            status = excluded.status,
            release_date = excluded.release_date,
            user_owns_count = excluded.user_owns_count,
            root_owns_count = excluded.root_owns_count,
            free = excluded.free,
            stars = excluded.stars,
            last_updated = excluded.last_updated
        "#,
    )
    .bind(machine.id)
    .bind(&machine.name)
    .bind(&machine.os)
    .bind(&machine.ip)
    .bind(&machine.avatar)
    .bind(machine.points)
    .bind(&machine.difficulty_text)
    .bind(machine.status.as_str())
    .bind(&machine.release_date)
    .bind(machine.user_owns_count)
    .bind(machine.root_owns_count)
    .bind(machine.free)
    .bind(machine.stars)
    .bind(machine.last_updated.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load id and name of every machine, ordered by id
pub async fn load_machine_refs(pool: &SqlitePool) -> Result<Vec<MachineRef>> {
    let rows = sqlx::query("SELECT id, name FROM htb_machines ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| MachineRef {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect())
}

/// Case-insensitive exact match on machine name
pub async fn load_machine_by_name(pool: &SqlitePool, name: &str) -> Result<Option<MachineRef>> {
    let row = sqlx::query(
        "SELECT id, name FROM htb_machines WHERE name = ? COLLATE NOCASE ORDER BY id LIMIT 1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| MachineRef {
        id: row.get("id"),
        name: row.get("name"),
    }))
}

pub async fn update_video_url(pool: &SqlitePool, machine_id: i64, video_url: &str) -> Result<()> {
    sqlx::query("UPDATE htb_machines SET video_url = ? WHERE id = ?")
        .bind(video_url)
        .bind(machine_id)
        .execute(pool)
        .await?;

    Ok(())
}
