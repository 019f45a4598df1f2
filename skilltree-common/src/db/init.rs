//! Database initialization
//!
//! Opens (creating if needed) the SQLite store and makes sure every table the
//! sync pipeline writes exists. Safe to call on every start.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Open the database at `url` and create tables if needed
///
/// In-memory URLs get a single long-lived connection, since every new SQLite
/// connection to `:memory:` would otherwise see its own empty database.
pub async fn init_database(url: &str) -> Result<SqlitePool> {
    let in_memory = url.contains(":memory:");

    let mut options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(5000));
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };

    create_schema(&pool).await?;
    info!("Database ready: {}", url);

    Ok(pool)
}

/// Create every table (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_machines_table(pool).await?;
    create_techniques_table(pool).await?;
    create_machine_techniques_table(pool).await?;
    create_certifications_table(pool).await?;
    create_machine_certifications_table(pool).await?;
    Ok(())
}

async fn create_machines_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS htb_machines (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            os TEXT,
            ip TEXT,
            avatar TEXT,
            points INTEGER,
            difficulty_text TEXT,
            status TEXT NOT NULL CHECK (status IN ('active', 'retired')),
            release_date TEXT,
            user_owns_count INTEGER,
            root_owns_count INTEGER,
            free INTEGER,
            stars REAL,
            video_url TEXT,
            last_updated TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_htb_machines_name ON htb_machines(name COLLATE NOCASE)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_techniques_table(pool: &SqlitePool) -> Result<()> {
    // Names repeat across categories, so only the id is unique.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS techniques (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_techniques_name ON techniques(name)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_machine_techniques_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS machine_techniques (
            machine_id INTEGER NOT NULL REFERENCES htb_machines(id) ON DELETE CASCADE,
            technique_id INTEGER NOT NULL REFERENCES techniques(id) ON DELETE CASCADE,
            source TEXT NOT NULL DEFAULT 'api' CHECK (source IN ('api', 'curated')),
            PRIMARY KEY (machine_id, technique_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_machine_techniques_technique ON machine_techniques(technique_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_certifications_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS certifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_machine_certifications_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS machine_certifications (
            machine_id INTEGER NOT NULL REFERENCES htb_machines(id) ON DELETE CASCADE,
            certification_id INTEGER NOT NULL REFERENCES certifications(id) ON DELETE CASCADE,
            PRIMARY KEY (machine_id, certification_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
