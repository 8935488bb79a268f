//! Database access for the search service

pub mod searches;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create service tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS searches (
            search_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            status TEXT NOT NULL,
            stage TEXT NOT NULL,
            configuration TEXT NOT NULL,
            progress TEXT NOT NULL,
            error TEXT,
            contacts_found INTEGER NOT NULL DEFAULT 0,
            contacts_imported INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_sources (
            id TEXT PRIMARY KEY,
            search_id TEXT NOT NULL,
            url TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            snippet TEXT NOT NULL DEFAULT '',
            query TEXT NOT NULL DEFAULT '',
            rank INTEGER NOT NULL DEFAULT 0,
            discovered_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS extracted_contacts (
            id TEXT PRIMARY KEY,
            search_id TEXT NOT NULL,
            name TEXT NOT NULL,
            title TEXT,
            outlet TEXT,
            email TEXT,
            profile_url TEXT,
            confidence REAL NOT NULL DEFAULT 0.0,
            relevance REAL NOT NULL DEFAULT 0.0,
            quality REAL NOT NULL DEFAULT 0.0,
            verification TEXT NOT NULL,
            source_url TEXT NOT NULL,
            extraction_method TEXT NOT NULL,
            extracted_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_searches_user ON searches (user_id, created_at)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_sources_search ON search_sources (search_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_contacts_search ON extracted_contacts (search_id)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (searches, search_sources, extracted_contacts)");

    Ok(())
}
