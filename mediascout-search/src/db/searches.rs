//! Search record persistence
//!
//! The orchestrator's only durable state. Status and stage are stored as
//! their JSON serializations so SQL filters match the serde representation
//! exactly. Configuration and progress are JSON blobs.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use mediascout_common::{Error, Result};

use crate::models::{
    ExtractedContact, ProgressSnapshot, SearchConfiguration, SearchSession, SearchSource,
    SearchStage, SearchStatus,
};

const TERMINAL_STATUSES: &str = r#"('"COMPLETED"', '"CANCELLED"', '"FAILED"')"#;

/// Save (insert or update) a search session
pub async fn save_search(pool: &SqlitePool, session: &SearchSession) -> Result<()> {
    let search_id = session.search_id.to_string();
    let user_id = session.user_id.to_string();
    let status = serde_json::to_string(&session.status)
        .map_err(|e| Error::Internal(format!("Failed to serialize status: {}", e)))?;
    let stage = serde_json::to_string(&session.stage)
        .map_err(|e| Error::Internal(format!("Failed to serialize stage: {}", e)))?;
    let configuration = serde_json::to_string(&session.configuration)
        .map_err(|e| Error::Internal(format!("Failed to serialize configuration: {}", e)))?;
    let progress = serde_json::to_string(&session.progress)
        .map_err(|e| Error::Internal(format!("Failed to serialize progress: {}", e)))?;
    let created_at = session.created_at.to_rfc3339();
    let started_at = session.started_at.map(|dt| dt.to_rfc3339());
    let completed_at = session.completed_at.map(|dt| dt.to_rfc3339());

    sqlx::query(
        r#"
        INSERT INTO searches (
            search_id, user_id, status, stage, configuration, progress,
            error, contacts_found, contacts_imported,
            created_at, started_at, completed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(search_id) DO UPDATE SET
            status = excluded.status,
            stage = excluded.stage,
            progress = excluded.progress,
            error = excluded.error,
            contacts_found = excluded.contacts_found,
            contacts_imported = excluded.contacts_imported,
            started_at = excluded.started_at,
            completed_at = excluded.completed_at
        "#,
    )
    .bind(&search_id)
    .bind(&user_id)
    .bind(&status)
    .bind(&stage)
    .bind(&configuration)
    .bind(&progress)
    .bind(&session.error)
    .bind(session.contacts_found as i64)
    .bind(session.contacts_imported as i64)
    .bind(&created_at)
    .bind(&started_at)
    .bind(&completed_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist pipeline-side mutations only while the stored record is still
/// non-terminal.
///
/// The pipeline task works on an in-memory session that can go stale if a
/// concurrent cancellation persists a terminal status first. A blind upsert
/// would resurrect the record to PROCESSING and leave it stuck there, so
/// pipeline saves go through this guard instead. Returns false when the
/// stored status is already terminal; the caller must stop without saving.
pub async fn update_search_if_active(
    pool: &SqlitePool,
    session: &SearchSession,
) -> Result<bool> {
    let status = serde_json::to_string(&session.status)
        .map_err(|e| Error::Internal(format!("Failed to serialize status: {}", e)))?;
    let stage = serde_json::to_string(&session.stage)
        .map_err(|e| Error::Internal(format!("Failed to serialize stage: {}", e)))?;
    let progress = serde_json::to_string(&session.progress)
        .map_err(|e| Error::Internal(format!("Failed to serialize progress: {}", e)))?;
    let started_at = session.started_at.map(|dt| dt.to_rfc3339());
    let completed_at = session.completed_at.map(|dt| dt.to_rfc3339());

    let result = sqlx::query(&format!(
        r#"
        UPDATE searches SET
            status = ?,
            stage = ?,
            progress = ?,
            error = ?,
            contacts_found = ?,
            contacts_imported = ?,
            started_at = ?,
            completed_at = ?
        WHERE search_id = ? AND status NOT IN {}
        "#,
        TERMINAL_STATUSES
    ))
    .bind(&status)
    .bind(&stage)
    .bind(&progress)
    .bind(&session.error)
    .bind(session.contacts_found as i64)
    .bind(session.contacts_imported as i64)
    .bind(&started_at)
    .bind(&completed_at)
    .bind(session.search_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn session_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<SearchSession> {
    let search_id_str: String = row.get("search_id");
    let search_id = Uuid::parse_str(&search_id_str)
        .map_err(|e| Error::Internal(format!("Failed to parse search_id: {}", e)))?;

    let user_id_str: String = row.get("user_id");
    let user_id = Uuid::parse_str(&user_id_str)
        .map_err(|e| Error::Internal(format!("Failed to parse user_id: {}", e)))?;

    let status: String = row.get("status");
    let status: SearchStatus = serde_json::from_str(&status)
        .map_err(|e| Error::Internal(format!("Failed to deserialize status: {}", e)))?;

    let stage: String = row.get("stage");
    let stage: SearchStage = serde_json::from_str(&stage)
        .map_err(|e| Error::Internal(format!("Failed to deserialize stage: {}", e)))?;

    let configuration: String = row.get("configuration");
    let configuration: SearchConfiguration = serde_json::from_str(&configuration)
        .map_err(|e| Error::Internal(format!("Failed to deserialize configuration: {}", e)))?;

    let progress: String = row.get("progress");
    let progress: ProgressSnapshot = serde_json::from_str(&progress)
        .map_err(|e| Error::Internal(format!("Failed to deserialize progress: {}", e)))?;

    let created_at = parse_timestamp(row.get("created_at"))?;
    let started_at = parse_optional_timestamp(row.get("started_at"))?;
    let completed_at = parse_optional_timestamp(row.get("completed_at"))?;

    Ok(SearchSession {
        search_id,
        user_id,
        status,
        stage,
        configuration,
        progress,
        error: row.get("error"),
        contacts_found: row.get::<i64, _>("contacts_found") as u32,
        contacts_imported: row.get::<i64, _>("contacts_imported") as u32,
        created_at,
        started_at,
        completed_at,
    })
}

fn parse_timestamp(value: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp: {}", e)))
}

fn parse_optional_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.map(parse_timestamp).transpose()
}

const SELECT_COLUMNS: &str = r#"
    SELECT search_id, user_id, status, stage, configuration, progress,
           error, contacts_found, contacts_imported,
           created_at, started_at, completed_at
    FROM searches
"#;

/// Load a search by id, None if not found
pub async fn load_search(pool: &SqlitePool, search_id: Uuid) -> Result<Option<SearchSession>> {
    let row = sqlx::query(&format!("{} WHERE search_id = ?", SELECT_COLUMNS))
        .bind(search_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(session_from_row).transpose()
}

/// Load a user's searches submitted at or after the cutoff, newest first
pub async fn list_user_searches(
    pool: &SqlitePool,
    user_id: Uuid,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<SearchSession>> {
    let cutoff = since
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
        .to_rfc3339();

    let rows = sqlx::query(&format!(
        "{} WHERE user_id = ? AND created_at >= ? ORDER BY created_at DESC",
        SELECT_COLUMNS
    ))
    .bind(user_id.to_string())
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    rows.iter().map(session_from_row).collect()
}

/// Append discovered sources for a search
pub async fn append_sources(pool: &SqlitePool, sources: &[SearchSource]) -> Result<()> {
    for source in sources {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO search_sources (
                id, search_id, url, title, snippet, query, rank, discovered_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(source.id.to_string())
        .bind(source.search_id.to_string())
        .bind(&source.url)
        .bind(&source.title)
        .bind(&source.snippet)
        .bind(&source.query)
        .bind(source.rank as i64)
        .bind(source.discovered_at.to_rfc3339())
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Append extracted contacts for a search
pub async fn append_contacts(pool: &SqlitePool, contacts: &[ExtractedContact]) -> Result<()> {
    for contact in contacts {
        let verification = serde_json::to_string(&contact.verification)
            .map_err(|e| Error::Internal(format!("Failed to serialize verification: {}", e)))?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO extracted_contacts (
                id, search_id, name, title, outlet, email, profile_url,
                confidence, relevance, quality, verification,
                source_url, extraction_method, extracted_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(contact.id.to_string())
        .bind(contact.search_id.to_string())
        .bind(&contact.name)
        .bind(&contact.title)
        .bind(&contact.outlet)
        .bind(&contact.email)
        .bind(&contact.profile_url)
        .bind(contact.confidence)
        .bind(contact.relevance)
        .bind(contact.quality)
        .bind(&verification)
        .bind(&contact.source_url)
        .bind(&contact.extraction_method)
        .bind(contact.extracted_at.to_rfc3339())
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Load contacts extracted for a search, highest confidence first
pub async fn load_contacts(pool: &SqlitePool, search_id: Uuid) -> Result<Vec<ExtractedContact>> {
    let rows = sqlx::query(
        r#"
        SELECT id, search_id, name, title, outlet, email, profile_url,
               confidence, relevance, quality, verification,
               source_url, extraction_method, extracted_at
        FROM extracted_contacts
        WHERE search_id = ?
        ORDER BY confidence DESC
        "#,
    )
    .bind(search_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let id_str: String = row.get("id");
            let id = Uuid::parse_str(&id_str)
                .map_err(|e| Error::Internal(format!("Failed to parse contact id: {}", e)))?;

            let verification: String = row.get("verification");
            let verification = serde_json::from_str(&verification)
                .map_err(|e| Error::Internal(format!("Failed to deserialize verification: {}", e)))?;

            Ok(ExtractedContact {
                id,
                search_id,
                name: row.get("name"),
                title: row.get("title"),
                outlet: row.get("outlet"),
                email: row.get("email"),
                profile_url: row.get("profile_url"),
                confidence: row.get("confidence"),
                relevance: row.get("relevance"),
                quality: row.get("quality"),
                verification,
                source_url: row.get("source_url"),
                extraction_method: row.get("extraction_method"),
                extracted_at: parse_timestamp(row.get("extracted_at"))?,
            })
        })
        .collect()
}

/// Count sources discovered for a search
pub async fn count_sources(pool: &SqlitePool, search_id: Uuid) -> Result<u32> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM search_sources WHERE search_id = ?")
        .bind(search_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count as u32)
}

/// Cleanup stale searches on startup
///
/// Any search not in a terminal status when the service starts belongs to a
/// previous run. Its pipeline task died with that process, so the search
/// will never progress. Mark these as CANCELLED.
pub async fn cleanup_stale_searches(pool: &SqlitePool) -> Result<usize> {
    let result = sqlx::query(&format!(
        r#"
        UPDATE searches
        SET status = '"CANCELLED"',
            completed_at = ?,
            error = 'Search cancelled - service was restarted'
        WHERE status NOT IN {}
        "#,
        TERMINAL_STATUSES
    ))
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() as usize)
}
