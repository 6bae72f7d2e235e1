//! Meditation record persistence
//!
//! **[GEN-DB-020]** One row per generation attempt. The owning job is the
//! only writer until a terminal state, except the title/description side
//! task which writes exactly two columns and tolerates the record having
//! reached a terminal state already.

use calma_common::{with_backoff, Error, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::lock_retry_policy;
use crate::models::{MeditationOutput, MeditationRecord, MeditationStatus};

/// Insert the initial record in `pending` state
pub async fn insert(pool: &SqlitePool, record: &MeditationRecord) -> Result<()> {
    let id = record.id.to_string();
    let script = record
        .script
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let created_at = record.created_at.to_rfc3339();
    let completed_at = record.completed_at.map(|dt| dt.to_rfc3339());

    with_backoff(
        "meditation insert",
        lock_retry_policy(),
        Error::is_transient,
        || async {
            sqlx::query(
                r#"
                INSERT INTO meditations (
                    id, user_id, duration_seconds, language_code, is_beginner,
                    purpose, voice_id, background_track, status, script,
                    technique, title, description, storage_path, error_message,
                    created_at, completed_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(&record.user_id)
            .bind(record.duration_seconds as i64)
            .bind(&record.language_code)
            .bind(record.is_beginner as i64)
            .bind(&record.purpose)
            .bind(&record.voice_id)
            .bind(&record.background_track)
            .bind(record.status.as_str())
            .bind(&script)
            .bind(&record.technique)
            .bind(&record.title)
            .bind(&record.description)
            .bind(&record.storage_path)
            .bind(&record.error_message)
            .bind(&created_at)
            .bind(&completed_at)
            .execute(pool)
            .await
            .map_err(Error::Database)?;
            Ok(())
        },
    )
    .await
}

/// Persist the generated script and advance to `script_generated`
pub async fn mark_script_generated(
    pool: &SqlitePool,
    id: Uuid,
    script: &MeditationOutput,
    technique: &str,
) -> Result<()> {
    let id = id.to_string();
    let script_json = serde_json::to_string(script)?;

    with_backoff(
        "meditation script update",
        lock_retry_policy(),
        Error::is_transient,
        || async {
            sqlx::query(
                "UPDATE meditations SET script = ?, technique = ?, status = 'script_generated' WHERE id = ?",
            )
            .bind(&script_json)
            .bind(technique)
            .bind(&id)
            .execute(pool)
            .await
            .map_err(Error::Database)?;
            Ok(())
        },
    )
    .await
}

/// Persist the final audio path and advance to `completed`
pub async fn mark_completed(
    pool: &SqlitePool,
    id: Uuid,
    storage_path: &str,
    completed_at: DateTime<Utc>,
) -> Result<()> {
    let id = id.to_string();
    let completed_at = completed_at.to_rfc3339();

    with_backoff(
        "meditation completion update",
        lock_retry_policy(),
        Error::is_transient,
        || async {
            sqlx::query(
                "UPDATE meditations SET storage_path = ?, completed_at = ?, status = 'completed' WHERE id = ?",
            )
            .bind(storage_path)
            .bind(&completed_at)
            .bind(&id)
            .execute(pool)
            .await
            .map_err(Error::Database)?;
            Ok(())
        },
    )
    .await
}

/// Record terminal failure with the error message
pub async fn mark_failed(pool: &SqlitePool, id: Uuid, message: &str) -> Result<()> {
    let id = id.to_string();

    sqlx::query("UPDATE meditations SET error_message = ?, status = 'failed' WHERE id = ?")
        .bind(message)
        .bind(&id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Write the asynchronously generated title/description.
///
/// Deliberately ignores the record's status: the side task may resolve
/// after the job has already completed or failed.
pub async fn set_title_description(
    pool: &SqlitePool,
    id: Uuid,
    title: &str,
    description: &str,
) -> Result<()> {
    let id = id.to_string();

    sqlx::query("UPDATE meditations SET title = ?, description = ? WHERE id = ?")
        .bind(title)
        .bind(description)
        .bind(&id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Load a record by id
pub async fn load(pool: &SqlitePool, id: Uuid) -> Result<Option<MeditationRecord>> {
    let id_str = id.to_string();

    let row = sqlx::query(
        r#"
        SELECT id, user_id, duration_seconds, language_code, is_beginner,
               purpose, voice_id, background_track, status, script,
               technique, title, description, storage_path, error_message,
               created_at, completed_at
        FROM meditations
        WHERE id = ?
        "#,
    )
    .bind(&id_str)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let status: String = row.get("status");
    let status = MeditationStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Unknown meditation status: {}", status)))?;

    let script: Option<String> = row.get("script");
    let script: Option<MeditationOutput> = script
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to deserialize script: {}", e)))?;

    let created_at: String = row.get("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::Internal(format!("Failed to parse created_at: {}", e)))?
        .with_timezone(&Utc);

    let completed_at: Option<String> = row.get("completed_at");
    let completed_at = completed_at
        .map(|s| DateTime::parse_from_rfc3339(&s))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to parse completed_at: {}", e)))?
        .map(|dt| dt.with_timezone(&Utc));

    Ok(Some(MeditationRecord {
        id,
        user_id: row.get("user_id"),
        duration_seconds: row.get::<i64, _>("duration_seconds") as u32,
        language_code: row.get("language_code"),
        is_beginner: row.get::<i64, _>("is_beginner") != 0,
        purpose: row.get("purpose"),
        voice_id: row.get("voice_id"),
        background_track: row.get("background_track"),
        status,
        script,
        technique: row.get("technique"),
        title: row.get("title"),
        description: row.get("description"),
        storage_path: row.get("storage_path"),
        error_message: row.get("error_message"),
        created_at,
        completed_at,
    }))
}

/// Whether the user already has a generation in flight.
///
/// The edge layer refuses new requests while this holds; the query lives
/// here because the status column is owned by this crate.
pub async fn has_active_for_user(pool: &SqlitePool, user_id: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM meditations WHERE user_id = ? AND status IN ('pending', 'script_generated')",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}
