//! Per-user credit accounting
//!
//! **[GEN-DB-030]** Credits are deducted only after the completion update
//! is durable; a failed job must never consume quota. The ordering is
//! enforced by the orchestrator; this module only provides the counter.

use calma_common::{with_backoff, Error, Result};
use sqlx::SqlitePool;

use crate::db::lock_retry_policy;

/// Increment the user's credits-used counter, creating the profile row if
/// the user has never consumed credits before.
pub async fn add_credits_used(pool: &SqlitePool, user_id: &str, credits: u32) -> Result<()> {
    with_backoff(
        "credit deduction",
        lock_retry_policy(),
        Error::is_transient,
        || async {
            sqlx::query(
                r#"
                INSERT INTO profiles (id, meditation_credits_used) VALUES (?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    meditation_credits_used = meditation_credits_used + excluded.meditation_credits_used
                "#,
            )
            .bind(user_id)
            .bind(credits as i64)
            .execute(pool)
            .await
            .map_err(Error::Database)?;
            Ok(())
        },
    )
    .await
}

/// Current credits-used counter, zero for unknown users
pub async fn credits_used(pool: &SqlitePool, user_id: &str) -> Result<i64> {
    let used: Option<i64> =
        sqlx::query_scalar("SELECT meditation_credits_used FROM profiles WHERE id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(used.unwrap_or(0))
}

/// Job cost: ceil(minutes x voice multiplier x track multiplier)
pub fn job_cost(duration_minutes: u32, voice_multiplier: f64, track_multiplier: f64) -> u32 {
    (duration_minutes as f64 * voice_multiplier * track_multiplier).ceil() as u32
}
