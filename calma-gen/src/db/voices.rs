//! Voice and background-track catalog queries
//!
//! The fallback voice is data (`is_default` column), not a literal in
//! business logic; resolution happens once per job at audio-generator
//! construction.

use calma_common::{Error, Result};
use sqlx::{Row, SqlitePool};

/// Voice catalog row
#[derive(Debug, Clone)]
pub struct Voice {
    pub voice_id: String,
    pub name: String,
    /// Speech speed passed to the synthesis service
    pub speed: f64,
    pub price_multiplier: f64,
    pub is_default: bool,
}

/// Background track catalog row
#[derive(Debug, Clone)]
pub struct BgTrack {
    pub bgtrack_id: String,
    pub name: String,
    pub price_multiplier: f64,
}

fn voice_from_row(row: &sqlx::sqlite::SqliteRow) -> Voice {
    Voice {
        voice_id: row.get("voice_id"),
        name: row.get("name"),
        speed: row.get("speed"),
        price_multiplier: row.get("price_multiplier"),
        is_default: row.get::<i64, _>("is_default") != 0,
    }
}

/// Look up a voice by id
pub async fn get_voice(pool: &SqlitePool, voice_id: &str) -> Result<Option<Voice>> {
    let row = sqlx::query(
        "SELECT voice_id, name, speed, price_multiplier, is_default FROM voices WHERE voice_id = ?",
    )
    .bind(voice_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(voice_from_row))
}

/// The catalog default voice. A catalog without one is a deployment error.
pub async fn default_voice(pool: &SqlitePool) -> Result<Voice> {
    let row = sqlx::query(
        "SELECT voice_id, name, speed, price_multiplier, is_default FROM voices WHERE is_default = 1 LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    row.as_ref()
        .map(voice_from_row)
        .ok_or_else(|| Error::NotFound("No default voice configured in catalog".into()))
}

/// Look up a background track by id
pub async fn get_bg_track(pool: &SqlitePool, bgtrack_id: &str) -> Result<Option<BgTrack>> {
    let row = sqlx::query(
        "SELECT bgtrack_id, name, price_multiplier FROM bg_tracks WHERE bgtrack_id = ?",
    )
    .bind(bgtrack_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| BgTrack {
        bgtrack_id: row.get("bgtrack_id"),
        name: row.get("name"),
        price_multiplier: row.get("price_multiplier"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    #[tokio::test]
    async fn default_voice_is_seeded() {
        let pool = init_memory_pool().await.unwrap();
        let voice = default_voice(&pool).await.unwrap();
        assert!(voice.is_default);
        assert_eq!(voice.name, "Charlotte");
    }

    #[tokio::test]
    async fn unknown_voice_is_none() {
        let pool = init_memory_pool().await.unwrap();
        assert!(get_voice(&pool, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bg_track_lookup() {
        let pool = init_memory_pool().await.unwrap();
        let track = get_bg_track(&pool, "gentle").await.unwrap().unwrap();
        assert_eq!(track.name, "Gentle");
        assert!(get_bg_track(&pool, "missing").await.unwrap().is_none());
    }
}
