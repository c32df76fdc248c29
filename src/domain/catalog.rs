//! Catalog row types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// One processed content asset, keyed by its content hash. Never mutated
/// after creation; replacement means delete + recreate.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Video {
    pub id: i32,
    pub file_hash: String,
    pub available_resolutions: Vec<i32>,
    pub available_subtitles: Vec<String>,
    pub duration: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Movie {
    pub id: i32,
    pub title: String,
    pub title_normalized: String,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub video_id: i32,
    pub cover_image: String,
    pub release_year: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Series {
    pub id: i32,
    pub title: String,
    pub title_normalized: String,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub cover_image: String,
    pub release_year: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Episode {
    pub id: i32,
    pub serie_id: i32,
    pub season: i32,
    pub episode_number: i32,
    pub title: String,
    pub description: Option<String>,
    pub video_id: i32,
    pub created_at: DateTime<Utc>,
}
