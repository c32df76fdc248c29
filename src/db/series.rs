use crate::domain::catalog::Series;
use crate::error::{Error, Result};
use sqlx::{FromRow, PgExecutor};

const SERIES_COLUMNS: &str = "id, title, title_normalized, description, category_id, \
                              cover_image, release_year, created_at";

pub struct NewSeriesRow {
    pub title: String,
    pub cover_image: String,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub release_year: i32,
}

#[derive(Debug, Default)]
pub struct SeriesChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub release_year: Option<i32>,
    pub cover_image: Option<String>,
}

/// Everything the delete flow needs to know before the rows disappear:
/// remote cover location plus the content hashes of every episode video.
#[derive(Debug, FromRow)]
pub struct SeriesDeleteInfo {
    pub id: i32,
    pub title: String,
    pub cover_image: String,
    pub total_episodes: i64,
    pub video_hashes: Vec<String>,
}

pub async fn find_series(db: impl PgExecutor<'_>, id: i32) -> Result<Series> {
    sqlx::query_as::<_, Series>(&format!(
        "SELECT {} FROM series WHERE id = $1",
        SERIES_COLUMNS
    ))
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| Error::MissingRecord(format!("series {}", id)))
}

pub async fn exists_by_title_and_year(
    db: impl PgExecutor<'_>,
    title: &str,
    release_year: i32,
) -> Result<bool> {
    let id = sqlx::query_scalar::<_, i32>(
        "SELECT id FROM series WHERE title_normalized = lower($1) AND release_year = $2 LIMIT 1",
    )
    .bind(title)
    .bind(release_year)
    .fetch_optional(db)
    .await?;
    Ok(id.is_some())
}

/// Series dedup on the cover image's content hash.
pub async fn cover_exists(db: impl PgExecutor<'_>, cover_hash: &str) -> Result<bool> {
    let id = sqlx::query_scalar::<_, i32>("SELECT id FROM series WHERE cover_image = $1 LIMIT 1")
        .bind(cover_hash)
        .fetch_optional(db)
        .await?;
    Ok(id.is_some())
}

pub async fn insert_series(db: impl PgExecutor<'_>, new: &NewSeriesRow) -> Result<i32> {
    sqlx::query_scalar::<_, i32>(
        "INSERT INTO series (title, cover_image, description, category_id, release_year) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (title_normalized, release_year) DO NOTHING \
         RETURNING id",
    )
    .bind(&new.title)
    .bind(&new.cover_image)
    .bind(&new.description)
    .bind(new.category_id)
    .bind(new.release_year)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| Error::AlreadyExists(format!("series '{}' ({})", new.title, new.release_year)))
}

pub async fn update_series(
    db: impl PgExecutor<'_>,
    id: i32,
    changes: &SeriesChanges,
) -> Result<i32> {
    sqlx::query_scalar::<_, i32>(
        "UPDATE series SET \
            title = COALESCE($2, title), \
            description = COALESCE($3, description), \
            category_id = COALESCE($4, category_id), \
            release_year = COALESCE($5, release_year), \
            cover_image = COALESCE($6, cover_image) \
         WHERE id = $1 \
         RETURNING id",
    )
    .bind(id)
    .bind(&changes.title)
    .bind(&changes.description)
    .bind(changes.category_id)
    .bind(changes.release_year)
    .bind(&changes.cover_image)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| Error::MissingRecord(format!("series {}", id)))
}

pub async fn delete_info(db: impl PgExecutor<'_>, id: i32) -> Result<SeriesDeleteInfo> {
    sqlx::query_as::<_, SeriesDeleteInfo>(
        "SELECT s.id, s.title, s.cover_image, \
                COUNT(ep.id) AS total_episodes, \
                COALESCE(array_agg(DISTINCT vi.file_hash) \
                         FILTER (WHERE vi.file_hash IS NOT NULL), '{}') AS video_hashes \
         FROM series s \
         LEFT JOIN episodes ep ON ep.serie_id = s.id \
         LEFT JOIN videos vi ON vi.id = ep.video_id \
         WHERE s.id = $1 \
         GROUP BY s.id, s.title, s.cover_image",
    )
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| Error::MissingRecord(format!("series {}", id)))
}

/// The row delete; episodes cascade via their FK and each episode's video
/// row falls to the cleanup trigger.
pub async fn delete_series(db: impl PgExecutor<'_>, id: i32) -> Result<()> {
    let result = sqlx::query("DELETE FROM series WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::MissingRecord(format!("series {}", id)));
    }
    Ok(())
}
