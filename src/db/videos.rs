use crate::domain::catalog::Video;
use crate::error::{Error, Result};
use sqlx::PgExecutor;

const VIDEO_COLUMNS: &str =
    "id, file_hash, available_resolutions, available_subtitles, duration, created_at";

/// Dedup probe: the id of the video carrying this content hash, if any.
pub async fn find_id_by_hash(db: impl PgExecutor<'_>, file_hash: &str) -> Result<Option<i32>> {
    let id = sqlx::query_scalar::<_, i32>("SELECT id FROM videos WHERE file_hash = $1 LIMIT 1")
        .bind(file_hash)
        .fetch_optional(db)
        .await?;
    Ok(id)
}

pub async fn get_video(db: impl PgExecutor<'_>, id: i32) -> Result<Video> {
    sqlx::query_as::<_, Video>(&format!(
        "SELECT {} FROM videos WHERE id = $1",
        VIDEO_COLUMNS
    ))
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| Error::MissingRecord(format!("video {}", id)))
}

/// Insert the processed asset. The UNIQUE(file_hash) constraint resolves
/// the race where two ingestions of identical bytes both pass the
/// pre-transaction dedup check: the loser lands here with zero rows.
pub async fn insert_video(
    db: impl PgExecutor<'_>,
    file_hash: &str,
    available_resolutions: &[i32],
    available_subtitles: &[String],
    duration: f64,
) -> Result<i32> {
    sqlx::query_scalar::<_, i32>(
        "INSERT INTO videos (file_hash, available_resolutions, available_subtitles, duration) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (file_hash) DO NOTHING \
         RETURNING id",
    )
    .bind(file_hash)
    .bind(available_resolutions)
    .bind(available_subtitles)
    .bind(duration)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| Error::DuplicateContent(file_hash.to_string()))
}

pub async fn delete_video(db: impl PgExecutor<'_>, id: i32) -> Result<()> {
    sqlx::query("DELETE FROM videos WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}
