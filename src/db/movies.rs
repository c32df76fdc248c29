use crate::domain::catalog::Movie;
use crate::error::{Error, Result};
use sqlx::PgExecutor;

const MOVIE_COLUMNS: &str = "id, title, title_normalized, description, category_id, video_id, \
                             cover_image, release_year, created_at";

pub struct NewMovieRow {
    pub title: String,
    pub cover_image: String,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub video_id: i32,
    pub release_year: i32,
}

#[derive(Debug, Default)]
pub struct MovieChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub release_year: Option<i32>,
    pub cover_image: Option<String>,
}

pub async fn find_movie(db: impl PgExecutor<'_>, id: i32) -> Result<Movie> {
    sqlx::query_as::<_, Movie>(&format!(
        "SELECT {} FROM movies WHERE id = $1",
        MOVIE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| Error::MissingRecord(format!("movie {}", id)))
}

/// Uniqueness guard insert: a conflict on (normalized title, year) yields
/// zero rows, surfaced as the typed `AlreadyExists` instead of a low-level
/// constraint error.
pub async fn insert_movie(db: impl PgExecutor<'_>, new: &NewMovieRow) -> Result<i32> {
    sqlx::query_scalar::<_, i32>(
        "INSERT INTO movies (title, cover_image, description, category_id, video_id, release_year) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (title_normalized, release_year) DO NOTHING \
         RETURNING id",
    )
    .bind(&new.title)
    .bind(&new.cover_image)
    .bind(&new.description)
    .bind(new.category_id)
    .bind(new.video_id)
    .bind(new.release_year)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| Error::AlreadyExists(format!("movie '{}' ({})", new.title, new.release_year)))
}

/// Partial column replacement; absent fields keep their current value.
pub async fn update_movie(db: impl PgExecutor<'_>, id: i32, changes: &MovieChanges) -> Result<i32> {
    sqlx::query_scalar::<_, i32>(
        "UPDATE movies SET \
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
    .ok_or_else(|| Error::MissingRecord(format!("movie {}", id)))
}

pub async fn delete_movie(db: impl PgExecutor<'_>, id: i32) -> Result<()> {
    sqlx::query("DELETE FROM movies WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}
