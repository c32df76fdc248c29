use crate::domain::catalog::Episode;
use crate::error::{Error, Result};
use sqlx::PgExecutor;

const EPISODE_COLUMNS: &str =
    "id, serie_id, season, episode_number, title, description, video_id, created_at";

pub struct NewEpisodeRow {
    pub serie_id: i32,
    pub season: i32,
    pub episode_number: i32,
    pub title: String,
    pub description: Option<String>,
    pub video_id: i32,
}

#[derive(Debug, Default)]
pub struct EpisodeChanges {
    pub serie_id: Option<i32>,
    pub season: Option<i32>,
    pub episode_number: Option<i32>,
    pub title: Option<String>,
    pub description: Option<String>,
}

pub async fn get_episode(db: impl PgExecutor<'_>, id: i32) -> Result<Episode> {
    sqlx::query_as::<_, Episode>(&format!(
        "SELECT {} FROM episodes WHERE id = $1",
        EPISODE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| Error::MissingRecord(format!("episode {}", id)))
}

/// The id of the episode at (series, season, number), if any.
pub async fn find_episode_id(
    db: impl PgExecutor<'_>,
    serie_id: i32,
    season: i32,
    episode_number: i32,
) -> Result<Option<i32>> {
    let id = sqlx::query_scalar::<_, i32>(
        "SELECT id FROM episodes WHERE serie_id = $1 AND season = $2 AND episode_number = $3",
    )
    .bind(serie_id)
    .bind(season)
    .bind(episode_number)
    .fetch_optional(db)
    .await?;
    Ok(id)
}

pub async fn insert_episode(db: impl PgExecutor<'_>, new: &NewEpisodeRow) -> Result<i32> {
    sqlx::query_scalar::<_, i32>(
        "INSERT INTO episodes (serie_id, season, episode_number, title, description, video_id) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (serie_id, season, episode_number) DO NOTHING \
         RETURNING id",
    )
    .bind(new.serie_id)
    .bind(new.season)
    .bind(new.episode_number)
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.video_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| {
        Error::AlreadyExists(format!(
            "episode S{:02}E{:02} of series {}",
            new.season, new.episode_number, new.serie_id
        ))
    })
}

pub async fn update_episode(
    db: impl PgExecutor<'_>,
    id: i32,
    changes: &EpisodeChanges,
) -> Result<i32> {
    sqlx::query_scalar::<_, i32>(
        "UPDATE episodes SET \
            serie_id = COALESCE($2, serie_id), \
            season = COALESCE($3, season), \
            episode_number = COALESCE($4, episode_number), \
            title = COALESCE($5, title), \
            description = COALESCE($6, description) \
         WHERE id = $1 \
         RETURNING id",
    )
    .bind(id)
    .bind(changes.serie_id)
    .bind(changes.season)
    .bind(changes.episode_number)
    .bind(&changes.title)
    .bind(&changes.description)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| Error::MissingRecord(format!("episode {}", id)))
}

pub async fn delete_episode(db: impl PgExecutor<'_>, id: i32) -> Result<()> {
    sqlx::query("DELETE FROM episodes WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}
