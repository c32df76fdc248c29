//! Series and episode coordinators.
//!
//! A series is created without a video; episodes attach one each. Deleting
//! a series removes the remote files for every episode video first, then
//! lets the database cascade take the rows (episodes via FK, their video
//! rows via trigger).

use crate::adapters::fs::{file_exists, remove_quietly};
use crate::application::covers::process_and_upload_cover;
use crate::application::transcode::Transcoder;
use crate::config::AppConfig;
use crate::db;
use crate::db::audit::{configure_audit_context, AuditContext};
use crate::db::episodes::{EpisodeChanges, NewEpisodeRow};
use crate::db::series::{NewSeriesRow, SeriesChanges};
use crate::domain::hash::sha256_hex_of_file;
use crate::error::{Error, Result};
use crate::ports::media::{MediaProbePort, Progress, TranscodePort};
use crate::ports::storage::ObjectStorePort;
use sqlx::{Connection, PgPool};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SeriesUpload {
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub release_year: i32,
    pub cover_path: PathBuf,
}

#[derive(Debug, Default)]
pub struct SeriesUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub release_year: Option<i32>,
    pub cover_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct EpisodeUpload {
    pub serie_id: i32,
    pub season: i32,
    pub episode_number: i32,
    pub title: String,
    pub description: Option<String>,
    pub video_path: PathBuf,
}

/// What the series delete flow actually removed.
#[derive(Debug)]
pub struct SeriesDeleteOutcome {
    pub episodes_deleted: i64,
    pub videos_deleted: usize,
}

pub struct SeriesService<P, E, S> {
    pool: PgPool,
    storage: S,
    transcoder: Transcoder<P, E, S>,
    tmp_root: PathBuf,
    video_prefix: String,
    cover_prefix: String,
}

impl<P, E, S> SeriesService<P, E, S>
where
    P: MediaProbePort,
    E: TranscodePort,
    S: ObjectStorePort + Clone,
{
    pub fn new(pool: PgPool, probe: P, encoder: E, storage: S, cfg: &AppConfig) -> Self {
        let transcoder = Transcoder::new(
            probe,
            encoder,
            storage.clone(),
            cfg.temp_processing_dir.clone(),
            cfg.video_prefix.clone(),
        );
        Self {
            pool,
            storage,
            transcoder,
            tmp_root: PathBuf::from(&cfg.temp_processing_dir),
            video_prefix: cfg.video_prefix.clone(),
            cover_prefix: cfg.cover_prefix.clone(),
        }
    }

    /// Create a series record (cover only; episodes bring the videos).
    pub async fn create(&self, upload: SeriesUpload, actor: &AuditContext) -> Result<i32> {
        let result = self.create_inner(&upload, actor).await;
        remove_quietly(&upload.cover_path).await;
        result
    }

    async fn create_inner(&self, upload: &SeriesUpload, actor: &AuditContext) -> Result<i32> {
        if !file_exists(&upload.cover_path).await {
            return Err(Error::NotFound(upload.cover_path.clone()));
        }

        let cover_hash = sha256_hex_of_file(&upload.cover_path).await?;
        if db::series::cover_exists(&self.pool, &cover_hash).await? {
            return Err(Error::DuplicateContent(cover_hash));
        }
        if db::series::exists_by_title_and_year(&self.pool, &upload.title, upload.release_year)
            .await?
        {
            return Err(Error::AlreadyExists(format!(
                "series '{}' ({})",
                upload.title, upload.release_year
            )));
        }

        let mut conn = self.pool.acquire().await?;
        configure_audit_context(&mut conn, actor).await?;
        let mut tx = conn.begin().await?;

        process_and_upload_cover(
            &self.storage,
            &self.tmp_root,
            &self.cover_prefix,
            &upload.cover_path,
            &cover_hash,
        )
        .await?;

        let series_id = db::series::insert_series(
            &mut *tx,
            &NewSeriesRow {
                title: upload.title.clone(),
                cover_image: cover_hash,
                description: upload.description.clone(),
                category_id: upload.category_id,
                release_year: upload.release_year,
            },
        )
        .await?;

        tx.commit().await?;
        tracing::info!(series_id, "series created");
        Ok(series_id)
    }

    pub async fn update(&self, id: i32, update: SeriesUpdate) -> Result<i32> {
        if let (Some(title), Some(year)) = (&update.title, update.release_year) {
            if db::series::exists_by_title_and_year(&self.pool, title, year).await? {
                return Err(Error::AlreadyExists(format!("series '{}' ({})", title, year)));
            }
        }

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let series = db::series::find_series(&mut *tx, id).await?;

        let mut changes = SeriesChanges {
            title: update.title,
            description: update.description,
            category_id: update.category_id,
            release_year: update.release_year,
            cover_image: None,
        };

        if let Some(cover_path) = &update.cover_path {
            if !file_exists(cover_path).await {
                return Err(Error::NotFound(cover_path.clone()));
            }
            let cover_hash = sha256_hex_of_file(cover_path).await?;
            if db::series::cover_exists(&self.pool, &cover_hash).await? {
                return Err(Error::DuplicateContent(cover_hash));
            }
            self.storage
                .delete_prefix(&format!("{}/{}", self.cover_prefix, series.cover_image))
                .await?;
            process_and_upload_cover(
                &self.storage,
                &self.tmp_root,
                &self.cover_prefix,
                cover_path,
                &cover_hash,
            )
            .await?;
            remove_quietly(cover_path).await;
            changes.cover_image = Some(cover_hash);
        }

        let updated = db::series::update_series(&mut *tx, id, &changes).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Delete a series: remote files first (best effort per video), then the
    /// series row. Episodes and their video rows fall to the database's
    /// cascade and cleanup trigger.
    pub async fn delete(&self, id: i32) -> Result<SeriesDeleteOutcome> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let info = db::series::delete_info(&mut *tx, id).await?;
        tracing::info!(
            series_id = id,
            title = %info.title,
            episodes = info.total_episodes,
            "deleting series"
        );

        for hash in &info.video_hashes {
            let prefix = format!("{}/{}", self.video_prefix, hash);
            if let Err(e) = self.storage.delete_prefix(&prefix).await {
                tracing::warn!(prefix, error = %e, "failed to delete episode video objects");
            }
        }
        let cover_prefix = format!("{}/{}", self.cover_prefix, info.cover_image);
        if let Err(e) = self.storage.delete_prefix(&cover_prefix).await {
            tracing::warn!(prefix = cover_prefix, error = %e, "failed to delete cover objects");
        }

        db::series::delete_series(&mut *tx, id).await?;
        tx.commit().await?;

        Ok(SeriesDeleteOutcome {
            episodes_deleted: info.total_episodes,
            videos_deleted: info.video_hashes.len(),
        })
    }

    /// Ingest one episode for an existing series.
    pub async fn create_episode(
        &self,
        upload: EpisodeUpload,
        actor: &AuditContext,
        on_progress: &Progress<'_>,
    ) -> Result<i32> {
        let result = self.create_episode_inner(&upload, actor, on_progress).await;
        remove_quietly(&upload.video_path).await;
        result
    }

    async fn create_episode_inner(
        &self,
        upload: &EpisodeUpload,
        actor: &AuditContext,
        on_progress: &Progress<'_>,
    ) -> Result<i32> {
        if !file_exists(&upload.video_path).await {
            return Err(Error::NotFound(upload.video_path.clone()));
        }

        let video_hash = sha256_hex_of_file(&upload.video_path).await?;
        if db::videos::find_id_by_hash(&self.pool, &video_hash)
            .await?
            .is_some()
        {
            return Err(Error::DuplicateContent(video_hash));
        }

        // the series must exist and the slot must be free before any encode
        db::series::find_series(&self.pool, upload.serie_id).await?;
        if db::episodes::find_episode_id(
            &self.pool,
            upload.serie_id,
            upload.season,
            upload.episode_number,
        )
        .await?
        .is_some()
        {
            return Err(Error::AlreadyExists(format!(
                "episode S{:02}E{:02} of series {}",
                upload.season, upload.episode_number, upload.serie_id
            )));
        }

        let mut conn = self.pool.acquire().await?;
        configure_audit_context(&mut conn, actor).await?;
        let mut tx = conn.begin().await?;

        let outcome = self
            .transcoder
            .transcode(&upload.video_path, &video_hash, on_progress)
            .await?;

        let video_id = db::videos::insert_video(
            &mut *tx,
            &video_hash,
            &outcome.available_resolutions,
            &outcome.available_subtitles,
            outcome.duration,
        )
        .await?;
        let episode_id = db::episodes::insert_episode(
            &mut *tx,
            &NewEpisodeRow {
                serie_id: upload.serie_id,
                season: upload.season,
                episode_number: upload.episode_number,
                title: upload.title.clone(),
                description: upload.description.clone(),
                video_id,
            },
        )
        .await?;

        tx.commit().await?;
        tracing::info!(episode_id, video_id, hash = %video_hash, "episode ingested");
        Ok(episode_id)
    }

    pub async fn update_episode(&self, id: i32, changes: EpisodeChanges) -> Result<i32> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let episode = db::episodes::get_episode(&mut *tx, id).await?;

        let target_serie = changes.serie_id.unwrap_or(episode.serie_id);
        let target_season = changes.season.unwrap_or(episode.season);
        let target_number = changes.episode_number.unwrap_or(episode.episode_number);

        if changes.serie_id.is_some() {
            db::series::find_series(&mut *tx, target_serie).await?;
        }
        if let Some(other) =
            db::episodes::find_episode_id(&mut *tx, target_serie, target_season, target_number)
                .await?
        {
            if other != episode.id {
                return Err(Error::AlreadyExists(format!(
                    "episode S{:02}E{:02} of series {}",
                    target_season, target_number, target_serie
                )));
            }
        }

        let updated = db::episodes::update_episode(&mut *tx, id, &changes).await?;
        tx.commit().await?;
        Ok(updated)
    }

    pub async fn delete_episode(&self, id: i32) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let episode = db::episodes::get_episode(&mut *tx, id).await?;
        let video = db::videos::get_video(&mut *tx, episode.video_id).await?;

        db::episodes::delete_episode(&mut *tx, id).await?;
        db::videos::delete_video(&mut *tx, episode.video_id).await?;

        self.storage
            .delete_prefix(&format!("{}/{}", self.video_prefix, video.file_hash))
            .await?;

        tx.commit().await?;
        tracing::info!(episode_id = id, hash = %video.file_hash, "episode deleted");
        Ok(())
    }
}

