//! Movie ingestion coordinator: dedup check, cover pipeline, transcode
//! orchestration and catalog persistence under one transaction.

use crate::adapters::fs::{file_exists, remove_quietly};
use crate::application::covers::process_and_upload_cover;
use crate::application::transcode::Transcoder;
use crate::config::AppConfig;
use crate::db;
use crate::db::audit::{configure_audit_context, AuditContext};
use crate::db::movies::{MovieChanges, NewMovieRow};
use crate::domain::hash::sha256_hex_of_file;
use crate::error::{Error, Result};
use crate::ports::media::{MediaProbePort, Progress, TranscodePort};
use crate::ports::storage::ObjectStorePort;
use sqlx::{Connection, PgPool};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct MovieUpload {
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub release_year: i32,
    pub video_path: PathBuf,
    pub cover_path: PathBuf,
}

#[derive(Debug, Default)]
pub struct MovieUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub release_year: Option<i32>,
    pub cover_path: Option<PathBuf>,
}

pub struct MoviesService<P, E, S> {
    pool: PgPool,
    storage: S,
    transcoder: Transcoder<P, E, S>,
    tmp_root: PathBuf,
    video_prefix: String,
    cover_prefix: String,
}

impl<P, E, S> MoviesService<P, E, S>
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

    /// Ingest a movie. The spooled video and cover files are removed on
    /// every exit path, success and failure alike.
    pub async fn create(
        &self,
        upload: MovieUpload,
        actor: &AuditContext,
        on_progress: &Progress<'_>,
    ) -> Result<i32> {
        let result = self.ingest(&upload, actor, on_progress).await;
        remove_quietly(&upload.video_path).await;
        remove_quietly(&upload.cover_path).await;
        result
    }

    async fn ingest(
        &self,
        upload: &MovieUpload,
        actor: &AuditContext,
        on_progress: &Progress<'_>,
    ) -> Result<i32> {
        if !file_exists(&upload.video_path).await {
            return Err(Error::NotFound(upload.video_path.clone()));
        }
        if !file_exists(&upload.cover_path).await {
            return Err(Error::NotFound(upload.cover_path.clone()));
        }

        // Dedup before any transaction or encode: re-ingesting known bytes
        // must not cost an encode.
        let video_hash = sha256_hex_of_file(&upload.video_path).await?;
        if db::videos::find_id_by_hash(&self.pool, &video_hash)
            .await?
            .is_some()
        {
            return Err(Error::DuplicateContent(video_hash));
        }

        let mut conn = self.pool.acquire().await?;
        configure_audit_context(&mut conn, actor).await?;
        let mut tx = conn.begin().await?;

        let cover_hash = sha256_hex_of_file(&upload.cover_path).await?;
        process_and_upload_cover(
            &self.storage,
            &self.tmp_root,
            &self.cover_prefix,
            &upload.cover_path,
            &cover_hash,
        )
        .await?;

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
        let movie_id = db::movies::insert_movie(
            &mut *tx,
            &NewMovieRow {
                title: upload.title.clone(),
                cover_image: cover_hash,
                description: upload.description.clone(),
                category_id: upload.category_id,
                video_id,
                release_year: upload.release_year,
            },
        )
        .await?;

        // dropping an uncommitted transaction rolls it back, so every `?`
        // above already covers the failure paths
        tx.commit().await?;
        tracing::info!(movie_id, video_id, hash = %video_hash, "movie ingested");
        Ok(movie_id)
    }

    /// Partial update; a new cover replaces the old one in the store before
    /// the column update.
    pub async fn update(&self, id: i32, update: MovieUpdate) -> Result<i32> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let movie = db::movies::find_movie(&mut *tx, id).await?;

        let mut changes = MovieChanges {
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
            self.storage
                .delete_prefix(&format!("{}/{}", self.cover_prefix, movie.cover_image))
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

        let updated = db::movies::update_movie(&mut *tx, id, &changes).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Delete the movie, its video row, and the remote objects under both
    /// the video and cover prefixes.
    pub async fn delete(&self, id: i32) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let movie = db::movies::find_movie(&mut *tx, id).await?;
        let video = db::videos::get_video(&mut *tx, movie.video_id).await?;

        db::movies::delete_movie(&mut *tx, id).await?;
        db::videos::delete_video(&mut *tx, movie.video_id).await?;

        self.storage
            .delete_prefix(&format!("{}/{}", self.cover_prefix, movie.cover_image))
            .await?;
        self.storage
            .delete_prefix(&format!("{}/{}", self.video_prefix, video.file_hash))
            .await?;

        tx.commit().await?;
        tracing::info!(movie_id = id, hash = %video.file_hash, "movie deleted");
        Ok(())
    }
}
