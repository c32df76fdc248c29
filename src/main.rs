//! HTTP front for the ingestion service.
//!
//! Thin by design: multipart uploads are streamed to the spool directory,
//! ingestion runs as a background task bounded by a semaphore, and clients
//! poll the task registry for progress. Validation and auth live upstream.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    BoxError, Json, Router,
};
use futures::{Stream, TryStreamExt};
use reelvault::adapters::ffmpeg::{FfmpegAdapter, FfprobeAdapter};
use reelvault::adapters::s3::S3ObjectStore;
use reelvault::application::movies::{MovieUpdate, MovieUpload, MoviesService};
use reelvault::application::series::{EpisodeUpload, SeriesService, SeriesUpdate, SeriesUpload};
use reelvault::db;
use reelvault::db::audit::AuditContext;
use reelvault::db::episodes::EpisodeChanges;
use reelvault::tasks::{TaskRegistry, TaskStatus};
use reelvault::{AppConfig, Error};
use serde_json::json;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::{fs::File, io::BufWriter};
use tokio_util::io::StreamReader;
use uuid::Uuid;

type Movies = MoviesService<FfprobeAdapter, FfmpegAdapter, S3ObjectStore>;
type Series = SeriesService<FfprobeAdapter, FfmpegAdapter, S3ObjectStore>;

#[derive(Clone)]
struct AppState {
    movies: Arc<Movies>,
    series: Arc<Series>,
    tasks: Arc<TaskRegistry>,
    ingest_slots: Arc<Semaphore>,
    upload_dir: PathBuf,
}

#[tokio::main]
async fn main() {
    let cfg = AppConfig::from_env();
    tracing_subscriber::fmt::init();

    let pool = db::connect(&cfg.database_url)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&pool).await.expect("Migrations failed");

    tokio::fs::create_dir_all(&cfg.upload_dir)
        .await
        .expect("Failed to create upload dir");
    tokio::fs::create_dir_all(&cfg.temp_processing_dir)
        .await
        .expect("Failed to create processing dir");

    let storage = S3ObjectStore::from_config(&cfg);
    let state = AppState {
        movies: Arc::new(MoviesService::new(
            pool.clone(),
            FfprobeAdapter::new(),
            FfmpegAdapter::new(),
            storage.clone(),
            &cfg,
        )),
        series: Arc::new(SeriesService::new(
            pool,
            FfprobeAdapter::new(),
            FfmpegAdapter::new(),
            storage,
            &cfg,
        )),
        tasks: Arc::new(TaskRegistry::new(Duration::from_secs(cfg.task_ttl_secs))),
        ingest_slots: Arc::new(Semaphore::new(cfg.max_concurrent_ingests)),
        upload_dir: PathBuf::from(&cfg.upload_dir),
    };

    let app = Router::new()
        .route("/movies", post(create_movie))
        .route("/movies/:id", axum::routing::patch(update_movie).delete(delete_movie))
        .route("/series", post(create_series))
        .route("/series/:id", axum::routing::patch(update_series).delete(delete_series))
        .route("/series/:id/episodes", post(create_episode))
        .route(
            "/episodes/:id",
            axum::routing::patch(update_episode).delete(delete_episode),
        )
        .route("/progress/:task_id", get(task_progress))
        .layer(DefaultBodyLimit::disable())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", cfg.addr, cfg.port))
        .await
        .expect("Failed to bind TCP listener");
    tracing::info!("listening at {}:{}", cfg.addr, cfg.port);
    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}

#[derive(Debug)]
struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let status = match &e {
            Error::NotFound(_) | Error::MissingRecord(_) => StatusCode::NOT_FOUND,
            Error::DuplicateContent(_) | Error::AlreadyExists(_) => StatusCode::CONFLICT,
            Error::NoPrimaryVideoStream | Error::CoverImage(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(status, e.to_string())
    }
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError(StatusCode::BAD_REQUEST, message.into())
}

/// Actor identity for the audit triggers. Authentication happens upstream;
/// by the time a request lands here the gateway has stamped these headers.
fn audit_from(headers: &HeaderMap) -> AuditContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string()
    };
    AuditContext {
        user_id: header("x-user-id"),
        client_ip: header("x-forwarded-for"),
    }
}

#[derive(Default)]
struct IngestForm {
    fields: HashMap<String, String>,
    files: HashMap<String, PathBuf>,
}

impl IngestForm {
    fn field(&self, name: &str) -> Result<String, ApiError> {
        self.fields
            .get(name)
            .cloned()
            .ok_or_else(|| bad_request(format!("missing field '{}'", name)))
    }

    fn int_field(&self, name: &str) -> Result<i32, ApiError> {
        self.field(name)?
            .parse()
            .map_err(|_| bad_request(format!("field '{}' must be an integer", name)))
    }

    fn opt_int_field(&self, name: &str) -> Result<Option<i32>, ApiError> {
        self.fields
            .get(name)
            .map(|v| {
                v.parse()
                    .map_err(|_| bad_request(format!("field '{}' must be an integer", name)))
            })
            .transpose()
    }

    fn file(&self, name: &str) -> Result<PathBuf, ApiError> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| bad_request(format!("missing file '{}'", name)))
    }
}

/// Drain a multipart request: plain fields into strings, file fields
/// streamed to the spool directory under fresh names.
async fn collect_multipart(
    multipart: &mut Multipart,
    upload_dir: &Path,
) -> Result<IngestForm, ApiError> {
    let mut form = IngestForm::default();

    while let Ok(Some(field)) = multipart.next_field().await {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if field.file_name().is_some() {
            let path = upload_dir.join(Uuid::new_v4().to_string());
            stream_to_file(&path, field).await?;
            form.files.insert(name, path);
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| bad_request(e.to_string()))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

// Save a `Stream` to a file
async fn stream_to_file<S, E>(path: &Path, stream: S) -> Result<(), ApiError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    async {
        let body_with_io_error = stream.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
        let body_reader = StreamReader::new(body_with_io_error);
        futures::pin_mut!(body_reader);

        let mut file = BufWriter::new(File::create(path).await?);
        tokio::io::copy(&mut body_reader, &mut file).await?;

        Ok::<_, io::Error>(())
    }
    .await
    .map_err(|err| ApiError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
}

async fn create_movie(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let form = collect_multipart(&mut multipart, &state.upload_dir).await?;
    let upload = MovieUpload {
        title: form.field("title")?,
        description: form.fields.get("description").cloned(),
        category_id: form.opt_int_field("categoryId")?,
        release_year: form.int_field("releaseYear")?,
        video_path: form.file("video")?,
        cover_path: form.file("coverImage")?,
    };
    let actor = audit_from(&headers);

    let task_id = state.tasks.create();
    let movies = state.movies.clone();
    spawn_ingestion(&state, task_id.clone(), move |tasks, task| async move {
        let on_progress = progress_callback(tasks, task);
        movies.create(upload, &actor, &on_progress).await.map(|_| ())
    });

    Ok(Json(json!({ "taskId": task_id })))
}

async fn create_episode(
    State(state): State<AppState>,
    UrlPath(serie_id): UrlPath<i32>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let form = collect_multipart(&mut multipart, &state.upload_dir).await?;
    let upload = EpisodeUpload {
        serie_id,
        season: form.int_field("season")?,
        episode_number: form.int_field("episodeNumber")?,
        title: form.field("title")?,
        description: form.fields.get("description").cloned(),
        video_path: form.file("video")?,
    };
    let actor = audit_from(&headers);

    let task_id = state.tasks.create();
    let series = state.series.clone();
    spawn_ingestion(&state, task_id.clone(), move |tasks, task| async move {
        let on_progress = progress_callback(tasks, task);
        series
            .create_episode(upload, &actor, &on_progress)
            .await
            .map(|_| ())
    });

    Ok(Json(json!({ "taskId": task_id })))
}

/// Run one ingestion in the background under a concurrency slot, reporting
/// its outcome through the task registry.
fn spawn_ingestion<F, Fut>(state: &AppState, task_id: String, work: F)
where
    F: FnOnce(Arc<TaskRegistry>, String) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<(), Error>> + Send + 'static,
{
    let tasks = state.tasks.clone();
    let slots = state.ingest_slots.clone();
    tokio::spawn(async move {
        let Ok(_permit) = slots.acquire_owned().await else {
            tasks.fail(&task_id, "server shutting down".into());
            return;
        };
        tasks.set_status(&task_id, TaskStatus::Transcoding);

        match work(tasks.clone(), task_id.clone()).await {
            Ok(()) => tasks.complete(&task_id),
            Err(e) => {
                tracing::error!(task = %task_id, error = %e, "ingestion failed");
                tasks.fail(&task_id, e.to_string());
            }
        }
    });
}

fn progress_callback(tasks: Arc<TaskRegistry>, task_id: String) -> impl Fn(u32) + Send + Sync {
    move |pct| tasks.set_progress(&task_id, pct)
}

async fn task_progress(
    State(state): State<AppState>,
    UrlPath(task_id): UrlPath<String>,
) -> Result<Json<reelvault::tasks::TaskState>, ApiError> {
    state
        .tasks
        .get(&task_id)
        .map(Json)
        .ok_or_else(|| ApiError(StatusCode::NOT_FOUND, "unknown task".into()))
}

async fn update_movie(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i32>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let form = collect_multipart(&mut multipart, &state.upload_dir).await?;
    let update = MovieUpdate {
        title: form.fields.get("title").cloned(),
        description: form.fields.get("description").cloned(),
        category_id: form.opt_int_field("categoryId")?,
        release_year: form.opt_int_field("releaseYear")?,
        cover_path: form.files.get("coverImage").cloned(),
    };
    let id = state.movies.update(id, update).await?;
    Ok(Json(json!({ "id": id })))
}

async fn delete_movie(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.movies.delete(id).await?;
    Ok(Json(json!({ "id": id, "message": "movie deleted" })))
}

async fn create_series(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let form = collect_multipart(&mut multipart, &state.upload_dir).await?;
    let upload = SeriesUpload {
        title: form.field("title")?,
        description: form.fields.get("description").cloned(),
        category_id: form.opt_int_field("categoryId")?,
        release_year: form.int_field("releaseYear")?,
        cover_path: form.file("coverImage")?,
    };
    let actor = audit_from(&headers);

    let serie_id = state.series.create(upload, &actor).await?;
    Ok(Json(json!({ "serieId": serie_id })))
}

async fn update_series(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i32>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let form = collect_multipart(&mut multipart, &state.upload_dir).await?;
    let update = SeriesUpdate {
        title: form.fields.get("title").cloned(),
        description: form.fields.get("description").cloned(),
        category_id: form.opt_int_field("categoryId")?,
        release_year: form.opt_int_field("releaseYear")?,
        cover_path: form.files.get("coverImage").cloned(),
    };
    let id = state.series.update(id, update).await?;
    Ok(Json(json!({ "id": id })))
}

async fn delete_series(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = state.series.delete(id).await?;
    Ok(Json(json!({
        "id": id,
        "episodesDeleted": outcome.episodes_deleted,
        "videosDeleted": outcome.videos_deleted,
    })))
}

async fn update_episode(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i32>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let form = collect_multipart(&mut multipart, &state.upload_dir).await?;
    let changes = EpisodeChanges {
        serie_id: form.opt_int_field("serieId")?,
        season: form.opt_int_field("season")?,
        episode_number: form.opt_int_field("episodeNumber")?,
        title: form.fields.get("title").cloned(),
        description: form.fields.get("description").cloned(),
    };
    let id = state.series.update_episode(id, changes).await?;
    Ok(Json(json!({ "id": id })))
}

async fn delete_episode(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.series.delete_episode(id).await?;
    Ok(Json(json!({ "id": id, "message": "episode deleted" })))
}
