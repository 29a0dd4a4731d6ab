use std::fs;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crowdcount_core::shared::constants::{IMAGE_CONTENT_TYPES, VIDEO_CONTENT_TYPES};

use crate::api_error::{
    ApiError, ErrorBody, INVALID_IMAGE_TYPE, INVALID_VIDEO_TYPE, NO_FILE_UPLOADED,
};
use crate::staging::{
    output_name, resolve_artifact, upload_extension, PublishGate, StagedFile,
};
use crate::state::AppState;

const UPLOAD_FIELD: &str = "file";
const PROCESSED_ROUTE: &str = "/processed_videos";

/// Interactive API docs and the OpenAPI document they load.
pub const API_DOCS_ROUTE: &str = "/apidocs";
pub const OPENAPI_ROUTE: &str = "/apispec_1.json";

#[derive(Debug, Serialize, ToSchema)]
pub struct VideoUploaded {
    /// Absolute URL of the annotated video.
    #[schema(example = "http://localhost:8000/processed_videos/final_street.mp4")]
    pub video_url: String,
}

/// Multipart body accepted by both upload routes.
#[derive(ToSchema)]
#[allow(dead_code)]
struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

/// Raw media returned by the annotate and download routes.
#[derive(ToSchema)]
#[schema(value_type = String, format = Binary)]
#[allow(dead_code)]
struct MediaFile(Vec<u8>);

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Crowd counting API",
        description = "Person and head counting with annotated output for uploaded videos and images."
    ),
    paths(upload_video, processed_video, upload_image),
    components(schemas(VideoUploaded, ErrorBody, UploadForm, MediaFile))
)]
pub struct ApiDoc;

/// Create the HTTP router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/upload_video/", post(upload_video))
        .route("/processed_videos/:filename", get(processed_video))
        .route("/upload_image/", post(upload_image))
        .merge(SwaggerUi::new(API_DOCS_ROUTE).url(OPENAPI_ROUTE, ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

struct Upload {
    filename: Option<String>,
    content_type: String,
    bytes: Bytes,
}

/// Annotate an uploaded video and publish it under `/processed_videos`.
#[utoipa::path(
    post,
    path = "/upload_video/",
    request_body(content = UploadForm, content_type = "multipart/form-data", description = "Video file (mp4, avi, mov)"),
    responses(
        (status = 200, description = "Video annotated and published", body = VideoUploaded),
        (status = 400, description = "Missing file, invalid file type or unreadable video", body = ErrorBody),
        (status = 500, description = "Inference, storage or encoding failed", body = ErrorBody),
        (status = 504, description = "Processing timed out", body = ErrorBody)
    )
)]
async fn upload_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<VideoUploaded>, ApiError> {
    let upload = read_upload(multipart).await?;
    if !content_type_allowed(VIDEO_CONTENT_TYPES, &upload.content_type) {
        return Err(ApiError::BadRequest(INVALID_VIDEO_TYPE.to_string()));
    }

    let name = output_name(upload.filename.as_deref().unwrap_or_default());
    let label = request_label("video");
    log::info!(
        "[{label}] received {} ({} bytes) -> {name}",
        upload.filename.as_deref().unwrap_or("<unnamed>"),
        upload.bytes.len()
    );

    let gate = Arc::new(PublishGate::default());
    let job = {
        let gate = gate.clone();
        let processor = state.processor.clone();
        let staging_dir = state.staging_dir.clone();
        let dest = state.output_dir.join(&name);
        let label = label.clone();
        tokio::task::spawn_blocking(move || {
            let extension = upload_extension(upload.filename.as_deref(), &upload.content_type);
            let input = StagedFile::new(&staging_dir, &extension).map_err(internal)?;
            fs::write(input.path(), &upload.bytes).map_err(internal)?;
            let output = StagedFile::new(&staging_dir, "mp4").map_err(internal)?;

            let counts = processor.process_video(input.path(), output.path(), &label)?;

            let published = gate.commit(|| output.publish(&dest)).map_err(internal)?;
            if !published {
                log::warn!("[{label}] discarded result of abandoned request");
            }
            Ok(counts)
        })
    };

    let counts = run_bounded(job, state.request_timeout, &gate).await?;
    log::info!(
        "[{label}] {} frames, peak {} people / {} heads, published {name}",
        counts.frames,
        counts.peak.person,
        counts.peak.head
    );

    Ok(Json(VideoUploaded {
        video_url: video_url(&state, &headers, &name),
    }))
}

/// Annotate an uploaded image and return it as JPEG.
#[utoipa::path(
    post,
    path = "/upload_image/",
    request_body(content = UploadForm, content_type = "multipart/form-data", description = "Image file (jpg, png)"),
    responses(
        (status = 200, description = "Annotated image", body = MediaFile, content_type = "image/jpeg"),
        (status = 400, description = "Missing file, invalid file type or corrupt image", body = ErrorBody),
        (status = 500, description = "Inference or storage failed", body = ErrorBody)
    )
)]
async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let upload = read_upload(multipart).await?;
    if !content_type_allowed(IMAGE_CONTENT_TYPES, &upload.content_type) {
        return Err(ApiError::BadRequest(INVALID_IMAGE_TYPE.to_string()));
    }

    let label = request_label("image");
    let gate = PublishGate::default();
    let job = {
        let processor = state.processor.clone();
        let label = label.clone();
        tokio::task::spawn_blocking(move || processor.process_image(&upload.bytes, &label))
    };

    let image = run_bounded(job, state.request_timeout, &gate).await?;
    log::info!(
        "[{label}] {} people / {} heads",
        image.counts.person,
        image.counts.head
    );
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], image.jpeg).into_response())
}

/// Download a published video by name.
#[utoipa::path(
    get,
    path = "/processed_videos/{filename}",
    params(("filename" = String, Path, description = "Published video name, e.g. final_video.mp4")),
    responses(
        (status = 200, description = "The processed video", body = MediaFile, content_type = "video/mp4"),
        (status = 404, description = "File not found", body = ErrorBody, example = json!({"detail": "File not found"}))
    )
)]
async fn processed_video(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let path = resolve_artifact(&state.output_dir, &filename).ok_or(ApiError::NotFound)?;
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ApiError::NotFound
        } else {
            internal(e)
        }
    })?;
    Ok(([(header::CONTENT_TYPE, "video/mp4")], bytes).into_response())
}

/// First part named `file`, or 400 "No file uploaded".
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Upload, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        log::debug!("Rejected multipart body: {e}");
        ApiError::BadRequest(NO_FILE_UPLOADED.to_string())
    })?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {e}")))?;
        return Ok(Upload {
            filename,
            content_type,
            bytes,
        });
    }
    Err(ApiError::BadRequest(NO_FILE_UPLOADED.to_string()))
}

/// Await a blocking job for at most `limit`.
///
/// On timeout the gate is closed so a late result is never published; if
/// publishing already started, the job is awaited to completion instead.
async fn run_bounded<T>(
    mut job: JoinHandle<Result<T, ApiError>>,
    limit: Duration,
    gate: &PublishGate,
) -> Result<T, ApiError> {
    match tokio::time::timeout(limit, &mut job).await {
        Ok(joined) => joined.map_err(internal)?,
        Err(_) if gate.abandon() => Err(ApiError::Timeout(limit)),
        Err(_) => job.await.map_err(internal)?,
    }
}

fn content_type_allowed(allowed: &[&str], content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    allowed.iter().any(|a| a.eq_ignore_ascii_case(essence))
}

fn video_url(state: &AppState, headers: &HeaderMap, name: &str) -> String {
    let base = match &state.public_url {
        Some(url) => url.clone(),
        None => headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(|host| format!("http://{host}"))
            .unwrap_or_default(),
    };
    format!("{base}{PROCESSED_ROUTE}/{name}")
}

fn request_label(kind: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{kind}-{}", &id[..8])
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    ApiError::Internal(e.to_string())
}
