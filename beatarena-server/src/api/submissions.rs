//! Excerpt preview, upload, deletion and streaming
//!
//! Uploads are multipart forms with a `file` field (any format the decoder
//! understands) and optional `extractStart`/`extractEnd` in seconds. Only the
//! re-encoded excerpt is stored, as `<uploads>/<submission id>.wav`.

use std::path::Path as FsPath;

use axum::{
    body::{Body, Bytes},
    extract::{multipart::MultipartError, Multipart, Path, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use beatarena_common::audio::{extract_excerpt, Excerpt, ExcerptLimits, ExcerptWindow};
use beatarena_common::db::{contests, submissions, NewSubmission, Submission};
use serde_json::json;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{info, warn};
use uuid::Uuid;

use super::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Uploaded file part
#[derive(Debug)]
struct UploadedFile {
    bytes: Bytes,
    file_name: Option<String>,
}

impl UploadedFile {
    /// Extension of the original file name, used as a decoder hint
    fn extension(&self) -> Option<String> {
        self.file_name
            .as_deref()
            .and_then(|name| FsPath::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }
}

#[derive(Debug, Default)]
struct UploadForm {
    file: Option<UploadedFile>,
    contest_id: Option<String>,
    extract_start: Option<String>,
    extract_end: Option<String>,
}

impl UploadForm {
    fn take_file(&mut self) -> ApiResult<UploadedFile> {
        self.file
            .take()
            .ok_or_else(|| ApiError::BadRequest("Missing audio file".to_string()))
    }

    /// Window chosen by the producer; both bounds or neither
    fn requested_window(&self) -> ApiResult<Option<ExcerptWindow>> {
        match (&self.extract_start, &self.extract_end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => Ok(Some(ExcerptWindow::new(
                parse_seconds("extractStart", start)?,
                parse_seconds("extractEnd", end)?,
            ))),
            _ => Err(ApiError::BadRequest(
                "extractStart and extractEnd must be given together".to_string(),
            )),
        }
    }
}

fn parse_seconds(field: &str, value: &str) -> ApiResult<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ApiError::BadRequest(format!("{} must be a number of seconds", field)))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Upload exceeds the size limit".to_string())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

async fn read_form(mut multipart: Multipart, max_bytes: usize) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if let Some(content_type) = field.content_type() {
                    if !content_type.starts_with("audio/") {
                        return Err(ApiError::BadRequest(format!(
                            "Unsupported content type: {}",
                            content_type
                        )));
                    }
                }
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                if bytes.len() > max_bytes {
                    return Err(ApiError::PayloadTooLarge(format!(
                        "File is larger than {} bytes",
                        max_bytes
                    )));
                }
                if bytes.is_empty() {
                    return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
                }
                form.file = Some(UploadedFile { bytes, file_name });
            }
            "contestId" => form.contest_id = Some(field.text().await.map_err(multipart_error)?),
            "extractStart" => form.extract_start = Some(field.text().await.map_err(multipart_error)?),
            "extractEnd" => form.extract_end = Some(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }

    Ok(form)
}

/// Decode and cut the excerpt off the async runtime
async fn cut_excerpt(
    state: &AppState,
    file: UploadedFile,
    requested: Option<ExcerptWindow>,
) -> ApiResult<Excerpt> {
    let limits = ExcerptLimits {
        max_excerpt_seconds: state.config.max_excerpt_seconds,
        max_track_seconds: state.config.max_track_seconds,
    };
    let extension = file.extension();

    tokio::task::spawn_blocking(move || {
        extract_excerpt(
            file.bytes.to_vec(),
            extension.as_deref(),
            requested,
            limits,
            &mut rand::thread_rng(),
        )
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Excerpt task failed: {}", e)))?
    .map_err(ApiError::from)
}

fn header_seconds(value: f64) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(&format!("{:.3}", value))
        .map_err(|e| ApiError::Internal(format!("Invalid header value: {}", e)))
}

/// POST /api/submissions/preview
///
/// Returns the excerpt that an upload with the same form would store.
pub async fn preview(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Response> {
    let mut form = read_form(multipart, state.config.max_upload_bytes).await?;
    let requested = form.requested_window()?;
    let file = form.take_file()?;

    let excerpt = cut_excerpt(&state, file, requested).await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/wav"));
    headers.insert("x-extract-start", header_seconds(excerpt.window.start)?);
    headers.insert("x-extract-end", header_seconds(excerpt.window.end)?);
    headers.insert("x-track-duration", header_seconds(excerpt.track_duration)?);

    Ok((headers, excerpt.wav).into_response())
}

/// POST /api/submissions/upload
pub async fn upload(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Submission>)> {
    let mut form = read_form(multipart, state.config.max_upload_bytes).await?;

    let contest_id = form
        .contest_id
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("Missing contestId".to_string()))?;
    let contest_id = Uuid::parse_str(contest_id.trim())
        .map_err(|_| ApiError::BadRequest("Invalid contestId".to_string()))?;
    let requested = form.requested_window()?;
    let file = form.take_file()?;

    let contest = contests::find_contest(&state.db, contest_id)
        .await?
        .filter(|c| c.is_open())
        .ok_or_else(|| ApiError::NotFound("Contest not found or not active".to_string()))?;

    if submissions::find_by_contest_and_user(&state.db, contest.id, current.user.id)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "You have already submitted a track for this contest".to_string(),
        ));
    }

    let excerpt = cut_excerpt(&state, file, requested).await?;

    let id = Uuid::new_v4();
    let track_path = format!("{}.wav", id);
    let file_path = state.root.uploads_path().join(&track_path);
    tokio::fs::write(&file_path, &excerpt.wav).await?;

    let created = submissions::create_submission(
        &state.db,
        &NewSubmission {
            id,
            contest_id: contest.id,
            user_id: current.user.id,
            track_path,
            extract_start: excerpt.window.start,
            extract_end: excerpt.window.end,
            duration: excerpt.track_duration,
        },
    )
    .await;

    let submission = match created {
        Ok(submission) => submission,
        Err(e) => {
            if let Err(remove_err) = tokio::fs::remove_file(&file_path).await {
                warn!("Failed to remove orphaned excerpt {}: {}", file_path.display(), remove_err);
            }
            return Err(e.into());
        }
    };

    info!(
        "User {} submitted {} to contest {} ({:.1}s-{:.1}s of {:.1}s)",
        current.user.username,
        submission.id,
        contest.id,
        submission.extract_start,
        submission.extract_end,
        submission.duration
    );

    Ok((StatusCode::CREATED, Json(submission)))
}

/// DELETE /api/submissions/:id
///
/// Only the producer may delete a submission; its votes go with it.
pub async fn delete_submission(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let submission = submissions::get_submission(&state.db, id).await?;
    if submission.user_id != current.user.id {
        return Err(ApiError::Forbidden(
            "You can only delete your own submissions".to_string(),
        ));
    }

    let deleted = submissions::delete_submission(&state.db, id).await?;

    let file_path = state.root.uploads_path().join(&deleted.track_path);
    match tokio::fs::remove_file(&file_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove excerpt {}: {}", file_path.display(), e),
    }

    info!("User {} deleted submission {}", current.user.username, id);
    Ok(Json(json!({ "message": "Submission deleted" })))
}

/// GET /api/beats/:id/stream
///
/// Serves the stored excerpt (with range support) without any producer
/// information.
pub async fn stream_beat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    request: Request,
) -> ApiResult<Response> {
    let submission = submissions::get_submission(&state.db, id).await?;
    let file_path = state.root.uploads_path().join(&submission.track_path);

    let response = match ServeFile::new(&file_path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    if response.status() == StatusCode::NOT_FOUND {
        warn!("Excerpt file missing for submission {}", id);
        return Err(ApiError::NotFound(format!("Audio for beat {} not found", id)));
    }

    let mut response = response.map(Body::new);
    if response.status().is_success() {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/wav"));
    }
    Ok(response)
}
