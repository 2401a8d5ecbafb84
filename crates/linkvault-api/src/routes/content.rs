use axum::{
    Extension, Json,
    body::Body,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use bytes::{Bytes, BytesMut};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncReadExt;
use tracing::warn;

use linkvault_types::api::{
    AccessResponse, DeleteTokenRequest, MyContentsResponse, PasswordRequest, StatsResponse,
    SuccessResponse, UploadResponse,
};
use linkvault_types::models::AuthUser;

use crate::error::{ApiError, ApiResult};
use crate::lifecycle::{FileUpload, NewContent, Payload};
use crate::middleware::Identity;
use crate::routes::AppState;

#[derive(Debug, Default)]
struct UploadForm {
    text: Option<String>,
    file: Option<FileUpload>,
    expiry_minutes: Option<i64>,
    password: Option<String>,
    one_time: bool,
    max_views: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub password: Option<String>,
}

/// POST /api/upload — multipart form with `text` and/or `file`.
pub async fn upload(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let config = state.engine.config();
    let max_mb = config.max_file_mb();
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_mb))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let media_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();

                let mut data = BytesMut::new();
                let mut checked_type = false;
                while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, max_mb))? {
                    // Browsers send an empty part when no file was picked, so
                    // the type is only judged once bytes actually arrive.
                    if !checked_type {
                        if !config.is_allowed_mime(&media_type) {
                            return Err(ApiError::InvalidFileType);
                        }
                        checked_type = true;
                    }
                    if (data.len() + chunk.len()) as u64 > config.max_file_bytes {
                        return Err(ApiError::FileTooLarge { max_mb });
                    }
                    data.extend_from_slice(&chunk);
                }

                if data.is_empty() && filename.is_empty() {
                    continue;
                }
                form.file = Some(FileUpload {
                    name: if filename.is_empty() { "upload".to_string() } else { filename },
                    media_type,
                    data: data.freeze(),
                });
            }
            "text" => form.text = non_empty(read_text(field, max_mb).await?),
            "password" => form.password = non_empty(read_text(field, max_mb).await?),
            "expiryMinutes" => form.expiry_minutes = parse_positive(&read_text(field, max_mb).await?),
            "maxViews" => form.max_views = parse_positive(&read_text(field, max_mb).await?),
            "oneTime" => form.one_time = parse_flag(&read_text(field, max_mb).await?),
            _ => {}
        }
    }

    // A file wins over text when both are sent.
    let payload = match (form.file, form.text) {
        (Some(file), _) => Payload::File(file),
        (None, Some(text)) => Payload::Text(text),
        (None, None) => return Err(ApiError::MissingPayload),
    };

    let created = state
        .engine
        .create(NewContent {
            payload,
            password: form.password,
            one_time: form.one_time,
            max_views: form.max_views,
            expiry_minutes: form.expiry_minutes,
            owner_id: identity.user().map(|u| u.id.clone()),
        })
        .await?;

    Ok(Json(UploadResponse {
        link: config.view_link(&created.id),
        id: created.id,
        expires_at: created.expires_at,
        delete_token: created.delete_token,
        view_count: 0,
        max_views: created.max_views,
    }))
}

/// POST /api/access/{id} — consume one view.
pub async fn access(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<AccessResponse>> {
    let req: PasswordRequest = json_or_default(&body)?;
    let response = state.engine.access(&id, req.password.as_deref()).await?;
    Ok(Json(response))
}

/// GET /api/content/{id} — view without a password, or learn that one is needed.
pub async fn peek(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AccessResponse>> {
    Ok(Json(state.engine.peek(&id).await?))
}

/// POST /api/verify/{id} — password pre-check, no side effects.
pub async fn verify(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<SuccessResponse>> {
    let req: PasswordRequest = json_or_default(&body)?;
    if state.engine.verify_password(&id, req.password.as_deref()).await? {
        Ok(Json(SuccessResponse::ok()))
    } else {
        Err(ApiError::Forbidden)
    }
}

/// GET /api/download/{id}?password= — stream the stored file.
///
/// One-time files are purged only after the last byte has been handed to
/// the connection; a broken stream leaves the content in place.
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<impl IntoResponse> {
    let download = state
        .engine
        .open_download(&id, query.password.as_deref())
        .await?;

    let engine = state.engine.clone();
    let ticket = download.ticket.clone();
    let mut file = download.file;

    let stream = async_stream::stream! {
        let mut remaining = ticket.size;
        let mut buf = vec![0u8; 64 * 1024]; // 64 KB read buffer
        while remaining > 0 {
            match file.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    remaining = remaining.saturating_sub(n as u64);
                    yield Ok::<Bytes, std::io::Error>(Bytes::copy_from_slice(&buf[..n]));
                }
                Err(e) => {
                    warn!("Read failed while streaming {}: {}", ticket.id, e);
                    yield Err(e);
                    return;
                }
            }
        }

        if remaining > 0 {
            warn!("Payload for {} shorter than expected", ticket.id);
            return;
        }
        if let Err(e) = engine.complete_download(&ticket).await {
            warn!("Failed to consume one-time file {}: {}", ticket.id, e);
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&download.ticket.media_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(download.ticket.size));
    if let Ok(value) = HeaderValue::from_str(&content_disposition(&download.ticket.filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok((StatusCode::OK, headers, Body::from_stream(stream)))
}

/// POST /api/stats/{id}
pub async fn stats(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<StatsResponse>> {
    let req: DeleteTokenRequest = json_or_default(&body)?;
    let stats = state
        .engine
        .stats(&id, identity.user(), req.delete_token.as_deref())
        .await?;
    Ok(Json(stats))
}

/// POST /api/delete/{id}
pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<SuccessResponse>> {
    let req: DeleteTokenRequest = json_or_default(&body)?;
    state
        .engine
        .delete(&id, identity.user(), req.delete_token.as_deref())
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

/// GET /api/my-contents
pub async fn my_contents(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<MyContentsResponse>> {
    let items = state.engine.list_owned(&user).await?;
    Ok(Json(MyContentsResponse { items }))
}

// ── Helpers ─────────────────────────────────────────────────────────────

async fn read_text(field: axum::extract::multipart::Field<'_>, max_mb: u64) -> ApiResult<String> {
    field.text().await.map_err(|e| multipart_error(e, max_mb))
}

/// Bodies on the content routes are optional; an empty body means defaults.
fn json_or_default<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::MalformedRequest(e.to_string()))
}

fn multipart_error(err: MultipartError, max_mb: u64) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::FileTooLarge { max_mb }
    } else {
        ApiError::MalformedRequest(err.body_text())
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// Trimmed base-10 integer greater than zero; anything else is absent.
fn parse_positive(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|n| *n > 0)
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

/// `attachment` disposition with an ASCII fallback name and the exact
/// UTF-8 name in `filename*`.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut encoded = String::with_capacity(filename.len() * 3);
    for byte in filename.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }

    format!("attachment; filename=\"{}\"; filename*=UTF-8''{}", fallback, encoded)
}
