//! Mockup session endpoints
//!
//! Each handler forwards one user intent to the session core and answers
//! with the resulting snapshot.

use std::sync::Arc;
use std::time::Instant;

use actix_web::{error::PayloadError, http::header, http::StatusCode, web, HttpRequest, HttpResponse};
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::AppState;
use crate::domain::image::resolve_mime;
use crate::session::{MockupSession, SessionError, SessionSnapshot};
use super::{error_response, ErrorResponse};

/// Response carrying a session snapshot
#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub success: bool,
    pub data: SessionSnapshot,
}

/// Request body for product selection
#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectProductRequest {
    /// Catalog product id (e.g., "tshirt")
    pub product_id: String,
}

/// Request body for an edit
#[derive(Debug, Deserialize, ToSchema)]
pub struct EditRequest {
    /// Free-text edit instruction (e.g., "make it blue")
    pub instruction: String,
}

/// Request body for history navigation
#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectVersionRequest {
    pub version_id: Uuid,
}

fn ok_snapshot(status: StatusCode, session: &MockupSession) -> HttpResponse {
    HttpResponse::build(status).json(SessionResponse {
        success: true,
        data: session.snapshot(),
    })
}

fn session_not_found(id: &Uuid) -> HttpResponse {
    error_response(
        StatusCode::NOT_FOUND,
        "SESSION_NOT_FOUND",
        format!("Session '{}' does not exist", id),
    )
}

fn lookup(state: &AppState, id: &Uuid) -> Result<Arc<MockupSession>, HttpResponse> {
    state.sessions.get(id).ok_or_else(|| session_not_found(id))
}

/// Map a session error onto its HTTP status and code
pub fn session_error_response(err: &SessionError) -> HttpResponse {
    let (status, code) = match err {
        SessionError::MissingLogo => (StatusCode::BAD_REQUEST, "MISSING_LOGO"),
        SessionError::NoCurrentVersion => (StatusCode::CONFLICT, "NO_CURRENT_VERSION"),
        SessionError::Busy { .. } => (StatusCode::CONFLICT, "SESSION_BUSY"),
        SessionError::VersionNotFound(_) => (StatusCode::NOT_FOUND, "VERSION_NOT_FOUND"),
        SessionError::GenerationFailed(_) => (StatusCode::BAD_GATEWAY, "GENERATION_FAILED"),
        SessionError::Capacity { .. } => (StatusCode::SERVICE_UNAVAILABLE, "SESSION_LIMIT_REACHED"),
    };
    error_response(status, code, err.to_string())
}

/// Download name for an exported mockup
pub fn export_file_name() -> String {
    format!("mockup-{}.png", Utc::now().timestamp_millis())
}

enum LogoBodyError {
    TooLarge,
    Payload(PayloadError),
}

/// Buffer a raw upload, giving up as soon as it grows past `max` bytes
async fn read_logo_body(mut payload: web::Payload, max: usize) -> Result<Bytes, LogoBodyError> {
    let mut body = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(LogoBodyError::Payload)?;
        if body.len() + chunk.len() > max {
            return Err(LogoBodyError::TooLarge);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

/// POST /api/v1/sessions - Start a new session
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    tag = "sessions",
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
        (status = 503, description = "Live session limit reached", body = ErrorResponse)
    )
)]
pub async fn create_session(state: web::Data<AppState>) -> HttpResponse {
    match state.sessions.create() {
        Ok(session) => ok_snapshot(StatusCode::CREATED, &session),
        Err(e) => {
            warn!(error = %e, "Session rejected");
            session_error_response(&e)
        }
    }
}

/// GET /api/v1/sessions/{session_id} - Current session state
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{session_id}",
    tag = "sessions",
    params(("session_id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session snapshot", body = SessionResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn get_session(state: web::Data<AppState>, path: web::Path<Uuid>) -> HttpResponse {
    match lookup(&state, &path) {
        Ok(session) => ok_snapshot(StatusCode::OK, &session),
        Err(response) => response,
    }
}

/// DELETE /api/v1/sessions/{session_id} - End a session
#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{session_id}",
    tag = "sessions",
    params(("session_id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 204, description = "Session ended"),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn delete_session(state: web::Data<AppState>, path: web::Path<Uuid>) -> HttpResponse {
    if state.sessions.remove(&path) {
        HttpResponse::NoContent().finish()
    } else {
        session_not_found(&path)
    }
}

/// PUT /api/v1/sessions/{session_id}/logo - Upload or replace the logo
///
/// The body is the raw image; its type comes from `Content-Type` or, failing
/// that, from the image's magic bytes.
#[utoipa::path(
    put,
    path = "/api/v1/sessions/{session_id}/logo",
    tag = "sessions",
    params(("session_id" = Uuid, Path, description = "Session identifier")),
    request_body(content = Vec<u8>, content_type = "image/*", description = "Raw logo image"),
    responses(
        (status = 200, description = "Logo stored", body = SessionResponse),
        (status = 400, description = "Empty upload", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 413, description = "Logo too large", body = ErrorResponse),
        (status = 415, description = "Not an image", body = ErrorResponse)
    )
)]
pub async fn upload_logo(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: HttpRequest,
    payload: web::Payload,
) -> HttpResponse {
    let session = match lookup(&state, &path) {
        Ok(s) => s,
        Err(response) => return response,
    };

    let max = state.settings.uploads.max_logo_bytes;
    let body = match read_logo_body(payload, max).await {
        Ok(body) => body,
        Err(LogoBodyError::TooLarge) => {
            warn!(session_id = %session.id(), max, "Logo too large");
            return error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                "LOGO_TOO_LARGE",
                format!("Logo exceeds the {} byte limit", max),
            );
        }
        Err(LogoBodyError::Payload(e)) => {
            warn!(session_id = %session.id(), error = %e, "Logo upload interrupted");
            return error_response(StatusCode::BAD_REQUEST, "INVALID_LOGO_UPLOAD", e.to_string());
        }
    };

    if body.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "EMPTY_LOGO", "Logo upload is empty");
    }

    let declared = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let Some(mime) = resolve_mime(declared, &body) else {
        return error_response(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "UNSUPPORTED_LOGO",
            "Logo must be an image (PNG, JPEG, WebP, GIF or BMP)",
        );
    };

    session.upload_logo(&body, &mime);
    ok_snapshot(StatusCode::OK, &session)
}

/// POST /api/v1/sessions/{session_id}/product - Select a product and generate its mockup
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{session_id}/product",
    tag = "sessions",
    params(("session_id" = Uuid, Path, description = "Session identifier")),
    request_body = SelectProductRequest,
    responses(
        (status = 200, description = "Mockup generated", body = SessionResponse),
        (status = 400, description = "No logo uploaded", body = ErrorResponse),
        (status = 404, description = "Session or product not found", body = ErrorResponse),
        (status = 409, description = "A generation is already in progress", body = ErrorResponse),
        (status = 502, description = "Generation failed", body = ErrorResponse)
    )
)]
pub async fn select_product(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<SelectProductRequest>,
) -> HttpResponse {
    let start = Instant::now();
    let session = match lookup(&state, &path) {
        Ok(s) => s,
        Err(response) => return response,
    };

    let Some(product) = state.catalog.find(&body.product_id) else {
        return error_response(
            StatusCode::NOT_FOUND,
            "PRODUCT_NOT_FOUND",
            format!("Product '{}' does not exist", body.product_id),
        );
    };

    match session.select_product(product).await {
        Ok(version) => {
            info!(
                session_id = %session.id(),
                version_id = %version.id,
                generation_time_ms = start.elapsed().as_millis() as u64,
                "Initial mockup ready"
            );
            ok_snapshot(StatusCode::OK, &session)
        }
        Err(e) => {
            if matches!(e, SessionError::GenerationFailed(_)) {
                error!(session_id = %session.id(), error = %e, "Mockup generation failed");
            }
            session_error_response(&e)
        }
    }
}

/// POST /api/v1/sessions/{session_id}/edits - Apply an edit instruction to the current mockup
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{session_id}/edits",
    tag = "sessions",
    params(("session_id" = Uuid, Path, description = "Session identifier")),
    request_body = EditRequest,
    responses(
        (status = 200, description = "Edit applied", body = SessionResponse),
        (status = 400, description = "Blank instruction", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Busy, or no mockup to edit yet", body = ErrorResponse),
        (status = 502, description = "Edit failed", body = ErrorResponse)
    )
)]
pub async fn submit_edit(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<EditRequest>,
) -> HttpResponse {
    let start = Instant::now();
    let session = match lookup(&state, &path) {
        Ok(s) => s,
        Err(response) => return response,
    };

    // Blank instructions never reach the session
    if body.instruction.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "EMPTY_INSTRUCTION",
            "Edit instruction must not be empty",
        );
    }

    match session.submit_edit(&body.instruction).await {
        Ok(version) => {
            info!(
                session_id = %session.id(),
                version_id = %version.id,
                generation_time_ms = start.elapsed().as_millis() as u64,
                "Edit applied"
            );
            ok_snapshot(StatusCode::OK, &session)
        }
        Err(e) => {
            if matches!(e, SessionError::GenerationFailed(_)) {
                error!(session_id = %session.id(), error = %e, "Mockup edit failed");
            }
            session_error_response(&e)
        }
    }
}

/// PUT /api/v1/sessions/{session_id}/current - Make a history version current
#[utoipa::path(
    put,
    path = "/api/v1/sessions/{session_id}/current",
    tag = "sessions",
    params(("session_id" = Uuid, Path, description = "Session identifier")),
    request_body = SelectVersionRequest,
    responses(
        (status = 200, description = "Version selected", body = SessionResponse),
        (status = 404, description = "Session or version not found", body = ErrorResponse)
    )
)]
pub async fn select_version(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<SelectVersionRequest>,
) -> HttpResponse {
    let session = match lookup(&state, &path) {
        Ok(s) => s,
        Err(response) => return response,
    };

    match session.select_version(body.version_id) {
        Ok(_) => ok_snapshot(StatusCode::OK, &session),
        Err(e) => session_error_response(&e),
    }
}

/// GET /api/v1/sessions/{session_id}/export - Download the current mockup as PNG
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{session_id}/export",
    tag = "sessions",
    params(("session_id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "PNG attachment named mockup-<timestamp>.png", content_type = "image/png", body = Vec<u8>),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "No mockup to export", body = ErrorResponse),
        (status = 500, description = "Image could not be converted", body = ErrorResponse)
    )
)]
pub async fn export_mockup(state: web::Data<AppState>, path: web::Path<Uuid>) -> HttpResponse {
    let session = match lookup(&state, &path) {
        Ok(s) => s,
        Err(response) => return response,
    };

    let image = match session.export() {
        Ok(image) => image,
        Err(e) => return session_error_response(&e),
    };

    let png = match web::block(move || image.to_png_bytes()).await {
        Ok(Ok(png)) => png,
        Ok(Err(e)) => {
            error!(session_id = %session.id(), error = %e, "Export conversion failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "EXPORT_FAILED", e.to_string());
        }
        Err(e) => {
            error!(session_id = %session.id(), error = %e, "Export task failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "EXPORT_FAILED", e.to_string());
        }
    };

    let file_name = export_file_name();
    info!(session_id = %session.id(), file_name = %file_name, bytes = png.len(), "Mockup exported");

    HttpResponse::Ok()
        .content_type("image/png")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        ))
        .body(Bytes::from(png))
}
