//! Content handlers: `GET /{id}` and `POST /{id}`.

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use mime_guess::Mime;
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::auth::{authenticate, authorize, Decision, LoginOutcome};
use crate::content::{Content, FileInfo};
use crate::web::dto::{ApiResponse, GroupFileResponse, GroupResponse, PasswordForm};
use crate::web::error::ApiError;
use crate::web::middleware::{session_set_cookie, OptionalSession};
use crate::web::state::AppState;

/// Build a Content-Disposition header value with proper encoding.
///
/// ASCII names go in a quoted `filename`; anything else gets an ASCII
/// fallback plus an RFC 5987 `filename*`. Control characters are dropped.
fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            c if !c.is_ascii() => '_',
            _ => c,
        })
        .collect();

    if filename.is_ascii() && !filename.chars().any(|c| c.is_control() || c == '"' || c == '\\') {
        return format!("inline; filename=\"{}\"", filename);
    }

    let visible: String = filename.chars().filter(|c| !c.is_control()).collect();
    let encoded = urlencoding::encode(&visible);

    format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    )
}

/// GET /:id - Download a file or list a group.
///
/// Files honour `Range` and conditional request headers.
pub async fn get_content(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    OptionalSession(cookie): OptionalSession,
    request: Request,
) -> Result<Response, ApiError> {
    let decision = authorize(
        state.contents.as_ref(),
        state.sessions.as_ref(),
        &id,
        cookie.as_ref(),
        Utc::now(),
    )
    .await?;

    let content = match decision {
        Decision::Granted(content) => content,
        Decision::PasswordRequired => return Err(ApiError::password_required(id)),
        Decision::NotFound => return Err(ApiError::not_found()),
    };

    match content.file_info() {
        Some(info) => download(&state, &content, info, request).await,
        None => list_group(&state, &content).await,
    }
}

async fn download(
    state: &AppState,
    content: &Content,
    info: &FileInfo,
    request: Request,
) -> Result<Response, ApiError> {
    let path = state.storage.path_for(&content.id, &info.extension);
    let mime_type = info
        .mime_type
        .parse::<Mime>()
        .unwrap_or_else(|_| mime_guess::from_ext("bin").first_or_octet_stream());

    let mut response = match ServeFile::new_with_mime(&path, &mime_type)
        .oneshot(request)
        .await
    {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };

    if response.status() == StatusCode::NOT_FOUND {
        // The record exists but its bytes are gone
        tracing::warn!(id = %content.id, "Stored file is missing");
        return Err(ApiError::not_found());
    }

    let disposition = HeaderValue::from_str(&content_disposition_header(&info.display_name()))
        .map_err(|e| {
            tracing::error!("Invalid Content-Disposition: {}", e);
            ApiError::internal()
        })?;

    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, disposition);
    Ok(response)
}

async fn list_group(state: &AppState, group: &Content) -> Result<Response, ApiError> {
    let members = state.contents.find_many(group.members()).await?;
    let files = members
        .iter()
        .filter_map(|member| GroupFileResponse::from_content(member, state.link(&member.id)))
        .collect();

    let response = GroupResponse {
        id: group.id.clone(),
        date: group.date,
        files,
    };
    Ok(Json(ApiResponse::new(response)).into_response())
}

/// POST /:id - Submit a password for protected content.
///
/// Accepts urlencoded and multipart forms. Success sets the session cookie
/// and redirects back to the content.
pub async fn submit_password(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    OptionalSession(cookie): OptionalSession,
    form: PasswordForm,
) -> Result<Response, ApiError> {
    let outcome = authenticate(
        state.contents.as_ref(),
        state.sessions.as_ref(),
        &state.hasher,
        &id,
        cookie.as_ref(),
        form.password.as_deref(),
        Utc::now(),
    )
    .await?;

    let back = Redirect::to(&format!("/{id}"));
    match outcome {
        LoginOutcome::Authenticated(credential) => {
            let set_cookie = session_set_cookie(&credential, state.cookie);
            Ok((AppendHeaders([set_cookie]), back).into_response())
        }
        LoginOutcome::Unprotected => Ok(back.into_response()),
        LoginOutcome::WrongPassword => Err(ApiError::wrong_password(id)),
        LoginOutcome::NotFound => Err(ApiError::not_found()),
    }
}
