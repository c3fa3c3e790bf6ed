//! Upload handler: `POST /upload`.

use axum::{
    extract::{multipart::Field, Multipart, State},
    http::{header, HeaderMap, HeaderName},
    response::AppendHeaders,
    Json,
};
use chrono::Utc;
use futures::StreamExt;
use std::sync::Arc;

use crate::auth::open_session;
use crate::content::{UploadBatch, UploadError};
use crate::web::dto::{ApiResponse, UploadResponse};
use crate::web::error::ApiError;
use crate::web::middleware::{session_set_cookie, OptionalSession};
use crate::web::state::AppState;

/// Longest accepted value of a non-file form field.
const MAX_FIELD_LENGTH: usize = 1024;

/// POST /upload - Upload one or more files.
///
/// Multipart fields: any number of file parts, optional `password`, optional
/// `rename=on` (must precede the file parts it applies to).
pub async fn upload(
    State(state): State<Arc<AppState>>,
    OptionalSession(cookie): OptionalSession,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<
    (
        AppendHeaders<Option<(HeaderName, String)>>,
        Json<ApiResponse<UploadResponse>>,
    ),
    ApiError,
> {
    let content_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok());

    let mut batch = UploadBatch::new(
        content_length,
        state.limits,
        state.storage.clone(),
        Utc::now(),
    )?
    .with_max_age(state.max_age);

    if let Err(e) = receive_parts(&mut batch, &mut multipart).await {
        tracing::info!("Upload rejected: {}", e);
        batch.abort().await;
        return Err(e.into());
    }

    let committed = batch
        .commit(state.contents.as_ref(), &state.hasher)
        .await?;

    let mut set_cookie = None;
    if committed.is_protected() {
        // The uploader already knows the password
        let session = open_session(
            state.contents.as_ref(),
            state.sessions.as_ref(),
            &committed.target,
            cookie.as_ref(),
            Utc::now(),
        )
        .await?;
        set_cookie = Some(session_set_cookie(&session.cookie(), state.cookie));
    }

    let link = state.link(&committed.target.id);
    Ok((
        AppendHeaders(set_cookie),
        Json(ApiResponse::new(UploadResponse::new(&committed, link))),
    ))
}

async fn receive_parts(batch: &mut UploadBatch, multipart: &mut Multipart) -> Result<(), UploadError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Stream(e.body_text()))?
    {
        if let Some(filename) = field.file_name().map(str::to_string) {
            // Browsers send an empty file part when nothing was selected
            if filename.is_empty() {
                continue;
            }
            let mime_type = field.content_type().map(str::to_string);
            batch
                .write_part(&filename, mime_type.as_deref(), field)
                .await?;
            continue;
        }

        match field.name() {
            Some("password") => {
                let password = read_text(field).await?;
                batch.set_password(password);
            }
            Some("rename") => {
                let value = read_text(field).await?;
                batch.set_rename(value == "on");
            }
            _ => {}
        }
    }

    Ok(())
}

async fn read_text(mut field: Field<'_>) -> Result<String, UploadError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| UploadError::Stream(e.body_text()))?;
        if buf.len() + chunk.len() > MAX_FIELD_LENGTH {
            return Err(UploadError::Stream("form field too large".to_string()));
        }
        buf.extend_from_slice(&chunk);
    }
    String::from_utf8(buf).map_err(|_| UploadError::Stream("form field is not UTF-8".to_string()))
}
