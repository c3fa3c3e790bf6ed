//! Request DTOs for Web API.

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form,
};
use serde::Deserialize;

use crate::web::error::ApiError;

/// Password submission form (`POST /{id}`).
///
/// Extracted from either an urlencoded or a `multipart/form-data` body.
#[derive(Debug, Default, Deserialize)]
pub struct PasswordForm {
    /// Submitted password. Missing counts as wrong.
    #[serde(default)]
    pub password: Option<String>,
}

impl PasswordForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = PasswordForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?
        {
            if field.name() == Some("password") {
                let password = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                form.password = Some(password);
            }
        }
        Ok(form)
    }
}

#[async_trait]
impl<S> FromRequest<S> for PasswordForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            return Self::from_multipart(multipart).await;
        }

        let Form(form) = Form::<PasswordForm>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        Ok(form)
    }
}
