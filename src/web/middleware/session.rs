//! Session cookie extraction and issuing.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::SET_COOKIE, request::Parts, HeaderName},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::auth::{SessionCookie, SESSION_COOKIE};
use crate::web::state::CookieSettings;

const SECONDS_PER_DAY: i64 = 86_400;

/// Extractor for the session credential, if the client presented a well-formed one.
///
/// A missing or malformed cookie yields `None`; it is never a rejection.
#[derive(Debug, Clone)]
pub struct OptionalSession(pub Option<SessionCookie>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let cookie = jar
            .get(SESSION_COOKIE)
            .and_then(|c| SessionCookie::parse(c.value()));
        Ok(OptionalSession(cookie))
    }
}

/// Build the `Set-Cookie` value for a session credential.
pub fn session_cookie(credential: &SessionCookie, settings: CookieSettings) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, credential.to_string()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(
            settings.max_age_days.saturating_mul(SECONDS_PER_DAY),
        ))
        .secure(settings.secure)
        .build()
}

/// `Set-Cookie` header carrying a session credential.
///
/// Rendered from the cookie's plain `Display`; the value must reach the
/// client as `<id>/<token>`, not percent-encoded as a `CookieJar` would.
pub fn session_set_cookie(
    credential: &SessionCookie,
    settings: CookieSettings,
) -> (HeaderName, String) {
    (SET_COOKIE, session_cookie(credential, settings).to_string())
}
