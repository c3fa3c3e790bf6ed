//! Rate limiting middleware.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};

use crate::config::WebConfig;
use crate::web::error::ApiError;

/// Per-IP rate limiter using Governor.
pub type IpRateLimiter = DefaultKeyedRateLimiter<String>;

/// State for rate limiting.
pub struct RateLimitState {
    /// Password submissions.
    password: IpRateLimiter,
    /// Uploads.
    upload: IpRateLimiter,
    /// Whether proxy headers name the client.
    trust_proxy_headers: bool,
}

impl RateLimitState {
    /// Create a new rate limit state (requests per minute per IP).
    pub fn new(password_rate_limit: u32, upload_rate_limit: u32) -> Self {
        Self {
            password: RateLimiter::keyed(per_minute(password_rate_limit)),
            upload: RateLimiter::keyed(per_minute(upload_rate_limit)),
            trust_proxy_headers: false,
        }
    }

    /// Create from web configuration.
    pub fn from_config(config: &WebConfig) -> Self {
        let mut state = Self::new(config.password_rate_limit, config.upload_rate_limit);
        state.trust_proxy_headers = config.trust_proxy_headers;
        state
    }

    /// Check if a password submission is allowed for this IP.
    pub fn check_password(&self, ip: &str) -> bool {
        self.password.check_key(&ip.to_string()).is_ok()
    }

    /// Check if an upload is allowed for this IP.
    pub fn check_upload(&self, ip: &str) -> bool {
        self.upload.check_key(&ip.to_string()).is_ok()
    }

    /// Drop limiter state for IPs whose quota has fully replenished.
    pub fn cleanup(&self) {
        self.password.retain_recent();
        self.upload.retain_recent();
    }

    /// Start a background task to periodically clean up old entries.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(300)).await;
                self.cleanup();
            }
        });
    }

    fn client_ip(&self, req: &Request<Body>) -> String {
        get_client_ip(req, self.trust_proxy_headers)
    }
}

fn per_minute(requests: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN))
}

/// Extract client IP from request.
fn get_client_ip(req: &Request<Body>, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        // Take the first IP in the X-Forwarded-For chain
        if let Some(ip) = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
        {
            return ip.trim().to_string();
        }

        if let Some(real_ip) = req
            .headers()
            .get("X-Real-IP")
            .and_then(|v| v.to_str().ok())
        {
            return real_ip.trim().to_string();
        }
    }

    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

/// Rate limiting middleware for password submissions.
pub async fn password_rate_limit(
    state: Arc<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = state.client_ip(&req);

    if !state.check_password(&ip) {
        tracing::warn!(ip = %ip, "Password rate limit exceeded");
        return ApiError::too_many_requests().into_response();
    }

    next.run(req).await
}

/// Rate limiting middleware for uploads.
pub async fn upload_rate_limit(
    state: Arc<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = state.client_ip(&req);

    if !state.check_upload(&ip) {
        tracing::warn!(ip = %ip, "Upload rate limit exceeded");
        return ApiError::too_many_requests().into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_rate_limit() {
        let state = RateLimitState::new(3, 100);

        // First 3 requests should succeed
        assert!(state.check_password("127.0.0.1"));
        assert!(state.check_password("127.0.0.1"));
        assert!(state.check_password("127.0.0.1"));

        // 4th request should fail
        assert!(!state.check_password("127.0.0.1"));

        // Different IP should work
        assert!(state.check_password("192.168.1.1"));

        // Upload quota is separate
        assert!(state.check_upload("127.0.0.1"));
    }

    #[test]
    fn test_upload_rate_limit() {
        let state = RateLimitState::new(5, 2);

        assert!(state.check_upload("127.0.0.1"));
        assert!(state.check_upload("127.0.0.1"));
        assert!(!state.check_upload("127.0.0.1"));
    }

    #[test]
    fn test_client_ip_ignores_proxy_headers_by_default() {
        let req = Request::builder()
            .header("X-Forwarded-For", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(get_client_ip(&req, false), "unknown");
        assert_eq!(get_client_ip(&req, true), "203.0.113.9");
    }

    #[test]
    fn test_client_ip_from_connect_info() {
        let mut req = Request::builder()
            .header("X-Real-IP", "203.0.113.9")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4242))));

        assert_eq!(get_client_ip(&req, false), "192.0.2.1");
        assert_eq!(get_client_ip(&req, true), "203.0.113.9");
    }
}
