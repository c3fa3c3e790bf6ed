//! Test helpers for web API integration tests.
//!
//! Builds a router over an in-memory database and a temporary storage
//! directory, and encodes multipart upload bodies.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::header::{CONTENT_LENGTH, COOKIE};
use axum_test::{TestRequest, TestResponse, TestServer};
use tempfile::TempDir;

use lockbox::web::middleware::RateLimitState;
use lockbox::{create_router, AppState, Config, Database, FileStorage, StoreMonitor};

/// Multipart boundary used by every encoded body.
pub const BOUNDARY: &str = "lockbox-test-boundary";

/// A test application with direct handles on its store and storage.
pub struct TestApp {
    pub server: TestServer,
    pub db: Database,
    pub monitor: Arc<StoreMonitor>,
    pub storage_dir: TempDir,
}

/// Configuration with cheap password hashing and small limits.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.public_url = "http://files.test/".to_string();
    config.credentials.memory_kib = 8;
    config.credentials.iterations = 1;
    config.credentials.parallelism = 1;
    config.limits.max_files = 3;
    config.limits.size_limit_bytes = 64 * 1024;
    config
}

/// Create a test application from the given configuration.
pub async fn spawn_app_with(config: Config) -> TestApp {
    spawn_app_with_rate_limits(config, RateLimitState::new(1000, 1000)).await
}

/// Create a test application with explicit rate limits.
pub async fn spawn_app_with_rate_limits(config: Config, rate_limits: RateLimitState) -> TestApp {
    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");
    let storage_dir = TempDir::new().expect("Failed to create storage dir");
    let storage = FileStorage::new(storage_dir.path()).expect("Failed to create storage");
    let monitor = Arc::new(StoreMonitor::new(true));

    let state = AppState::from_database(&db, storage, monitor.clone(), &config)
        .expect("Failed to create app state");
    let router = create_router(
        Arc::new(state),
        Arc::new(rate_limits),
        &config.web.cors_origins,
    );

    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        db,
        monitor,
        storage_dir,
    }
}

/// Create a test application with [`test_config`].
pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

impl TestApp {
    /// Number of files currently in storage.
    pub fn stored_files(&self) -> usize {
        std::fs::read_dir(self.storage_dir.path())
            .expect("Failed to read storage dir")
            .count()
    }

    /// Send a multipart upload.
    pub async fn upload(&self, form: &MultipartForm) -> TestResponse {
        self.upload_request(form).await
    }

    /// Build a multipart upload request, for adding headers before sending.
    pub fn upload_request(&self, form: &MultipartForm) -> TestRequest {
        self.multipart_request("/upload", form)
    }

    /// Build a multipart POST to any path.
    pub fn multipart_request(&self, path: &str, form: &MultipartForm) -> TestRequest {
        let body = form.encode();
        self.server
            .post(path)
            .add_header(CONTENT_LENGTH, body.len().to_string())
            .content_type(&format!("multipart/form-data; boundary={BOUNDARY}"))
            .bytes(Bytes::from(body))
    }
}

/// Attach a session cookie value (`"<id>/<token>"`) to a request.
pub fn with_session(request: TestRequest, session: &str) -> TestRequest {
    request.add_header(COOKIE, format!("session={session}"))
}

/// Session cookie value set by a response.
pub fn session_of(response: &TestResponse) -> String {
    response.cookie("session").value().to_string()
}

/// Multipart form body builder.
#[derive(Default)]
pub struct MultipartForm {
    parts: Vec<Part>,
}

enum Part {
    Text {
        name: String,
        value: String,
    },
    File {
        filename: String,
        content_type: String,
        data: Vec<u8>,
    },
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field.
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts.push(Part::Text {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Add a file part.
    pub fn file(mut self, filename: &str, content_type: &str, data: impl Into<Vec<u8>>) -> Self {
        self.parts.push(Part::File {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            data: data.into(),
        });
        self
    }

    /// Encode the body with [`BOUNDARY`].
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for part in &self.parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text { name, value } => {
                    let header = format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n");
                    body.extend_from_slice(header.as_bytes());
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File {
                    filename,
                    content_type,
                    data,
                } => {
                    let header = format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    );
                    body.extend_from_slice(header.as_bytes());
                    body.extend_from_slice(data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }
}
