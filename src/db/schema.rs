//! Database schema and migrations for Lockbox.
//!
//! Migrations are applied in order, once each, when the database is opened.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Uploaded files and groups
    r#"
-- One row per uploaded file and per group of files
CREATE TABLE contents (
    id              TEXT PRIMARY KEY NOT NULL,
    created_at      TEXT NOT NULL,
    is_group        INTEGER NOT NULL DEFAULT 0,
    name            TEXT,                -- files only
    extension       TEXT,                -- files only, with leading dot or empty
    mime_type       TEXT,                -- files only
    expires_at      TEXT,
    password_hash   TEXT,                -- Argon2 PHC string
    access_token    TEXT,
    CHECK ((password_hash IS NULL) = (access_token IS NULL))
);

CREATE INDEX idx_contents_expires_at ON contents(expires_at);

-- Ordered members of a group
CREATE TABLE group_members (
    group_id    TEXT NOT NULL REFERENCES contents(id) ON DELETE CASCADE,
    position    INTEGER NOT NULL,
    member_id   TEXT NOT NULL,
    PRIMARY KEY (group_id, position)
);
"#,
    // v2: Password sessions
    r#"
CREATE TABLE sessions (
    id          TEXT PRIMARY KEY NOT NULL,
    token       TEXT NOT NULL,
    last_active TEXT NOT NULL
);

-- Access grants: content id -> access token proven by this session
CREATE TABLE session_access (
    session_id      TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    content_id      TEXT NOT NULL,
    access_token    TEXT NOT NULL,
    PRIMARY KEY (session_id, content_id)
);
"#,
];
