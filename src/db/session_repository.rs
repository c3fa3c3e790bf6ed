//! Session repository for Lockbox.
//!
//! SQLite implementation of [`SessionStore`]. A session row holds the
//! current token; its access grants live in `session_access`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{DbPool, SessionStore};
use crate::auth::Session;
use crate::Result;

/// Repository for password sessions.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: DbPool,
}

impl SessionRepository {
    /// Create a new SessionRepository over the given pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for SessionRepository {
    async fn find_one(&self, id: &str) -> Result<Option<Session>> {
        let row: Option<SessionRow> =
            sqlx::query_as("SELECT id, token, last_active FROM sessions WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let grants: Vec<(String, String)> = sqlx::query_as(
            "SELECT content_id, access_token FROM session_access WHERE session_id = ?",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Session {
            id: row.id,
            token: row.token,
            date: row.last_active,
            access: grants.into_iter().collect(),
        }))
    }

    async fn upsert(&self, session: &Session) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO sessions (id, token, last_active) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET token = excluded.token, last_active = excluded.last_active",
        )
        .bind(&session.id)
        .bind(&session.token)
        .bind(session.date)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM session_access WHERE session_id = ?")
            .bind(&session.id)
            .execute(&mut *tx)
            .await?;

        for (content_id, access_token) in &session.access {
            sqlx::query(
                "INSERT INTO session_access (session_id, content_id, access_token) VALUES (?, ?, ?)",
            )
            .bind(&session.id)
            .bind(content_id)
            .bind(access_token)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Internal struct for mapping database rows to Session.
#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    token: String,
    last_active: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::LockboxError;

    async fn setup() -> (Database, SessionRepository) {
        let db = Database::open_in_memory().await.unwrap();
        let repo = SessionRepository::new(db.pool().clone());
        (db, repo)
    }

    fn session(token: &str, grants: &[(&str, &str)]) -> Session {
        Session {
            id: "ssssssssssss".to_string(),
            token: token.to_string(),
            date: Utc::now(),
            access: grants
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_find_missing() {
        let (_db, repo) = setup().await;
        assert!(repo.find_one("ssssssssssss").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_creates() {
        let (_db, repo) = setup().await;
        let s = session("token0000001", &[("aaaaaaaaaaaa", "access000001")]);
        repo.upsert(&s).await.unwrap();

        let found = repo.find_one("ssssssssssss").await.unwrap().unwrap();
        assert_eq!(found.token, "token0000001");
        assert_eq!(found.access, s.access);
    }

    #[tokio::test]
    async fn test_upsert_replaces_token_and_access() {
        let (_db, repo) = setup().await;
        repo.upsert(&session(
            "token0000001",
            &[("aaaaaaaaaaaa", "access000001"), ("bbbbbbbbbbbb", "access000002")],
        ))
        .await
        .unwrap();

        let replacement = session("token0000002", &[("cccccccccccc", "access000003")]);
        repo.upsert(&replacement).await.unwrap();

        let found = repo.find_one("ssssssssssss").await.unwrap().unwrap();
        assert_eq!(found.token, "token0000002");
        assert_eq!(found.access, replacement.access);
    }

    #[tokio::test]
    async fn test_closed_pool_is_unavailable() {
        let (db, repo) = setup().await;
        db.close().await;

        let result = repo.upsert(&session("token0000001", &[])).await;
        assert!(matches!(result, Err(LockboxError::StoreUnavailable(_))));
    }
}
