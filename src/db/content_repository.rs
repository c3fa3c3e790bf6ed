//! Content repository for Lockbox.
//!
//! SQLite implementation of [`ContentStore`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

use super::{ContentStore, DbPool};
use crate::content::{Content, ContentKind, FileInfo, Protection};
use crate::{LockboxError, Result};

const SELECT_CONTENT: &str = "SELECT id, created_at, is_group, name, extension, mime_type,
        expires_at, password_hash, access_token
 FROM contents";

/// Repository for content records.
#[derive(Debug, Clone)]
pub struct ContentRepository {
    pool: DbPool,
}

impl ContentRepository {
    /// Create a new ContentRepository over the given pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn members_of(&self, group_ids: &[&str]) -> Result<HashMap<String, Vec<String>>> {
        let mut members: HashMap<String, Vec<String>> = HashMap::new();
        if group_ids.is_empty() {
            return Ok(members);
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT group_id, member_id FROM group_members WHERE group_id IN (");
        let mut separated = query.separated(", ");
        for id in group_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY group_id, position");

        let rows: Vec<(String, String)> = query.build_query_as().fetch_all(&self.pool).await?;
        for (group_id, member_id) in rows {
            members.entry(group_id).or_default().push(member_id);
        }
        Ok(members)
    }
}

#[async_trait]
impl ContentStore for ContentRepository {
    async fn find_one(&self, id: &str) -> Result<Option<Content>> {
        let row: Option<ContentRow> = sqlx::query_as(&format!("{SELECT_CONTENT} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut members = if row.is_group {
            self.members_of(&[row.id.as_str()]).await?
        } else {
            HashMap::new()
        };
        let group_members = members.remove(&row.id).unwrap_or_default();
        row.into_content(group_members).map(Some)
    }

    async fn find_many(&self, ids: &[String]) -> Result<Vec<Content>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_CONTENT);
        query.push(" WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");

        let rows: Vec<ContentRow> = query.build_query_as().fetch_all(&self.pool).await?;

        let group_ids: Vec<&str> = rows
            .iter()
            .filter(|r| r.is_group)
            .map(|r| r.id.as_str())
            .collect();
        let mut members = self.members_of(&group_ids).await?;

        let mut by_id = HashMap::with_capacity(rows.len());
        for row in rows {
            let group_members = members.remove(&row.id).unwrap_or_default();
            let content = row.into_content(group_members)?;
            by_id.insert(content.id.clone(), content);
        }

        // Request order, missing ids skipped
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn insert_many(&self, records: &[Content]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            let (name, extension, mime_type) = match &record.kind {
                ContentKind::File(info) => (
                    Some(info.name.as_str()),
                    Some(info.extension.as_str()),
                    Some(info.mime_type.as_str()),
                ),
                ContentKind::Group { .. } => (None, None, None),
            };
            let (password_hash, access_token) = match &record.protection {
                Some(p) => (Some(p.password_hash.as_str()), Some(p.access_token.as_str())),
                None => (None, None),
            };

            sqlx::query(
                "INSERT INTO contents (id, created_at, is_group, name, extension, mime_type,
                                       expires_at, password_hash, access_token)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&record.id)
            .bind(record.date)
            .bind(record.is_group())
            .bind(name)
            .bind(extension)
            .bind(mime_type)
            .bind(record.expires_at)
            .bind(password_hash)
            .bind(access_token)
            .execute(&mut *tx)
            .await?;

            for (position, member_id) in record.members().iter().enumerate() {
                sqlx::query(
                    "INSERT INTO group_members (group_id, position, member_id) VALUES (?, ?, ?)",
                )
                .bind(&record.id)
                .bind(position as i64)
                .bind(member_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Internal struct for mapping database rows to Content.
#[derive(sqlx::FromRow)]
struct ContentRow {
    id: String,
    created_at: DateTime<Utc>,
    is_group: bool,
    name: Option<String>,
    extension: Option<String>,
    mime_type: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    password_hash: Option<String>,
    access_token: Option<String>,
}

impl ContentRow {
    fn into_content(self, members: Vec<String>) -> Result<Content> {
        let kind = if self.is_group {
            ContentKind::Group { members }
        } else {
            ContentKind::File(FileInfo {
                name: self.name.unwrap_or_default(),
                extension: self.extension.unwrap_or_default(),
                mime_type: self
                    .mime_type
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
            })
        };

        let protection = match (self.password_hash, self.access_token) {
            (Some(password_hash), Some(access_token)) => Some(Protection {
                password_hash,
                access_token,
            }),
            (None, None) => None,
            _ => {
                return Err(LockboxError::Database(format!(
                    "content {} has a partial password protection",
                    self.id
                )))
            }
        };

        Ok(Content {
            id: self.id,
            date: self.created_at,
            expires_at: self.expires_at,
            protection,
            kind,
        })
    }
}
