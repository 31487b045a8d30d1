//! Persistence for edit sessions and their transcripts (§6:
//! `editor_sessions`/`editor_messages`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;
use wts_shared::types::MessageRole;

use crate::error::EditorError;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EditSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub site_id: Uuid,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EditMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: String,
    pub content: String,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Persistence seam for session lifecycle. Messages are ordered by
/// `created_at` ascending on read (§5 ordering guarantees).
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_session(&self, user_id: Uuid, site_id: Uuid) -> Result<EditSession, EditorError>;

    async fn get_session(&self, id: Uuid) -> Result<Option<EditSession>, EditorError>;

    async fn append_message(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
        metadata: Option<Value>,
    ) -> Result<EditMessage, EditorError>;

    async fn list_messages(&self, session_id: Uuid) -> Result<Vec<EditMessage>, EditorError>;
}

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn create_session(&self, user_id: Uuid, site_id: Uuid) -> Result<EditSession, EditorError> {
        let session = sqlx::query_as::<_, EditSession>(
            "INSERT INTO editor_sessions (id, user_id, site_id, created_at, updated_at) \
             VALUES ($1, $2, $3, now(), now()) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(site_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<EditSession>, EditorError> {
        let session = sqlx::query_as::<_, EditSession>("SELECT * FROM editor_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn append_message(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
        metadata: Option<Value>,
    ) -> Result<EditMessage, EditorError> {
        let mut tx = self.pool.begin().await?;
        let message = sqlx::query_as::<_, EditMessage>(
            "INSERT INTO editor_messages (id, session_id, role, content, metadata, created_at) \
             VALUES ($1, $2, $3, $4, $5, now()) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(role.to_string())
        .bind(content)
        .bind(metadata)
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query("UPDATE editor_sessions SET updated_at = now() WHERE id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(message)
    }

    async fn list_messages(&self, session_id: Uuid) -> Result<Vec<EditMessage>, EditorError> {
        let messages = sqlx::query_as::<_, EditMessage>(
            "SELECT * FROM editor_messages WHERE session_id = $1 ORDER BY created_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }
}
