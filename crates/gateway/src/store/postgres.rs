//! Postgres-backed store implementation

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use deskhub_shared::{
    AgentRecord, Conversation, NewMessage, PresenceStatus, SenderType, StoreError, StoredMessage,
};

use super::{AgentStore, ConversationStore};

/// Store backed by the platform's Postgres database
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    sender_type: String,
    content: String,
    message_type: String,
    metadata: Option<serde_json::Value>,
    created_at: OffsetDateTime,
}

impl From<MessageRow> for StoredMessage {
    fn from(row: MessageRow) -> Self {
        StoredMessage {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            sender_type: SenderType::parse(&row.sender_type).unwrap_or(SenderType::Customer),
            content: row.content,
            message_type: row.message_type,
            metadata: row.metadata,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: Uuid,
    slug: String,
    name: String,
    email: Option<String>,
    presence_status: String,
    last_seen_at: Option<OffsetDateTime>,
}

impl From<AgentRow> for AgentRecord {
    fn from(row: AgentRow) -> Self {
        AgentRecord {
            id: row.id,
            slug: row.slug,
            name: row.name,
            email: row.email,
            presence_status: PresenceStatus::parse(&row.presence_status)
                .unwrap_or(PresenceStatus::Offline),
            last_seen_at: row.last_seen_at,
        }
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn conversation(&self, id: Uuid) -> Result<Option<Conversation>, StoreError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT c.id, c.ticket_id, t.ticket_number, t.subject,
                   c.customer_id, cu.name AS customer_name, cu.email AS customer_email,
                   t.assigned_agent_id,
                   c.first_response_at, c.first_response_seconds, c.created_at
            FROM conversations c
            JOIN tickets t ON t.id = c.ticket_id
            JOIN customers cu ON cu.id = c.customer_id
            WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, conversation_id, sender_id, sender_type,
                   content, message_type, metadata, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        // Window is fetched newest-first; callers want chronological order
        let mut messages: Vec<StoredMessage> = rows.into_iter().map(Into::into).collect();
        messages.reverse();
        Ok(messages)
    }

    async fn create_message(&self, message: NewMessage) -> Result<StoredMessage, StoreError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (conversation_id, sender_id, sender_type,
                                  content, message_type, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, conversation_id, sender_id, sender_type,
                      content, message_type, metadata, created_at
            "#,
        )
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(message.sender_type.as_str())
        .bind(&message.content)
        .bind(&message.message_type)
        .bind(&message.metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }
}

#[async_trait]
impl AgentStore for PgStore {
    async fn agent(&self, id: Uuid) -> Result<Option<AgentRecord>, StoreError> {
        let row = sqlx::query_as::<_, AgentRow>(
            r#"
            SELECT id, slug, name, email, presence_status, last_seen_at
            FROM agents
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn agents(&self, ids: &[Uuid]) -> Result<Vec<AgentRecord>, StoreError> {
        let rows = sqlx::query_as::<_, AgentRow>(
            r#"
            SELECT id, slug, name, email, presence_status, last_seen_at
            FROM agents
            WHERE id = ANY($1)
            ORDER BY name ASC
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_presence(
        &self,
        id: Uuid,
        status: PresenceStatus,
        last_seen_at: Option<OffsetDateTime>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE agents
            SET presence_status = $2,
                last_seen_at = COALESCE($3, last_seen_at),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(last_seen_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
