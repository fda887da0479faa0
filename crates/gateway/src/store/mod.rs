//! External persistence seams
//!
//! The gateway treats conversation/message/agent storage as opaque
//! services behind these traits; the Postgres implementation lives in
//! [`postgres`]. Handlers never hold a tracker lock across a call into
//! a store.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use deskhub_shared::{
    AgentRecord, Conversation, NewMessage, PresenceStatus, StoreError, StoredMessage,
};

pub mod postgres;

pub use postgres::PgStore;

/// Read/write access to conversations and their messages
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Fetch a conversation with its ticket and customer fields
    async fn conversation(&self, id: Uuid) -> Result<Option<Conversation>, StoreError>;

    /// Most recent messages of a conversation, returned oldest-first
    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, StoreError>;

    /// Persist a message, returning the canonical stored row
    async fn create_message(&self, message: NewMessage) -> Result<StoredMessage, StoreError>;
}

/// Read/write access to agent records
#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn agent(&self, id: Uuid) -> Result<Option<AgentRecord>, StoreError>;

    async fn agents(&self, ids: &[Uuid]) -> Result<Vec<AgentRecord>, StoreError>;

    /// Mirror a presence change onto the persistent agent record
    async fn update_presence(
        &self,
        id: Uuid,
        status: PresenceStatus,
        last_seen_at: Option<OffsetDateTime>,
    ) -> Result<(), StoreError>;
}
