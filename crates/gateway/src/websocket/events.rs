//! Wire protocol for the collaboration gateway
//!
//! Closed sets of client commands and server events with type-safe serde
//! (de)serialization. Commands arrive wrapped in an envelope carrying an
//! optional ack id; dispatch is an exhaustive match, never a string lookup.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use deskhub_shared::{Conversation, PresenceStatus, Role, StoredMessage};

use crate::error::{AckError, ErrorCode};

/// Outcome of dispatching a single command
pub type CommandResult = Result<AckData, AckError>;

// =============================================================================
// Client-to-Server Commands
// =============================================================================

/// Commands sent from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    /// Join a conversation room and start activity tracking
    #[serde(rename = "join:conversation")]
    JoinConversation { conversation_id: Uuid },

    /// Start viewing a ticket (collaborative-awareness avatars)
    #[serde(rename = "ticket:view")]
    TicketView {
        ticket_id: Uuid,
        user_id: Option<Uuid>,
        user_name: Option<String>,
        user_avatar: Option<String>,
    },

    /// Stop viewing a ticket; falls back to the connection's current ticket
    #[serde(rename = "ticket:leave")]
    TicketLeave { ticket_id: Option<Uuid> },

    /// Send a chat message into a conversation
    #[serde(rename = "message:send")]
    MessageSend {
        conversation_id: Uuid,
        client_message_id: Option<String>,
        content: String,
        #[serde(default = "default_message_type")]
        message_type: String,
        metadata: Option<Value>,
    },

    /// Start typing in a conversation
    #[serde(rename = "typing:start")]
    TypingStart { conversation_id: Uuid },

    /// Stop typing in a conversation
    #[serde(rename = "typing:stop")]
    TypingStop { conversation_id: Uuid },

    /// Set an agent's presence status
    ///
    /// The status arrives as a raw string so an unknown value can be
    /// rejected with `invalid_status` rather than a parse failure.
    #[serde(rename = "presence:update")]
    PresenceUpdate {
        agent_id: Uuid,
        presence_status: String,
    },

    /// Fetch merged presence for a set of agents
    #[serde(rename = "presence:get")]
    PresenceGet { agent_ids: Vec<Uuid> },
}

fn default_message_type() -> String {
    "text".to_string()
}

/// An inbound frame: a command plus an optional ack id
#[derive(Debug)]
pub struct Envelope {
    pub id: Option<u64>,
    pub command: ClientCommand,
}

impl Envelope {
    /// Parse a raw text frame.
    ///
    /// The ack id is recovered even when the command itself fails to
    /// parse, so the failure can still be acknowledged to the caller.
    pub fn parse(text: &str) -> Result<Self, (Option<u64>, serde_json::Error)> {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => return Err((None, e)),
        };
        let id = value.get("id").and_then(Value::as_u64);
        match serde_json::from_value(value) {
            Ok(command) => Ok(Self { id, command }),
            Err(e) => Err((id, e)),
        }
    }
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Events sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Connection acknowledged
    #[serde(rename = "connected")]
    Connected { connection_id: Uuid },

    /// Command acknowledgement: `{success: true, ...}` or
    /// `{success: false, code, message}`
    #[serde(rename = "ack")]
    Ack {
        id: u64,
        success: bool,
        #[serde(flatten)]
        data: Option<AckData>,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<ErrorCode>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Out-of-band error (no ack id was supplied)
    #[serde(rename = "error")]
    Error { message: String },

    /// New message added to a conversation
    #[serde(rename = "message:new")]
    MessageNew {
        conversation_id: Uuid,
        message: StoredMessage,
    },

    /// Someone started or stopped typing in a conversation
    #[serde(rename = "typing:update")]
    TypingUpdate {
        conversation_id: Uuid,
        user: TypingUser,
        typing: bool,
    },

    /// A viewer joined a ticket
    #[serde(rename = "ticket:viewer:joined")]
    TicketViewerJoined { ticket_id: Uuid, viewer: TicketViewer },

    /// A viewer left a ticket
    #[serde(rename = "ticket:viewer:left")]
    TicketViewerLeft { ticket_id: Uuid, user_id: Uuid },

    /// Agent presence changed (global, not room-scoped)
    #[serde(rename = "agent:presence:update")]
    AgentPresenceUpdate {
        agent_id: Uuid,
        presence_status: PresenceStatus,
        #[serde(with = "time::serde::rfc3339::option")]
        last_seen_at: Option<OffsetDateTime>,
        #[serde(with = "time::serde::rfc3339")]
        updated_at: OffsetDateTime,
    },
}

impl ServerEvent {
    /// Build an ack frame from a dispatch outcome
    pub fn ack(id: u64, result: CommandResult) -> Self {
        match result {
            Ok(data) => ServerEvent::Ack {
                id,
                success: true,
                data: Some(data),
                code: None,
                message: None,
            },
            Err(e) => ServerEvent::Ack {
                id,
                success: false,
                data: None,
                code: Some(e.code),
                message: Some(e.message),
            },
        }
    }
}

// =============================================================================
// Event Data Structures
// =============================================================================

/// Typed ack payloads, flattened into the ack frame
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AckData {
    ConversationJoined {
        conversation: Conversation,
        messages: Vec<StoredMessage>,
    },
    TicketViewers {
        viewers: Vec<TicketViewer>,
    },
    MessageSent {
        #[serde(skip_serializing_if = "Option::is_none")]
        client_message_id: Option<String>,
        message: StoredMessage,
    },
    PresenceSet {
        presence_status: PresenceStatus,
        #[serde(with = "time::serde::rfc3339::option")]
        last_seen_at: Option<OffsetDateTime>,
    },
    PresenceList {
        presence: Vec<PresenceSnapshot>,
    },
    Empty {},
}

/// Identity snapshot of a connection viewing a ticket
#[derive(Debug, Clone, Serialize)]
pub struct TicketViewer {
    pub user_id: Uuid,
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_avatar: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

/// Who is typing
#[derive(Debug, Clone, Serialize)]
pub struct TypingUser {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
}

/// Merged presence row returned by presence:get
#[derive(Debug, Clone, Serialize)]
pub struct PresenceSnapshot {
    pub agent_id: Uuid,
    pub agent_slug: String,
    pub name: String,
    pub presence_status: PresenceStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_seen_at: Option<OffsetDateTime>,
    pub is_online: bool,
}
