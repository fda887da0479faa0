//! Common types used across Deskhub

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Roles and Statuses
// =============================================================================

/// Role of an authenticated caller, resolved once at connect time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Agent,
    Admin,
}

impl Role {
    /// Message sender type implied by this role (admins reply as agents)
    pub fn sender_type(self) -> SenderType {
        match self {
            Role::Agent | Role::Admin => SenderType::Agent,
            Role::Customer => SenderType::Customer,
        }
    }

    /// Whether this role sits on the agent side of a conversation
    pub fn is_agent_side(self) -> bool {
        matches!(self, Role::Agent | Role::Admin)
    }
}

/// Which side of a conversation authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    Agent,
    Customer,
}

impl SenderType {
    pub fn as_str(self) -> &'static str {
        match self {
            SenderType::Agent => "agent",
            SenderType::Customer => "customer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "agent" => Some(SenderType::Agent),
            "customer" => Some(SenderType::Customer),
            _ => None,
        }
    }
}

/// Agent availability status, shared across all of an agent's open connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Away,
    Busy,
    Offline,
    OnLeave,
    InMeeting,
    Dnd,
}

impl PresenceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Away => "away",
            PresenceStatus::Busy => "busy",
            PresenceStatus::Offline => "offline",
            PresenceStatus::OnLeave => "on_leave",
            PresenceStatus::InMeeting => "in_meeting",
            PresenceStatus::Dnd => "dnd",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "online" => Some(PresenceStatus::Online),
            "away" => Some(PresenceStatus::Away),
            "busy" => Some(PresenceStatus::Busy),
            "offline" => Some(PresenceStatus::Offline),
            "on_leave" => Some(PresenceStatus::OnLeave),
            "in_meeting" => Some(PresenceStatus::InMeeting),
            "dnd" => Some(PresenceStatus::Dnd),
            _ => None,
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// A support conversation joined with its ticket and customer fields
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub ticket_number: String,
    pub subject: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub assigned_agent_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub first_response_at: Option<OffsetDateTime>,
    pub first_response_seconds: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Conversation {
    /// True while no agent has ever replied on this conversation
    pub fn awaiting_first_response(&self) -> bool {
        self.first_response_at.is_none() && self.first_response_seconds.is_none()
    }
}

/// A persisted chat message as returned by storage
#[derive(Debug, Clone, Serialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_type: SenderType,
    pub content: String,
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A message about to be persisted
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_type: SenderType,
    pub content: String,
    pub message_type: String,
    pub metadata: Option<serde_json::Value>,
}

/// Persistent agent record
#[derive(Debug, Clone, Serialize)]
pub struct AgentRecord {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub email: Option<String>,
    pub presence_status: PresenceStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_seen_at: Option<OffsetDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_sender_type() {
        assert_eq!(Role::Agent.sender_type(), SenderType::Agent);
        assert_eq!(Role::Admin.sender_type(), SenderType::Agent);
        assert_eq!(Role::Customer.sender_type(), SenderType::Customer);
    }

    #[test]
    fn test_presence_status_round_trip() {
        for status in [
            PresenceStatus::Online,
            PresenceStatus::Away,
            PresenceStatus::Busy,
            PresenceStatus::Offline,
            PresenceStatus::OnLeave,
            PresenceStatus::InMeeting,
            PresenceStatus::Dnd,
        ] {
            assert_eq!(PresenceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PresenceStatus::parse("sleeping"), None);
    }

    #[test]
    fn test_awaiting_first_response() {
        let now = OffsetDateTime::now_utc();
        let mut conversation = Conversation {
            id: Uuid::new_v4(),
            ticket_id: Uuid::new_v4(),
            ticket_number: "TKT-1001".to_string(),
            subject: "Login issue".to_string(),
            customer_id: Uuid::new_v4(),
            customer_name: "Dana".to_string(),
            customer_email: None,
            assigned_agent_id: None,
            first_response_at: None,
            first_response_seconds: None,
            created_at: now,
        };
        assert!(conversation.awaiting_first_response());

        conversation.first_response_at = Some(now);
        assert!(!conversation.awaiting_first_response());
    }
}
