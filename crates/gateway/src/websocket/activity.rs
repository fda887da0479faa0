//! Conversation activity tracking
//!
//! Tracks, per conversation, whether at least one customer connection and
//! at least one agent connection is currently joined. Used only to gate
//! absent-party notification dispatch; nothing here is persisted.

use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use deskhub_shared::Role;

/// Connection sets per conversation. A connection id lives in at most one
/// of the two sets, picked by its role at join time.
#[derive(Debug, Default)]
struct ActivityEntry {
    customers: HashSet<Uuid>,
    agents: HashSet<Uuid>,
}

/// Per-conversation activity registry
pub struct ActivityTracker {
    conversations: RwLock<HashMap<Uuid, ActivityEntry>>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection as active in a conversation
    pub async fn mark_active(&self, conversation_id: Uuid, connection_id: Uuid, role: Role) {
        let mut conversations = self.conversations.write().await;
        let entry = conversations.entry(conversation_id).or_default();
        if role.is_agent_side() {
            entry.agents.insert(connection_id);
        } else {
            entry.customers.insert(connection_id);
        }
    }

    /// Remove a connection from a conversation; empty entries are discarded
    pub async fn remove(&self, conversation_id: Uuid, connection_id: Uuid) {
        let mut conversations = self.conversations.write().await;
        if let Some(entry) = conversations.get_mut(&conversation_id) {
            entry.customers.remove(&connection_id);
            entry.agents.remove(&connection_id);
            if entry.customers.is_empty() && entry.agents.is_empty() {
                conversations.remove(&conversation_id);
            }
        }
    }

    /// True iff at least one customer connection is joined
    pub async fn is_customer_active(&self, conversation_id: Uuid) -> bool {
        let conversations = self.conversations.read().await;
        conversations
            .get(&conversation_id)
            .map(|e| !e.customers.is_empty())
            .unwrap_or(false)
    }

    /// True iff at least one agent connection is joined
    pub async fn is_agent_active(&self, conversation_id: Uuid) -> bool {
        let conversations = self.conversations.read().await;
        conversations
            .get(&conversation_id)
            .map(|e| !e.agents.is_empty())
            .unwrap_or(false)
    }

    /// Number of conversations with any active connection
    pub async fn tracked_conversations(&self) -> usize {
        let conversations = self.conversations.read().await;
        conversations.len()
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roles_land_in_disjoint_sets() {
        let tracker = ActivityTracker::new();
        let conversation = Uuid::new_v4();

        tracker
            .mark_active(conversation, Uuid::new_v4(), Role::Customer)
            .await;
        assert!(tracker.is_customer_active(conversation).await);
        assert!(!tracker.is_agent_active(conversation).await);

        tracker
            .mark_active(conversation, Uuid::new_v4(), Role::Agent)
            .await;
        assert!(tracker.is_agent_active(conversation).await);
    }

    #[tokio::test]
    async fn test_admin_counts_as_agent() {
        let tracker = ActivityTracker::new();
        let conversation = Uuid::new_v4();

        tracker
            .mark_active(conversation, Uuid::new_v4(), Role::Admin)
            .await;
        assert!(tracker.is_agent_active(conversation).await);
        assert!(!tracker.is_customer_active(conversation).await);
    }

    #[tokio::test]
    async fn test_remove_discards_empty_entry() {
        let tracker = ActivityTracker::new();
        let conversation = Uuid::new_v4();
        let conn = Uuid::new_v4();

        tracker.mark_active(conversation, conn, Role::Customer).await;
        assert_eq!(tracker.tracked_conversations().await, 1);

        tracker.remove(conversation, conn).await;
        assert!(!tracker.is_customer_active(conversation).await);
        assert_eq!(tracker.tracked_conversations().await, 0);

        // Removing again is a no-op
        tracker.remove(conversation, conn).await;
    }

    #[tokio::test]
    async fn test_activity_is_per_conversation() {
        let tracker = ActivityTracker::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        tracker.mark_active(a, Uuid::new_v4(), Role::Customer).await;
        assert!(tracker.is_customer_active(a).await);
        assert!(!tracker.is_customer_active(b).await);
    }
}
