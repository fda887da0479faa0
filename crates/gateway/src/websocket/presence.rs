//! Agent presence registry
//!
//! One entry per agent, shared across that agent's simultaneously open
//! connections. The entry exists only while at least one connection is
//! reporting for the agent; persistence mirroring and broadcasting are
//! the caller's job and happen outside the registry lock.

use std::collections::{HashMap, HashSet};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use deskhub_shared::PresenceStatus;

/// In-memory presence entry for one agent
#[derive(Debug, Clone)]
pub struct PresenceEntry {
    /// Connections currently reporting for this agent
    pub connections: HashSet<Uuid>,
    pub status: PresenceStatus,
    pub last_seen_at: Option<OffsetDateTime>,
}

/// Registry of live agent presence, keyed by agent id
pub struct PresenceRegistry {
    agents: RwLock<HashMap<Uuid, PresenceEntry>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Apply a status update from one of the agent's connections.
    ///
    /// Last writer wins across connections. Only `online` stamps a fresh
    /// liveness timestamp; other statuses keep the previous one. Returns
    /// the entry's last_seen_at after the update.
    pub async fn set(
        &self,
        agent_id: Uuid,
        connection_id: Uuid,
        status: PresenceStatus,
        now: OffsetDateTime,
    ) -> Option<OffsetDateTime> {
        let mut agents = self.agents.write().await;
        let entry = agents.entry(agent_id).or_insert_with(|| PresenceEntry {
            connections: HashSet::new(),
            status,
            last_seen_at: None,
        });
        entry.connections.insert(connection_id);
        entry.status = status;
        if status == PresenceStatus::Online {
            entry.last_seen_at = Some(now);
        }

        tracing::debug!(
            agent_id = %agent_id,
            connection_id = %connection_id,
            status = status.as_str(),
            connections = entry.connections.len(),
            "Presence updated"
        );

        entry.last_seen_at
    }

    /// In-memory view for one agent, if any connection reported presence
    pub async fn snapshot(&self, agent_id: Uuid) -> Option<PresenceEntry> {
        let agents = self.agents.read().await;
        agents.get(&agent_id).cloned()
    }

    /// True iff the agent currently has at least one tracked connection
    pub async fn is_online(&self, agent_id: Uuid) -> bool {
        let agents = self.agents.read().await;
        agents
            .get(&agent_id)
            .map(|e| !e.connections.is_empty())
            .unwrap_or(false)
    }

    /// Drop one connection from the agent's entry.
    ///
    /// Returns the final entry when the connection set drained and the
    /// entry was removed; the caller then persists and broadcasts the
    /// offline transition. Safe to call repeatedly.
    pub async fn drop_connection(
        &self,
        agent_id: Uuid,
        connection_id: Uuid,
    ) -> Option<PresenceEntry> {
        let mut agents = self.agents.write().await;
        let entry = agents.get_mut(&agent_id)?;
        entry.connections.remove(&connection_id);
        if entry.connections.is_empty() {
            agents.remove(&agent_id)
        } else {
            None
        }
    }

    /// Number of agents with live presence
    pub async fn tracked_agents(&self) -> usize {
        let agents = self.agents.read().await;
        agents.len()
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_drop() {
        let registry = PresenceRegistry::new();
        let agent = Uuid::new_v4();
        let conn = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        registry.set(agent, conn, PresenceStatus::Online, now).await;
        assert!(registry.is_online(agent).await);

        let drained = registry.drop_connection(agent, conn).await;
        assert!(drained.is_some());
        assert!(!registry.is_online(agent).await);
        assert_eq!(registry.tracked_agents().await, 0);
    }

    #[tokio::test]
    async fn test_agent_stays_online_until_last_connection_drops() {
        let registry = PresenceRegistry::new();
        let agent = Uuid::new_v4();
        let conn1 = Uuid::new_v4();
        let conn2 = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        registry.set(agent, conn1, PresenceStatus::Online, now).await;
        registry.set(agent, conn2, PresenceStatus::Online, now).await;

        assert!(registry.drop_connection(agent, conn1).await.is_none());
        assert!(registry.is_online(agent).await);

        let drained = registry.drop_connection(agent, conn2).await;
        assert!(drained.is_some());
        assert!(!registry.is_online(agent).await);
    }

    #[tokio::test]
    async fn test_last_writer_wins_across_connections() {
        let registry = PresenceRegistry::new();
        let agent = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        registry
            .set(agent, Uuid::new_v4(), PresenceStatus::Online, now)
            .await;
        registry
            .set(agent, Uuid::new_v4(), PresenceStatus::Busy, now)
            .await;

        let entry = registry.snapshot(agent).await.unwrap();
        assert_eq!(entry.status, PresenceStatus::Busy);
        assert_eq!(entry.connections.len(), 2);
    }

    #[tokio::test]
    async fn test_only_online_stamps_last_seen() {
        let registry = PresenceRegistry::new();
        let agent = Uuid::new_v4();
        let conn = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        let last_seen = registry.set(agent, conn, PresenceStatus::Away, now).await;
        assert!(last_seen.is_none());

        let last_seen = registry.set(agent, conn, PresenceStatus::Online, now).await;
        assert_eq!(last_seen, Some(now));

        // A later non-online status keeps the previous stamp
        let later = now + time::Duration::minutes(5);
        let last_seen = registry.set(agent, conn, PresenceStatus::Dnd, later).await;
        assert_eq!(last_seen, Some(now));
    }

    #[tokio::test]
    async fn test_drop_unknown_connection_is_noop() {
        let registry = PresenceRegistry::new();
        assert!(registry
            .drop_connection(Uuid::new_v4(), Uuid::new_v4())
            .await
            .is_none());
    }
}
