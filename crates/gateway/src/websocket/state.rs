//! Shared gateway state
//!
//! Owns every piece of shared mutable state in the process: the
//! connection table, the room registry and the three trackers. Each
//! structure takes its own lock so unrelated updates never contend.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::activity::ActivityTracker;
use super::connection::Connection;
use super::events::ServerEvent;
use super::presence::PresenceRegistry;
use super::room::RoomRegistry;
use super::viewers::ViewerTracker;

/// Gateway state shared across all connections
#[derive(Clone)]
pub struct GatewayState {
    /// All active connections indexed by connection id
    connections: Arc<RwLock<HashMap<Uuid, Arc<Connection>>>>,

    pub rooms: Arc<RoomRegistry>,
    pub presence: Arc<PresenceRegistry>,
    pub viewers: Arc<ViewerTracker>,
    pub activity: Arc<ActivityTracker>,
}

impl GatewayState {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            rooms: Arc::new(RoomRegistry::new()),
            presence: Arc::new(PresenceRegistry::new()),
            viewers: Arc::new(ViewerTracker::new()),
            activity: Arc::new(ActivityTracker::new()),
        }
    }

    /// Add a connection
    pub async fn add_connection(&self, conn: Connection) -> Arc<Connection> {
        let conn = Arc::new(conn);
        let mut connections = self.connections.write().await;
        connections.insert(conn.id, Arc::clone(&conn));

        tracing::info!(
            connection_id = %conn.id,
            user_id = %conn.identity.id,
            role = ?conn.identity.role,
            total_connections = connections.len(),
            "WebSocket connection added"
        );

        conn
    }

    /// Remove a connection
    pub async fn remove_connection(&self, connection_id: Uuid) {
        let mut connections = self.connections.write().await;
        if connections.remove(&connection_id).is_some() {
            tracing::info!(
                connection_id = %connection_id,
                remaining_connections = connections.len(),
                "WebSocket connection removed"
            );
        }
    }

    /// Get a connection by id
    pub async fn get_connection(&self, connection_id: Uuid) -> Option<Arc<Connection>> {
        let connections = self.connections.read().await;
        connections.get(&connection_id).cloned()
    }

    /// Broadcast an event to every connection (presence is global, not
    /// room-scoped), optionally excluding one connection
    pub async fn broadcast_all(&self, event: ServerEvent, exclude: Option<Uuid>) {
        let connections = self.connections.read().await;
        for conn in connections.values() {
            if Some(conn.id) == exclude {
                continue;
            }
            let _ = conn.send(event.clone());
        }
    }

    /// Total number of active connections
    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }

    /// Get statistics about the gateway state
    pub async fn stats(&self) -> GatewayStats {
        GatewayStats {
            active_connections: self.connection_count().await,
            active_rooms: self.rooms.room_count().await,
        }
    }
}

impl Default for GatewayState {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about gateway connections
#[derive(Debug, Clone)]
pub struct GatewayStats {
    pub active_connections: usize,
    pub active_rooms: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use deskhub_shared::Role;
    use tokio::sync::mpsc;

    fn test_connection() -> (Connection, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let identity = Identity {
            id: Uuid::new_v4(),
            role: Role::Customer,
            name: "Test".to_string(),
        };
        (Connection::new(identity, tx), rx)
    }

    #[tokio::test]
    async fn test_add_and_remove_connection() {
        let state = GatewayState::new();
        let (conn, _rx) = test_connection();

        let conn = state.add_connection(conn).await;
        assert_eq!(state.connection_count().await, 1);

        state.remove_connection(conn.id).await;
        assert_eq!(state.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_all_reaches_every_connection() {
        let state = GatewayState::new();
        let (conn1, mut rx1) = test_connection();
        let (conn2, mut rx2) = test_connection();

        state.add_connection(conn1).await;
        let conn2 = state.add_connection(conn2).await;

        state
            .broadcast_all(ServerEvent::Error { message: "x".into() }, Some(conn2.id))
            .await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stats() {
        let state = GatewayState::new();
        let (conn, _rx) = test_connection();
        state.add_connection(conn).await;

        let stats = state.stats().await;
        assert_eq!(stats.active_connections, 1);
        assert_eq!(stats.active_rooms, 0);
    }
}
