//! Room management for pub/sub
//!
//! Two room families are multiplexed over each connection: conversation
//! rooms (message delivery) and ticket rooms (viewer presence). The
//! registry is domain-agnostic and never consults storage; existence
//! checks belong to the caller.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::connection::Connection;
use super::events::ServerEvent;

/// Logical room name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomId {
    Conversation(Uuid),
    Ticket(Uuid),
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomId::Conversation(id) => write!(f, "conversation:{id}"),
            RoomId::Ticket(id) => write!(f, "ticket:{id}"),
        }
    }
}

/// Tracks room membership and delivers broadcasts
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, Vec<Arc<Connection>>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection to a room; joining twice is a no-op so a member
    /// never receives the same broadcast more than once per call
    pub async fn join(&self, room: RoomId, conn: Arc<Connection>) {
        let mut rooms = self.rooms.write().await;
        let members = rooms.entry(room).or_default();
        if !members.iter().any(|c| c.id == conn.id) {
            members.push(Arc::clone(&conn));
        }

        tracing::debug!(
            room = %room,
            connection_id = %conn.id,
            room_size = members.len(),
            "Connection joined room"
        );
    }

    /// Remove a connection from a room
    pub async fn leave(&self, room: RoomId, connection_id: Uuid) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(&room) {
            members.retain(|c| c.id != connection_id);

            // Clean up empty rooms
            if members.is_empty() {
                rooms.remove(&room);
                tracing::debug!(room = %room, "Removed empty room");
            } else {
                tracing::debug!(
                    room = %room,
                    connection_id = %connection_id,
                    room_size = members.len(),
                    "Connection left room"
                );
            }
        }
    }

    /// Broadcast an event to every member of a room, at most once each,
    /// optionally excluding one connection (typically the originator)
    ///
    /// Silently ignores send errors (closed connections will be cleaned up)
    pub async fn broadcast(&self, room: RoomId, event: ServerEvent, exclude: Option<Uuid>) {
        let rooms = self.rooms.read().await;
        let Some(members) = rooms.get(&room) else {
            tracing::debug!(room = %room, "Broadcast to empty room - no subscribers");
            return;
        };

        let mut delivered = 0;
        for conn in members {
            if Some(conn.id) == exclude {
                continue;
            }
            match conn.send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::warn!(
                        connection_id = %conn.id,
                        "Failed to send event to connection (likely closed)"
                    );
                }
            }
        }

        tracing::debug!(room = %room, recipients = delivered, "Broadcast event to room");
    }

    /// Remove a connection from all rooms
    pub async fn remove_connection(&self, connection_id: Uuid) {
        let mut rooms = self.rooms.write().await;
        for members in rooms.values_mut() {
            members.retain(|c| c.id != connection_id);
        }
        rooms.retain(|_, members| !members.is_empty());
    }

    /// Number of members in a room
    pub async fn member_count(&self, room: RoomId) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(&room).map(|m| m.len()).unwrap_or(0)
    }

    /// Total number of active rooms
    pub async fn room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use deskhub_shared::Role;
    use tokio::sync::mpsc;

    fn test_conn() -> (Arc<Connection>, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let identity = Identity {
            id: Uuid::new_v4(),
            role: Role::Agent,
            name: "Test".to_string(),
        };
        (Arc::new(Connection::new(identity, tx)), rx)
    }

    #[tokio::test]
    async fn test_room_join_and_leave() {
        let rooms = RoomRegistry::new();
        let room = RoomId::Ticket(Uuid::new_v4());
        let (conn, _rx) = test_conn();

        assert_eq!(rooms.member_count(room).await, 0);

        rooms.join(room, Arc::clone(&conn)).await;
        assert_eq!(rooms.member_count(room).await, 1);

        rooms.leave(room, conn.id).await;
        assert_eq!(rooms.member_count(room).await, 0);
        assert_eq!(rooms.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_join_delivers_once() {
        let rooms = RoomRegistry::new();
        let room = RoomId::Conversation(Uuid::new_v4());
        let (conn, mut rx) = test_conn();

        rooms.join(room, Arc::clone(&conn)).await;
        rooms.join(room, Arc::clone(&conn)).await;
        assert_eq!(rooms.member_count(room).await, 1);

        rooms
            .broadcast(room, ServerEvent::Error { message: "x".into() }, None)
            .await;
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_excludes_originator() {
        let rooms = RoomRegistry::new();
        let room = RoomId::Conversation(Uuid::new_v4());
        let (conn1, mut rx1) = test_conn();
        let (conn2, mut rx2) = test_conn();

        rooms.join(room, Arc::clone(&conn1)).await;
        rooms.join(room, Arc::clone(&conn2)).await;

        rooms
            .broadcast(
                room,
                ServerEvent::Error { message: "x".into() },
                Some(conn1.id),
            )
            .await;

        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_room_families_are_independent() {
        let rooms = RoomRegistry::new();
        let id = Uuid::new_v4();
        let (conn, mut rx) = test_conn();

        // Same uuid, different family: only the joined family receives
        rooms.join(RoomId::Conversation(id), Arc::clone(&conn)).await;
        rooms
            .broadcast(RoomId::Ticket(id), ServerEvent::Error { message: "x".into() }, None)
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_remove_connection_from_all_rooms() {
        let rooms = RoomRegistry::new();
        let (conn, _rx) = test_conn();

        rooms
            .join(RoomId::Conversation(Uuid::new_v4()), Arc::clone(&conn))
            .await;
        rooms.join(RoomId::Ticket(Uuid::new_v4()), Arc::clone(&conn)).await;
        assert_eq!(rooms.room_count().await, 2);

        rooms.remove_connection(conn.id).await;
        assert_eq!(rooms.room_count().await, 0);
    }
}
