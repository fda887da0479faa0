//! Ticket viewer tracking
//!
//! Tracks, per ticket, the set of connections currently rendering its
//! detail view, for the "who's looking at this" avatars. Pure ephemeral
//! state; nothing here is persisted.

use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::events::TicketViewer;

/// Result of removing a viewer entry
#[derive(Debug)]
pub struct ViewerLeft {
    pub user_id: Uuid,
    /// Viewers remaining on the ticket after removal
    pub remaining: usize,
}

/// Per-ticket viewer registry, keyed by (ticket id, connection id)
pub struct ViewerTracker {
    tickets: RwLock<HashMap<Uuid, HashMap<Uuid, TicketViewer>>>,
}

impl ViewerTracker {
    pub fn new() -> Self {
        Self {
            tickets: RwLock::new(HashMap::new()),
        }
    }

    /// Insert (or overwrite) the caller's entry and return the full
    /// viewer list including the caller, ordered by join time, so the
    /// caller can render initial state without racing the broadcast
    pub async fn view(
        &self,
        ticket_id: Uuid,
        connection_id: Uuid,
        viewer: TicketViewer,
    ) -> Vec<TicketViewer> {
        let mut tickets = self.tickets.write().await;
        let entries = tickets.entry(ticket_id).or_default();
        entries.insert(connection_id, viewer);

        let mut viewers: Vec<TicketViewer> = entries.values().cloned().collect();
        viewers.sort_by_key(|v| v.joined_at);
        viewers
    }

    /// Remove the caller's entry; the per-ticket map is discarded once
    /// empty. Returns None when no entry existed (already-removed calls
    /// are no-ops).
    pub async fn leave(&self, ticket_id: Uuid, connection_id: Uuid) -> Option<ViewerLeft> {
        let mut tickets = self.tickets.write().await;
        let entries = tickets.get_mut(&ticket_id)?;
        let removed = entries.remove(&connection_id)?;
        let remaining = entries.len();
        if entries.is_empty() {
            tickets.remove(&ticket_id);
        }
        Some(ViewerLeft {
            user_id: removed.user_id,
            remaining,
        })
    }

    /// Current viewers of a ticket, ordered by join time
    pub async fn viewers(&self, ticket_id: Uuid) -> Vec<TicketViewer> {
        let tickets = self.tickets.read().await;
        let mut viewers: Vec<TicketViewer> = tickets
            .get(&ticket_id)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default();
        viewers.sort_by_key(|v| v.joined_at);
        viewers
    }

    /// Number of tickets with at least one viewer
    pub async fn tracked_tickets(&self) -> usize {
        let tickets = self.tickets.read().await;
        tickets.len()
    }
}

impl Default for ViewerTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn viewer(name: &str) -> TicketViewer {
        TicketViewer {
            user_id: Uuid::new_v4(),
            user_name: name.to_string(),
            user_avatar: None,
            joined_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn test_view_returns_full_list_including_caller() {
        let tracker = ViewerTracker::new();
        let ticket = Uuid::new_v4();

        let first = tracker.view(ticket, Uuid::new_v4(), viewer("Ana")).await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].user_name, "Ana");

        let second = tracker.view(ticket, Uuid::new_v4(), viewer("Ben")).await;
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn test_view_overwrites_same_connection() {
        let tracker = ViewerTracker::new();
        let ticket = Uuid::new_v4();
        let conn = Uuid::new_v4();

        tracker.view(ticket, conn, viewer("Ana")).await;
        let viewers = tracker.view(ticket, conn, viewer("Ana B")).await;
        assert_eq!(viewers.len(), 1);
        assert_eq!(viewers[0].user_name, "Ana B");
    }

    #[tokio::test]
    async fn test_leave_discards_empty_ticket() {
        let tracker = ViewerTracker::new();
        let ticket = Uuid::new_v4();
        let conn = Uuid::new_v4();

        tracker.view(ticket, conn, viewer("Ana")).await;
        let left = tracker.leave(ticket, conn).await.unwrap();
        assert_eq!(left.remaining, 0);
        assert_eq!(tracker.tracked_tickets().await, 0);

        // Second leave is a no-op
        assert!(tracker.leave(ticket, conn).await.is_none());
    }

    #[tokio::test]
    async fn test_leave_reports_remaining_viewers() {
        let tracker = ViewerTracker::new();
        let ticket = Uuid::new_v4();
        let conn1 = Uuid::new_v4();
        let conn2 = Uuid::new_v4();

        tracker.view(ticket, conn1, viewer("Ana")).await;
        tracker.view(ticket, conn2, viewer("Ben")).await;

        let left = tracker.leave(ticket, conn1).await.unwrap();
        assert_eq!(left.remaining, 1);
        assert_eq!(tracker.viewers(ticket).await.len(), 1);
    }
}
