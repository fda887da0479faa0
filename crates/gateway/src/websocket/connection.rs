//! WebSocket connection management
//!
//! Represents an active connection together with the per-connection keys
//! the disconnect cleanup walks. The connection is owned exclusively by
//! the gateway and destroyed on disconnect.

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use deskhub_shared::Role;

use super::events::ServerEvent;
use crate::identity::Identity;

/// An active gateway connection
#[derive(Debug)]
pub struct Connection {
    /// Unique id for this connection
    pub id: Uuid,

    /// Caller identity resolved at connect time
    pub identity: Identity,

    /// Channel to send events to this connection
    pub sender: mpsc::UnboundedSender<ServerEvent>,

    /// Ticket currently viewed; at most one at a time
    pub viewing_ticket: RwLock<Option<Uuid>>,

    /// Conversation tracked for activity, with the role recorded at join
    pub active_conversation: RwLock<Option<(Uuid, Role)>>,

    /// Agent id registered via presence:update
    pub presence_agent: RwLock<Option<Uuid>>,
}

impl Connection {
    /// Create a new connection
    pub fn new(identity: Identity, sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            sender,
            viewing_ticket: RwLock::new(None),
            active_conversation: RwLock::new(None),
            presence_agent: RwLock::new(None),
        }
    }

    /// Send an event to this connection
    ///
    /// Returns Ok(()) if sent successfully, Err if the connection is closed
    #[allow(clippy::result_large_err)] // Error type is from tokio mpsc, containing the failed event
    pub fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::SendError<ServerEvent>> {
        self.sender.send(event)
    }
}
