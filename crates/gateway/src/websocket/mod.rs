//! Real-time collaboration gateway
//!
//! Keeps ticket conversations live over persistent WebSocket connections:
//! - Room-based message delivery for conversations
//! - Agent presence shared across each agent's open connections
//! - Ticket viewer tracking (who's looking at which tickets)
//! - Conversation activity tracking that gates absent-party notifications
//! - Typing indicators
//!
//! # Architecture
//!
//! - **Connection**: an authenticated WebSocket connection and its cleanup keys
//! - **RoomRegistry**: conversation/ticket pub/sub for broadcasting events
//! - **PresenceRegistry / ViewerTracker / ActivityTracker**: shared trackers,
//!   one lock each
//! - **Relay**: message pipeline with detached side effects
//! - **Handler**: Axum WebSocket route handler and disconnect cleanup
//! - **Events**: type-safe command/event definitions

pub mod activity;
pub mod connection;
pub mod events;
pub mod handler;
pub mod presence;
pub mod relay;
pub mod room;
pub mod state;
pub mod viewers;

pub use handler::ws_handler;
pub use state::GatewayState;
