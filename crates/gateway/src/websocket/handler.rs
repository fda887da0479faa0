//! WebSocket handler for Axum
//!
//! Handles connection upgrade, identity resolution, command dispatch and
//! the disconnect cleanup walk.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::Response,
};
use futures::{stream::StreamExt, SinkExt};
use serde::Deserialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use uuid::Uuid;

use deskhub_shared::PresenceStatus;

use crate::error::AckError;
use crate::identity;
use crate::state::AppState;

use super::connection::Connection;
use super::events::{
    AckData, ClientCommand, CommandResult, Envelope, PresenceSnapshot, ServerEvent, TicketViewer,
    TypingUser,
};
use super::relay::{self, SendMessage};
use super::room::RoomId;

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    token: String,
}

/// WebSocket handler - upgrades HTTP connection to WebSocket
///
/// Identity is resolved from the query-parameter token before the upgrade;
/// an invalid token never reaches the socket loop.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app): State<AppState>,
    Query(params): Query<WebSocketQuery>,
) -> Result<Response, StatusCode> {
    let identity = match identity::resolve(&params.token, &app.config.jwt_secret) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(error = ?e, "WebSocket auth failed: invalid token");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    tracing::info!(user_id = %identity.id, role = ?identity.role, "WebSocket connection upgrade requested");

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, identity, app)))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, identity: identity::Identity, app: AppState) {
    let (mut sink, mut stream) = socket.split();

    // Channel for sending events to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let conn = app.gateway.add_connection(Connection::new(identity, tx)).await;
    let connection_id = conn.id;

    let _ = conn.send(ServerEvent::Connected { connection_id });

    // Spawn task to send events to the client
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sink.send(Message::Text(json)).await.is_err() {
                        break; // Connection closed
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to serialize WebSocket event");
                }
            }
        }
    });

    // Handle incoming frames
    while let Some(msg) = stream.next().await {
        if let Ok(msg) = msg {
            match msg {
                Message::Text(text) => {
                    handle_frame(&app, &conn, &text).await;
                }
                Message::Close(_) => {
                    tracing::info!(connection_id = %connection_id, "WebSocket close frame received");
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => {
                    // Axum handles ping/pong automatically
                }
                _ => {} // Ignore binary messages
            }
        }
    }

    tracing::info!(connection_id = %connection_id, "WebSocket connection closing");
    cleanup_connection(&app, &conn).await;
    send_task.abort();
}

/// Parse one inbound frame and route the ack
async fn handle_frame(app: &AppState, conn: &Arc<Connection>, text: &str) {
    match Envelope::parse(text) {
        Ok(Envelope { id, command }) => {
            let result = dispatch(app, conn, command).await;
            match (id, result) {
                (Some(id), Some(result)) => {
                    let _ = conn.send(ServerEvent::ack(id, result));
                }
                (None, Some(Err(e))) => {
                    // Caller supplied no ack id; surface the failure anyway
                    let _ = conn.send(ServerEvent::Error { message: e.message });
                }
                _ => {}
            }
        }
        Err((Some(id), e)) => {
            tracing::debug!(error = ?e, connection_id = %conn.id, "Rejected malformed command");
            let _ = conn.send(ServerEvent::ack(
                id,
                Err(AckError::invalid_payload("missing or malformed fields")),
            ));
        }
        Err((None, e)) => {
            tracing::warn!(error = ?e, connection_id = %conn.id, "Failed to parse client frame");
            let _ = conn.send(ServerEvent::Error {
                message: "invalid command payload".to_string(),
            });
        }
    }
}

/// Dispatch a command to its component. Returns None for commands that
/// never produce an ack (typing indicators).
pub async fn dispatch(
    app: &AppState,
    conn: &Arc<Connection>,
    command: ClientCommand,
) -> Option<CommandResult> {
    match command {
        ClientCommand::JoinConversation { conversation_id } => {
            Some(join_conversation(app, conn, conversation_id).await)
        }
        ClientCommand::TicketView {
            ticket_id,
            user_id,
            user_name,
            user_avatar,
        } => Some(ticket_view(app, conn, ticket_id, user_id, user_name, user_avatar).await),
        ClientCommand::TicketLeave { ticket_id } => Some(ticket_leave(app, conn, ticket_id).await),
        ClientCommand::MessageSend {
            conversation_id,
            client_message_id,
            content,
            message_type,
            metadata,
        } => Some(
            relay::send_message(
                app,
                conn,
                SendMessage {
                    conversation_id,
                    client_message_id,
                    content,
                    message_type,
                    metadata,
                },
            )
            .await,
        ),
        ClientCommand::TypingStart { conversation_id } => {
            broadcast_typing(app, conn, conversation_id, true).await;
            None
        }
        ClientCommand::TypingStop { conversation_id } => {
            broadcast_typing(app, conn, conversation_id, false).await;
            None
        }
        ClientCommand::PresenceUpdate {
            agent_id,
            presence_status,
        } => Some(presence_update(app, conn, agent_id, &presence_status).await),
        ClientCommand::PresenceGet { agent_ids } => Some(presence_get(app, &agent_ids).await),
    }
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn join_conversation(
    app: &AppState,
    conn: &Arc<Connection>,
    conversation_id: Uuid,
) -> CommandResult {
    let conversation = app
        .conversations
        .conversation(conversation_id)
        .await?
        .ok_or_else(|| AckError::not_found("conversation not found"))?;

    let role = conn.identity.role;

    // A connection tracks activity for one conversation at a time
    let previous = conn
        .active_conversation
        .write()
        .await
        .replace((conversation_id, role));
    if let Some((previous_id, _)) = previous {
        if previous_id != conversation_id {
            app.gateway.activity.remove(previous_id, conn.id).await;
            app.gateway
                .rooms
                .leave(RoomId::Conversation(previous_id), conn.id)
                .await;
        }
    }

    app.gateway
        .rooms
        .join(RoomId::Conversation(conversation_id), Arc::clone(conn))
        .await;
    app.gateway
        .activity
        .mark_active(conversation_id, conn.id, role)
        .await;

    let messages = app
        .conversations
        .recent_messages(conversation_id, app.config.recent_message_limit)
        .await?;

    Ok(AckData::ConversationJoined {
        conversation,
        messages,
    })
}

async fn ticket_view(
    app: &AppState,
    conn: &Arc<Connection>,
    ticket_id: Uuid,
    user_id: Option<Uuid>,
    user_name: Option<String>,
    user_avatar: Option<String>,
) -> CommandResult {
    // A connection views one ticket at a time; switch leaves the old one
    let previous = conn.viewing_ticket.write().await.take();
    if let Some(previous_id) = previous {
        if previous_id != ticket_id {
            leave_ticket(app, conn, previous_id).await;
        }
    }

    let viewer = TicketViewer {
        user_id: user_id.unwrap_or(conn.identity.id),
        user_name: user_name.unwrap_or_else(|| conn.identity.name.clone()),
        user_avatar,
        joined_at: OffsetDateTime::now_utc(),
    };

    let viewers = app
        .gateway
        .viewers
        .view(ticket_id, conn.id, viewer.clone())
        .await;
    app.gateway
        .rooms
        .join(RoomId::Ticket(ticket_id), Arc::clone(conn))
        .await;
    app.gateway
        .rooms
        .broadcast(
            RoomId::Ticket(ticket_id),
            ServerEvent::TicketViewerJoined { ticket_id, viewer },
            Some(conn.id),
        )
        .await;

    *conn.viewing_ticket.write().await = Some(ticket_id);

    // Ack carries the full list including the caller, so initial render
    // cannot race the joined broadcast
    Ok(AckData::TicketViewers { viewers })
}

async fn ticket_leave(
    app: &AppState,
    conn: &Arc<Connection>,
    ticket_id: Option<Uuid>,
) -> CommandResult {
    let target = match ticket_id {
        Some(id) => Some(id),
        None => *conn.viewing_ticket.read().await,
    };
    let Some(ticket_id) = target else {
        return Ok(AckData::Empty {});
    };

    leave_ticket(app, conn, ticket_id).await;

    let mut viewing = conn.viewing_ticket.write().await;
    if *viewing == Some(ticket_id) {
        *viewing = None;
    }

    Ok(AckData::Empty {})
}

/// Remove a connection's viewer footprint on one ticket: tracker entry,
/// departure broadcast to the remaining members, room membership
async fn leave_ticket(app: &AppState, conn: &Arc<Connection>, ticket_id: Uuid) {
    if let Some(left) = app.gateway.viewers.leave(ticket_id, conn.id).await {
        if left.remaining > 0 {
            app.gateway
                .rooms
                .broadcast(
                    RoomId::Ticket(ticket_id),
                    ServerEvent::TicketViewerLeft {
                        ticket_id,
                        user_id: left.user_id,
                    },
                    Some(conn.id),
                )
                .await;
        }
    }
    app.gateway.rooms.leave(RoomId::Ticket(ticket_id), conn.id).await;
}

async fn broadcast_typing(
    app: &AppState,
    conn: &Arc<Connection>,
    conversation_id: Uuid,
    typing: bool,
) {
    let user = TypingUser {
        user_id: conn.identity.id,
        name: conn.identity.name.clone(),
        role: conn.identity.role,
    };
    app.gateway
        .rooms
        .broadcast(
            RoomId::Conversation(conversation_id),
            ServerEvent::TypingUpdate {
                conversation_id,
                user,
                typing,
            },
            Some(conn.id),
        )
        .await;
}

async fn presence_update(
    app: &AppState,
    conn: &Arc<Connection>,
    agent_id: Uuid,
    status_raw: &str,
) -> CommandResult {
    let Some(status) = PresenceStatus::parse(status_raw) else {
        return Err(AckError::invalid_status(format!(
            "unknown presence status: {status_raw}"
        )));
    };

    app.agents
        .agent(agent_id)
        .await?
        .ok_or_else(|| AckError::not_found("agent not found"))?;

    let now = OffsetDateTime::now_utc();
    let last_seen_at = app.gateway.presence.set(agent_id, conn.id, status, now).await;

    // Mirror to storage off the ack path; the in-memory registry is the
    // live source of truth either way
    let agents = Arc::clone(&app.agents);
    tokio::spawn(async move {
        if let Err(e) = agents.update_presence(agent_id, status, last_seen_at).await {
            tracing::warn!(error = %e, agent_id = %agent_id, "Failed to persist presence status");
        }
    });

    app.gateway
        .broadcast_all(
            ServerEvent::AgentPresenceUpdate {
                agent_id,
                presence_status: status,
                last_seen_at,
                updated_at: now,
            },
            None,
        )
        .await;

    *conn.presence_agent.write().await = Some(agent_id);

    tracing::info!(agent_id = %agent_id, status = status.as_str(), "Agent presence updated");

    Ok(AckData::PresenceSet {
        presence_status: status,
        last_seen_at,
    })
}

async fn presence_get(app: &AppState, agent_ids: &[Uuid]) -> CommandResult {
    let records = app.agents.agents(agent_ids).await?;

    let mut presence = Vec::with_capacity(records.len());
    for agent in records {
        let live = app.gateway.presence.snapshot(agent.id).await;
        let is_online = live
            .as_ref()
            .map(|e| !e.connections.is_empty())
            .unwrap_or(false);
        // In-memory state wins over the persisted record while present
        let (presence_status, last_seen_at) = match live {
            Some(entry) => (entry.status, entry.last_seen_at.or(agent.last_seen_at)),
            None => (agent.presence_status, agent.last_seen_at),
        };

        presence.push(PresenceSnapshot {
            agent_id: agent.id,
            agent_slug: agent.slug,
            name: agent.name,
            presence_status,
            last_seen_at,
            is_online,
        });
    }

    Ok(AckData::PresenceList { presence })
}

// =============================================================================
// Disconnect Cleanup
// =============================================================================

/// Unwind everything the connection registered, exactly once.
///
/// Each step is keyed off a field stored on the connection, is a no-op
/// when that field was never set, and is isolated so one failure cannot
/// skip the others.
pub async fn cleanup_connection(app: &AppState, conn: &Arc<Connection>) {
    cleanup_presence(app, conn).await;
    cleanup_viewer(app, conn).await;
    cleanup_activity(app, conn).await;
    app.gateway.rooms.remove_connection(conn.id).await;
    app.gateway.remove_connection(conn.id).await;
}

async fn cleanup_presence(app: &AppState, conn: &Arc<Connection>) {
    let Some(agent_id) = conn.presence_agent.write().await.take() else {
        return;
    };

    let Some(entry) = app.gateway.presence.drop_connection(agent_id, conn.id).await else {
        return; // other connections still report for this agent
    };

    if let Err(e) = app
        .agents
        .update_presence(agent_id, PresenceStatus::Offline, None)
        .await
    {
        tracing::warn!(error = %e, agent_id = %agent_id, "Failed to persist offline status");
    }

    app.gateway
        .broadcast_all(
            ServerEvent::AgentPresenceUpdate {
                agent_id,
                presence_status: PresenceStatus::Offline,
                last_seen_at: entry.last_seen_at,
                updated_at: OffsetDateTime::now_utc(),
            },
            Some(conn.id),
        )
        .await;

    tracing::info!(agent_id = %agent_id, "Agent went offline");
}

async fn cleanup_viewer(app: &AppState, conn: &Arc<Connection>) {
    let Some(ticket_id) = conn.viewing_ticket.write().await.take() else {
        return;
    };
    leave_ticket(app, conn, ticket_id).await;
}

async fn cleanup_activity(app: &AppState, conn: &Arc<Connection>) {
    let Some((conversation_id, _)) = conn.active_conversation.write().await.take() else {
        return;
    };
    app.gateway.activity.remove(conversation_id, conn.id).await;
}
