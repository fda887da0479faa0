//! Message relay
//!
//! Validates, persists, broadcasts and drives side effects for chat
//! messages. The persist step is the only await gating the sender's ack;
//! a failed write never appears delivered. Side effects run on a detached
//! task after the ack and touch only shared trackers and external
//! services, never connection-owned state.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use deskhub_shared::{Conversation, NewMessage, SenderType, StoredMessage};

use crate::error::AckError;
use crate::identity::Identity;
use crate::notify::Notice;
use crate::state::AppState;

use super::connection::Connection;
use super::events::{AckData, CommandResult, ServerEvent};
use super::room::RoomId;

/// Parsed message:send payload
#[derive(Debug)]
pub struct SendMessage {
    pub conversation_id: Uuid,
    pub client_message_id: Option<String>,
    pub content: String,
    pub message_type: String,
    pub metadata: Option<Value>,
}

/// Relay a chat message: validate, persist, broadcast, ack, then fire
/// side effects
pub async fn send_message(
    app: &AppState,
    conn: &Arc<Connection>,
    payload: SendMessage,
) -> CommandResult {
    let content = payload.content.trim();
    if content.is_empty() {
        return Err(AckError::invalid_payload("message content is required"));
    }

    let conversation = app
        .conversations
        .conversation(payload.conversation_id)
        .await?
        .ok_or_else(|| AckError::not_found("conversation not found"))?;

    // Storage failure short-circuits here: no broadcast, no side effects
    let message = app
        .conversations
        .create_message(NewMessage {
            conversation_id: conversation.id,
            sender_id: conn.identity.id,
            sender_type: conn.identity.role.sender_type(),
            content: content.to_string(),
            message_type: payload.message_type,
            metadata: payload.metadata,
        })
        .await?;

    app.gateway
        .rooms
        .broadcast(
            RoomId::Conversation(conversation.id),
            ServerEvent::MessageNew {
                conversation_id: conversation.id,
                message: message.clone(),
            },
            None,
        )
        .await;

    spawn_side_effects(app.clone(), conversation, message.clone(), conn.identity.clone());

    Ok(AckData::MessageSent {
        client_message_id: payload.client_message_id,
        message,
    })
}

/// Detached, error-isolated side-effect task. The sender's ack has
/// already been decided; nothing here can affect it.
fn spawn_side_effects(
    app: AppState,
    conversation: Conversation,
    message: StoredMessage,
    sender: Identity,
) {
    tokio::spawn(async move {
        match message.sender_type {
            SenderType::Agent => agent_reply_effects(&app, &conversation, &message, &sender).await,
            SenderType::Customer => {
                customer_reply_effects(&app, &conversation, &message, &sender).await
            }
        }
    });
}

async fn agent_reply_effects(
    app: &AppState,
    conversation: &Conversation,
    message: &StoredMessage,
    sender: &Identity,
) {
    // Captured before the TAT update mutates the stored fields
    let first_response = conversation.awaiting_first_response();

    if let Err(e) = app.tat.record_agent_reply(conversation.id).await {
        tracing::warn!(
            error = %e,
            conversation_id = %conversation.id,
            "TAT metrics update failed"
        );
    }

    if first_response {
        if let Some(email) = &conversation.customer_email {
            let notice = build_notice(app, conversation, message, sender, email);
            if let Err(e) = app.notifier.first_response(&notice).await {
                tracing::warn!(
                    error = %e,
                    conversation_id = %conversation.id,
                    "first-response notification failed"
                );
            }
        }
    }

    // Independent of first-response status
    if !app.gateway.activity.is_customer_active(conversation.id).await {
        if let Some(email) = &conversation.customer_email {
            let notice = build_notice(app, conversation, message, sender, email);
            if let Err(e) = app.notifier.agent_replied_customer_absent(&notice).await {
                tracing::warn!(
                    error = %e,
                    conversation_id = %conversation.id,
                    "customer-absent notification failed"
                );
            }
        }
    }
}

async fn customer_reply_effects(
    app: &AppState,
    conversation: &Conversation,
    message: &StoredMessage,
    sender: &Identity,
) {
    if app.gateway.activity.is_agent_active(conversation.id).await {
        return;
    }
    let Some(agent_id) = conversation.assigned_agent_id else {
        return;
    };

    let agent = match app.agents.agent(agent_id).await {
        Ok(Some(agent)) => agent,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(
                error = %e,
                agent_id = %agent_id,
                "failed to load assigned agent for notification"
            );
            return;
        }
    };
    let Some(email) = agent.email else {
        return;
    };

    let notice = build_notice(app, conversation, message, sender, &email);
    if let Err(e) = app.notifier.customer_replied_agent_absent(&notice).await {
        tracing::warn!(
            error = %e,
            conversation_id = %conversation.id,
            "agent-absent notification failed"
        );
    }
}

fn build_notice(
    app: &AppState,
    conversation: &Conversation,
    message: &StoredMessage,
    sender: &Identity,
    recipient: &str,
) -> Notice {
    Notice {
        ticket_number: conversation.ticket_number.clone(),
        subject: conversation.subject.clone(),
        recipient: recipient.to_string(),
        sender_name: sender.name.clone(),
        content: message.content.clone(),
        link: format!(
            "{}/tickets/{}",
            app.config.public_url, conversation.ticket_id
        ),
    }
}
