//! Shared application state

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::notify::{EmailNotifier, NotificationDispatcher};
use crate::store::{AgentStore, ConversationStore, PgStore};
use crate::tat::{PgTatMetrics, TatMetrics};
use crate::websocket::GatewayState;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: PgPool,
    pub gateway: GatewayState,

    // External collaborators, injected behind traits
    pub conversations: Arc<dyn ConversationStore>,
    pub agents: Arc<dyn AgentStore>,
    pub tat: Arc<dyn TatMetrics>,
    pub notifier: Arc<dyn NotificationDispatcher>,
}

impl AppState {
    /// Build state with the production collaborators
    pub fn new(config: Config, pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool.clone()));
        let tat = Arc::new(PgTatMetrics::new(pool.clone()));
        let notifier = Arc::new(EmailNotifier::from_config(&config));

        let conversations: Arc<dyn ConversationStore> = store.clone();
        let agents: Arc<dyn AgentStore> = store;
        Self::with_services(config, pool, conversations, agents, tat, notifier)
    }

    /// Build state with explicit collaborators (tests inject doubles here)
    pub fn with_services(
        config: Config,
        pool: PgPool,
        conversations: Arc<dyn ConversationStore>,
        agents: Arc<dyn AgentStore>,
        tat: Arc<dyn TatMetrics>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pool,
            gateway: GatewayState::new(),
            conversations,
            agents,
            tat,
            notifier,
        }
    }
}
