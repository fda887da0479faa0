//! Deskhub Gateway Library
//!
//! This crate contains the real-time collaboration gateway for Deskhub.

pub mod config;
pub mod error;
pub mod identity;
pub mod notify;
pub mod routes;
pub mod state;
pub mod store;
pub mod tat;
pub mod websocket;

pub use config::Config;
pub use error::{AckError, ErrorCode};
pub use state::AppState;
