//! agent-chat - chat with configurable AI agents
//!
//! An agent is a name plus a system prompt. Each conversation with an agent is
//! owned by a [`core::SessionStore`], which appends the user's message
//! immediately, asks a [`providers::CompletionTransport`] for the reply, and
//! rolls the message back if the request fails.
//!
//! The same crate serves the stateless completion endpoint (`routes`) that a
//! [`providers::RemoteProvider`] talks to, and a terminal front end (`repl`).

use std::sync::Arc;

pub mod agent;
pub mod config;
pub mod conversation;
pub mod core;
pub mod providers;
pub mod repl;
pub mod routes;

use providers::CompletionTransport;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn CompletionTransport>,
}

impl AppState {
    pub fn new(provider: Arc<dyn CompletionTransport>) -> Self {
        Self { provider }
    }
}
