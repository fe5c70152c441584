//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the shared,
//! clonable resources every handler and WebSocket session needs.

use crate::config::Config;
use std::sync::Arc;
use xylor_core::llm_client::LLMClient;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub llm_client: Arc<dyn LLMClient>,
    pub config: Arc<Config>,
}
