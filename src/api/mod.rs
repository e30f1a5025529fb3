/// API routes and handlers
pub mod auth;
pub mod collaboration;
pub mod events;
pub mod extract;
pub mod health;
pub mod history;
pub mod middleware;

use crate::context::AppContext;
use axum::Router;
use serde::{Deserialize, Serialize};

/// Plain acknowledgement body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(auth::routes())
        .merge(events::routes())
        .merge(collaboration::routes())
        .merge(history::routes())
        .merge(health::routes())
}
