use std::sync::Arc;

use axum::{routing::post, Router};

use crate::handlers::{receive_message, ConversationState};

pub fn create_conversation_router(state: Arc<ConversationState>) -> Router {
    Router::new()
        .route("/message", post(receive_message))
        .with_state(state)
}
