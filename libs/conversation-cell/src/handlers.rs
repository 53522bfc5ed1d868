use std::sync::Arc;

use axum::{extract::State, response::Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use messaging_cell::MessagingGateway;
use shared_models::error::AppError;

use crate::services::engine::ConversationEngine;

pub struct ConversationState {
    pub engine: ConversationEngine,
    pub gateway: Arc<dyn MessagingGateway>,
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    pub phone: String,
    pub text: String,
}

/// Inbound chat webhook: one patient message in, one reply out.
pub async fn receive_message(
    State(state): State<Arc<ConversationState>>,
    Json(inbound): Json<InboundMessage>,
) -> Result<Json<Value>, AppError> {
    if inbound.phone.trim().is_empty() {
        return Err(AppError::BadRequest("Missing sender phone".to_string()));
    }
    if inbound.text.trim().is_empty() {
        return Err(AppError::BadRequest("Empty message".to_string()));
    }

    info!("Inbound message from {}", inbound.phone);

    let reply = state
        .engine
        .handle_message(&inbound.phone, inbound.text.trim())
        .await;

    if let Err(e) = state.gateway.send_text(&inbound.phone, &reply).await {
        // The reply is still returned to the webhook caller; delivery is
        // retried by the channel, not by us.
        error!("Failed to send reply to {}: {}", inbound.phone, e);
    }

    Ok(Json(json!({ "reply": reply })))
}
