use std::sync::Arc;

use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};

use conversation_cell::handlers::ConversationState;
use conversation_cell::create_conversation_router;
use reminder_cell::{create_reminder_router, ReminderState};
use shared_config::AppConfig;

pub fn create_router(
    config: Arc<AppConfig>,
    conversation: Arc<ConversationState>,
    reminders: Arc<ReminderState>,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Scheduling engine API is running!" }))
        .route("/health", get(health).with_state(config))
        .nest("/webhook", create_conversation_router(conversation))
        .nest("/reminders", create_reminder_router(reminders))
}

async fn health(State(config): State<Arc<AppConfig>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "calendar_configured": config.is_calendar_configured(),
        "messaging_configured": config.is_messaging_configured(),
        "responder_configured": config.is_responder_configured(),
    }))
}
