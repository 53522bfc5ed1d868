use std::sync::Arc;

use axum::{extract::State, response::Json};
use serde_json::{json, Value};
use tracing::info;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::error::ReminderError;
use crate::services::dispatcher::ReminderDispatcher;

pub struct ReminderState {
    pub dispatcher: Arc<ReminderDispatcher>,
    pub config: AppConfig,
}

/// Manual trigger for one dispatch pass. Safe to call repeatedly; the ledger
/// keeps already-handled appointments out of the batch.
pub async fn run_reminders(
    State(state): State<Arc<ReminderState>>,
) -> Result<Json<Value>, AppError> {
    let template_key = state.config.reminder_template_key();
    info!("Manual reminder run requested (template {})", template_key);

    let summary = state
        .dispatcher
        .run_once(
            &template_key,
            state.config.reminder_days_before,
            state.config.reminder_batch_limit,
        )
        .await
        .map_err(|e| match e {
            ReminderError::NotConfigured(msg) => AppError::Configuration(msg),
            ReminderError::Calendar(msg) => AppError::ExternalService(msg),
            ReminderError::Ledger(msg) => AppError::Internal(msg),
        })?;

    Ok(Json(json!({
        "template_key": template_key,
        "summary": summary,
    })))
}
