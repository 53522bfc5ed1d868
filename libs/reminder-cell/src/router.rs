use std::sync::Arc;

use axum::{routing::post, Router};

use crate::handlers::{run_reminders, ReminderState};

pub fn create_reminder_router(state: Arc<ReminderState>) -> Router {
    Router::new()
        .route("/run", post(run_reminders))
        .with_state(state)
}
