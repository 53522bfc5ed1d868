use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("Reminder job not configured: {0}")]
    NotConfigured(String),

    #[error("Calendar lookup failed: {0}")]
    Calendar(String),

    #[error("Ledger operation failed: {0}")]
    Ledger(String),
}
