use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConversationError {
    #[error("Responder unavailable: {0}")]
    Responder(String),

    #[error("Availability lookup failed: {0}")]
    Availability(String),

    #[error("Invalid inbound message: {0}")]
    InvalidMessage(String),

    #[error("Internal conversation error: {0}")]
    Internal(String),
}
