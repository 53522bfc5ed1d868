pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::ConversationError;
pub use models::*;
pub use router::create_conversation_router;
pub use services::engine::ConversationEngine;
pub use services::responder::{OpenAiResponder, Responder};
pub use services::store::ConversationStore;
