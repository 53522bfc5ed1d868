pub mod services;

pub use services::gateway::{MessagingGateway, SendReceipt, WhatsAppClient};
