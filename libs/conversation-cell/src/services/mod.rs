pub mod booking;
pub mod engine;
pub mod extractors;
pub mod intent;
pub mod responder;
pub mod store;
