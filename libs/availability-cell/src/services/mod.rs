pub mod ranking;
pub mod resolver;
