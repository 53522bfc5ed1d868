pub mod models;
pub mod services;

pub use models::*;
pub use services::ranking::rank_by_proximity;
pub use services::resolver::AvailabilityResolver;
