pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::ReminderError;
pub use handlers::ReminderState;
pub use models::*;
pub use router::create_reminder_router;
pub use services::dispatcher::{ReminderDispatcher, RunSummary};
pub use services::ledger::{FileLedger, MemoryLedger, ReminderLedger};
pub use services::schedule::run_schedule;
