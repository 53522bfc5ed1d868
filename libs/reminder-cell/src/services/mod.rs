pub mod dispatcher;
pub mod ledger;
pub mod schedule;
