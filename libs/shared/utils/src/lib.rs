pub mod datetime;
pub mod test_utils;
