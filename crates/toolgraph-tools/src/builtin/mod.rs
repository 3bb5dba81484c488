pub mod datetime;
pub mod strings;
