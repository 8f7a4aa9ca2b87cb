//! Field validators shared by request models and services

pub mod age;
pub mod date;
pub mod isbn;

pub use age::{age_on, meets_minimum_age};
pub use date::is_not_in_future;
pub use isbn::{is_valid_isbn, normalize_isbn, validate_isbn};
