//! Utility module - logging and time helpers

pub mod logger;
pub mod time;

pub use time::now_millis;
