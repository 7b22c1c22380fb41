//! Shared helpers

pub mod rate_limit;
pub mod time;
pub mod timezone;
