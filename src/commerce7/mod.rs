//! Commerce7 API integration

pub mod client;
pub mod types;

pub use client::{Commerce7Client, Commerce7Error, FIRST_CURSOR};
