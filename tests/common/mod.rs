//! Common test utilities for asset-scraper integration tests

#[allow(dead_code)]
pub mod config;
#[allow(dead_code)]
pub mod platform;

pub use config::*;
pub use platform::*;
