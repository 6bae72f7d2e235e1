//! # Calma Common Library
//!
//! Shared code for the Calma services including:
//! - Error taxonomy and result alias
//! - TOML configuration loading
//! - Parametrized retry with exponential backoff

pub mod config;
pub mod error;
pub mod retry;

pub use error::{Error, Result};
pub use retry::{with_backoff, RetryPolicy};
