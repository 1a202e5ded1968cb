pub mod client;
pub mod config;
pub mod core;
pub mod errors;

// Re-export commonly used items for convenience
pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, ConfigError};
pub use crate::core::*;
pub use errors::{ApiError, ClientError, ClientResult, ValidationError};
