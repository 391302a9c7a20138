//! Bridge account checker library
//!
//! Converts account lists between Mastodon and Bluesky bridge handles and
//! verifies each converted account against a public lookup API, respecting
//! server rate limits and rotating across lookup instances.

pub mod config;
pub mod core;
pub mod error;
pub mod pipeline;
pub mod services;
pub mod state;
pub mod traits;
pub mod types;

// Re-export main types
pub use config::CheckerConfig;
pub use error::{CheckerError, CheckerResult};
pub use pipeline::Pipeline;
pub use traits::*;
pub use types::*;
