//! Shared types for the bridge account checker
//!
//! Contains the value types every component agrees on (identifiers, lookup
//! directions, rotation strategies) plus the common error type and tracing
//! setup.

pub mod types;
pub mod errors;
pub mod logging;

pub use types::*;
pub use errors::*;
