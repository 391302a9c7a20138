//! Service-specific tests
//!
//! One file per service; lookup tests run against a local wiremock server,
//! checker tests against the generated mock client.

#[cfg(test)]
mod existence_checker;

// Common test utilities for services
#[cfg(test)]
pub mod common {
    use shared::{Identifier, NormalizedTarget};

    pub const INSTANCE: &str = "https://lookup.example";

    pub fn target(value: &str) -> NormalizedTarget {
        NormalizedTarget::new(value)
    }

    pub fn identifier(value: &str) -> Identifier {
        Identifier::new(value).expect("valid test identifier")
    }
}
