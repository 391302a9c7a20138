//! Checker core business logic, free of I/O

pub mod aggregate;
pub mod classify;
pub mod exclusion;
pub mod normalize;
pub mod retry;
pub mod rotator;

pub use aggregate::aggregate;
pub use classify::{classify, classify_at, parse_retry_directive};
pub use exclusion::ExclusionFilter;
pub use normalize::Normalizer;
pub use retry::{RetryPolicy, Step};
pub use rotator::InstanceRotator;
