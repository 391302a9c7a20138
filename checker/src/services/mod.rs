//! Checker services implementations

pub mod existence_checker;
pub mod file_manager;
pub mod lookup_client;

#[cfg(test)]
pub mod tests;

pub use existence_checker::*;
pub use file_manager::*;
pub use lookup_client::*;
