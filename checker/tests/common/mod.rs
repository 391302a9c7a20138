//! Common test utilities and infrastructure
//!
//! Shared by the pipeline property tests and the end-to-end tests.

#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::{ScriptedClient, TestFixtures};
