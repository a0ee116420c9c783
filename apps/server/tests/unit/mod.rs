//! Unit tests module
//!
//! Contains tests for individual components in isolation. Everything here
//! runs against the in-memory store or a stubbed backend.

#[path = "../common/mod.rs"]
mod common;

mod config_test;
mod lifecycle_test;
