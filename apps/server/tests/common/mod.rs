//! Common test utilities and helpers
//!
//! This module provides shared functionality for all tests.
#![allow(dead_code)]

pub mod db;

pub use db::TestDb;
pub use fixtures::{
    activate, create_listing, memory_storage, signed_webhook, test_config, MAINTENANCE_SECRET,
    WEBHOOK_SECRET,
};
