//! Promoslot Server Library
//!
//! Rotation and lifecycle engine for paid listing promotions. The modules
//! are exposed for the binary and for testing.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
