//! VOLSCAN: crypto volume-anomaly scanner
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod bot;
pub mod config;
pub mod engine;
pub mod market;
pub mod messaging;
pub mod subscribers;
pub mod types;
