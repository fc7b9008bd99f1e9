//! # Portfolio Library
//!
//! HTTP API, CLI commands and port probing for the portfolio service.
//!
//! The binary wires these modules together in `main.rs`; integration tests
//! drive them directly.

pub mod api;
pub mod cli;
pub mod config;
pub mod probe;
pub mod shutdown;

// Re-export portfolio_core for convenience
pub use portfolio_core;
