//! poolwatch CLI library.
//!
//! Command handlers are exposed for integration testing; the `poolwatch`
//! binary (main.rs) only parses arguments and maps errors to exit codes.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
