//! Shared helpers for daemon E2E tests.

pub mod access_log;
pub mod config;
pub mod daemon;
pub mod webhook;
