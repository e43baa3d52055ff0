//! E2E integration tests for poolwatch-daemon.
//!
//! These tests run the real orchestrator against a temporary access log and
//! a local HTTP server standing in for the Slack webhook.
//!
//! # Test Structure
//!
//! - `helpers/` -- Shared test utilities (config builder, webhook capture, log writer)
//! - `scenarios/` -- Test files organized by scenario
//!
//! # Running
//!
//! ```bash
//! cargo test -p poolwatch-daemon --test e2e
//! ```

mod helpers;
mod scenarios;
