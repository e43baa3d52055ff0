//! E2E test scenarios.
//!
//! - `alert_flow`: access log lines to webhook posts and breach records
//! - `maintenance`: sentinel file and static flag suppression
//! - `shutdown`: graceful shutdown and fatal tailer errors
//! - `delivery`: webhook failures and cooldown
//! - `config_error`: invalid configuration is rejected before start

mod alert_flow;
mod config_error;
mod delivery;
mod maintenance;
mod shutdown;
