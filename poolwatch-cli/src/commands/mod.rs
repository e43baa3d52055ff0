//! Command handlers -- one module per subcommand

pub mod breaches;
pub mod config;
pub mod maintenance;
