//! CLI command modules.

pub mod config;
pub mod http;
pub mod monitor;
pub mod sink;
