//! Data models: configuration and output rows.

pub mod config;
pub mod diagram;
