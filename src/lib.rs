//! Scan execution engine: validates targets, drives external security tools
//! under a supervisor and normalizes what they print into typed results.

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod executors;
pub mod output;
pub mod plugins;
pub mod ui;
pub mod utils;
