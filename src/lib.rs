#![forbid(unsafe_code)]

//! Supervisor for SMS monitoring program sessions running as detached
//! `screen` script processes.

pub mod api;
pub mod config;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod persistence;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
