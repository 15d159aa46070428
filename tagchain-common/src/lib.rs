//! # tagchain common library
//!
//! Shared code for the tagchain workspace:
//! - Error and result types
//! - Bootstrap configuration loading (TOML file discovery)
//! - User-agent string for upstream web services
//! - Logging initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
