//! # STTP Common Library
//!
//! Shared code for the speech-to-text pipeline services:
//! - Error type shared by persistence and configuration layers
//! - Bootstrap TOML configuration and config file resolution
//! - SQLite pool initialization and lock-retry helper

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
