//! # Roster Common Library
//!
//! Shared code for the roster tools including:
//! - Error type and result alias
//! - Configuration loading and database path resolution
//! - SQLite database initialization
//! - Timestamp helpers

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
