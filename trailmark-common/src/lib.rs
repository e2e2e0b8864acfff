//! # Trailmark Common Library
//!
//! Shared code for the Trailmark recognition engine:
//! - Error types
//! - Configuration loading and root folder resolution
//! - Database initialization and schema
//! - Timestamp utilities

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
