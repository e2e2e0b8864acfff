//! Database operations for the recognition engine
//!
//! This module is the storage boundary: services depend on these functions
//! and never on SQL or row shapes. Write paths accept any SQLite executor so
//! they compose into per-resolution transactions.

pub mod activities;
pub mod fingerprints;
pub mod journey;
pub mod sessions;
pub mod users;
