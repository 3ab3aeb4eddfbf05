//! Common library for the Motorpool platform
//!
//! This crate provides shared infrastructure used across the Motorpool
//! services, primarily PostgreSQL connectivity and the database error
//! taxonomy. All session state lives in the database, so every service
//! reaches it through this crate.

pub mod database;
pub mod error;
