//! Shared primitives of the storage engine: errors, configuration, the row
//! store connection, the journals and their sync policy.

pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod journal;
pub mod lease;
pub mod replay;
pub mod schemas;
pub mod sync;
pub mod time;
