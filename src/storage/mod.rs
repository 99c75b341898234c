//! Storage layer for sqv
//!
//! Handles the TOML configuration file. The browsed database itself is never
//! written to.

use crate::error::StorageError;

pub mod config;

type Result<T> = std::result::Result<T, StorageError>;
