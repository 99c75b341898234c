//! Utils module - Shared utilities and helpers
//!
//! Helpers used across the engine, core and display layers.

/// Number, hex and page-offset formatting
pub mod data;

/// stderr backend for the `log` facade
pub mod logging;

/// Unicode-aware truncation and escaping
pub mod text;

/// Database path and filter validation
pub mod validation;
