pub use error::AppError;

/// Main architecture layers (dependency flow: CLI → Core → Engine)
pub mod cli; // Command-line interface
pub mod core; // Browsing logic
pub mod engine; // SQLite connection and values
pub mod storage; // Configuration

/// Support modules (used across layers)
pub mod display; // Output formatting
pub mod error; // Error handling
pub mod utils; // Shared utilities and helpers

#[cfg(test)]
pub(crate) mod test_support;

pub type Result<T> = std::result::Result<T, AppError>;
