//! Error types for slidewin.

use thiserror::Error;

/// Main error type for slidewin operations.
///
/// Admission queries themselves never fail; errors only come from building
/// a limiter or a simulation out of configuration.
#[derive(Error, Debug)]
pub enum SlidewinError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for slidewin operations.
pub type Result<T> = std::result::Result<T, SlidewinError>;
