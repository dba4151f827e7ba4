//! Error handling for cxdb

use thiserror::Error;

/// Main error type for counterexample database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Unknown compression strategy: {0}")]
    UnknownCompression(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid database file: {0}")]
    Format(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DatabaseError {
    /// Whether the error came from the on-disk format rather than the OS
    pub fn is_format_error(&self) -> bool {
        matches!(self, DatabaseError::Format(_))
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Macro for creating format errors
#[macro_export]
macro_rules! format_err {
    ($msg:expr) => {
        $crate::common::error::DatabaseError::Format($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::common::error::DatabaseError::Format(format!($fmt, $($arg)*))
    };
}
