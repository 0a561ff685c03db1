//! Error types for the birthday bot.

/// Top-level error type for the birthday bot.
#[derive(Debug, thiserror::Error)]
pub enum CakedayError {
    /// User-supplied day/month does not form a real calendar date.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// A stored date string parses under neither supported format.
    #[error("malformed stored birthday for {user}: {value:?}")]
    MalformedStoredRecord {
        /// Owning user identifier.
        user: String,
        /// Raw stored date string.
        value: String,
    },

    /// Birthday table load or flush failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The platform refused the request for lack of permissions.
    #[error("platform forbidden: {0}")]
    PlatformForbidden(String),

    /// Any other platform/transport failure.
    #[error("platform error: {0}")]
    Platform(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, CakedayError>;
