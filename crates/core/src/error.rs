/// Result alias that carries the custom [`BeatDetectError`] type.
pub type Result<T> = std::result::Result<T, BeatDetectError>;

/// Error type for the fallible surfaces of the core crate.
///
/// The per-tick path never returns an error. Only configuration loading and
/// validation can fail.
#[derive(Debug, thiserror::Error)]
pub enum BeatDetectError {
    /// Free-form message for errors raised by a host application, such as
    /// rejected command line arguments.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration file could not be parsed.
    #[error("invalid configuration json: {0}")]
    Json(#[from] serde_json::Error),
    /// Configuration parsed but holds values the engine cannot run with.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BeatDetectError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn invalid_config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<&str> for BeatDetectError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}
