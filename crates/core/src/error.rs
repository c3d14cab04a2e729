/// Result alias that carries the custom [`MediaBindError`] type.
pub type Result<T> = std::result::Result<T, MediaBindError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum MediaBindError {
    /// Requested colour depth has no derived pixel layout. Callers may retry
    /// with one of 15, 16, 24 or 32.
    #[error("unsupported colour depth {0} (expected 15, 16, 24 or 32)")]
    UnsupportedDepth(u32),
    /// Channel masks handed in by the video layer cannot describe a pixel.
    #[error("invalid channel masks: {0}")]
    InvalidMasks(String),
    /// No conversion exists between the requested sample streams.
    #[error("no audio conversion available: {reason}")]
    ConversionUnavailable { reason: String },
    #[error("buffer too short: needed {needed} bytes, got {available}")]
    BufferTooShort { needed: usize, available: usize },
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    /// Native event tag outside the decoded set. Only ever formatted into the
    /// log line emitted right before the process aborts.
    #[error("unknown native event kind {0}")]
    UnknownEventKind(u32),
    #[error("{0} has been poisoned")]
    Poisoned(&'static str),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl MediaBindError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn conversion<T: Into<String>>(reason: T) -> Self {
        Self::ConversionUnavailable {
            reason: reason.into(),
        }
    }
}

impl From<&str> for MediaBindError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MediaBindError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
