use std::path::PathBuf;

/// Errors that end an exchange or prevent one from starting.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// Transport-level error other than a receive timeout.
    #[error("transport error: {0}")]
    Transport(#[from] rhp_transport::TransportError),

    /// A reply passed its checksum but could not be decoded, or a request
    /// could not be encoded.
    #[error("frame error: {0}")]
    Frame(#[from] rhp_frame::FrameError),

    /// The exchange was cancelled before a valid reply arrived.
    #[error("exchange cancelled")]
    Cancelled,

    /// An RHMP port does not fit in 14 bits.
    #[error("port {0} does not fit in 14 bits (max 16383)")]
    PortOutOfRange(u16),

    /// Configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExchangeError>;
