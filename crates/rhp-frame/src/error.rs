/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The buffer is shorter than the header or the declared length requires.
    #[error("malformed {context}: need {needed} bytes, have {available}")]
    Malformed {
        context: &'static str,
        needed: usize,
        available: usize,
    },

    /// The payload does not fit in the 8-bit length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The RHP type byte is neither Control nor Embedded.
    #[error("unknown frame type {0}")]
    UnknownFrameType(u8),

    /// The RHMP type nibble is not one of the four message types.
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),

    /// The payload does not have the shape its type requires.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;
