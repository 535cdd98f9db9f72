//! Byte-exact codecs for the two-layer RHP/RHMP protocol.
//!
//! Two protocols share one datagram:
//! - RHP, the lower layer: a byte-aligned 5-byte header, a payload, an
//!   optional pad byte that keeps the frame even, and a 16-bit one's-complement
//!   checksum.
//! - RHMP, the higher layer: a 4-byte bit-packed header (type plus two 14-bit
//!   ports) and a typed payload, carried inside an RHP frame of type
//!   [`FrameType::Embedded`].
//!
//! Several payloads are written byte-reversed but read back verbatim. The
//! codecs reproduce that wire behaviour exactly; see [`codec`] and [`message`].

pub mod checksum;
pub mod codec;
pub mod error;
pub mod message;
pub mod ports;

pub use checksum::{compute_checksum, verify_checksum, word_sum};
pub use codec::{
    decode_frame, encode_frame, encode_message_frame, FramePayload, FrameType, RhpFrame,
    CHECKSUM_SIZE, HEADER_SIZE, MAX_PAYLOAD, RHP_VERSION,
};
pub use error::{FrameError, Result};
pub use message::{
    decode_message, encode_message, InnerMessage, MessageBody, MessageType, MESSAGE_HEADER_SIZE,
};
pub use ports::{fits_port, mask_port, MAX_PORT, PORT_MASK};
