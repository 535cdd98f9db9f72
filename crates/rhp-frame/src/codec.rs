use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::checksum::compute_checksum;
use crate::error::{FrameError, Result};
use crate::message::{decode_message, render_text, until_nul, InnerMessage};

/// Protocol version written into every frame.
pub const RHP_VERSION: u8 = 5;

/// Frame header: version (1) + type (1) + port ID (2) + length (1) = 5 bytes.
pub const HEADER_SIZE: usize = 5;

/// Trailing checksum: 2 bytes, little-endian.
pub const CHECKSUM_SIZE: usize = 2;

/// Largest payload the 8-bit length field can describe.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// RHP frame type, header byte 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Free-text control message.
    Control = 2,
    /// Payload is an RHMP message.
    Embedded = 8,
}

impl FrameType {
    /// Wire value of this type.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            FrameType::Control => "CONTROL",
            FrameType::Embedded => "RHMP",
        }
    }
}

impl TryFrom<u8> for FrameType {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            2 => Ok(FrameType::Control),
            8 => Ok(FrameType::Embedded),
            other => Err(FrameError::UnknownFrameType(other)),
        }
    }
}

/// Decoded frame payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    /// Control text exactly as it appears on the wire.
    Control(Bytes),
    /// Embedded RHMP message.
    Embedded(InnerMessage),
}

/// A decoded RHP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RhpFrame {
    /// Version byte as received.
    pub version: u8,
    /// Sender/channel identifier.
    pub port_id: u16,
    /// Payload length field; never counts the pad byte.
    pub length: u8,
    /// The `length` payload bytes, copied verbatim.
    pub raw_payload: Bytes,
    /// Payload interpreted according to the frame type.
    pub payload: FramePayload,
    /// Checksum field as received.
    pub checksum: u16,
    wire_len: usize,
}

impl RhpFrame {
    /// The frame type implied by the payload.
    pub fn frame_type(&self) -> FrameType {
        match self.payload {
            FramePayload::Control(_) => FrameType::Control,
            FramePayload::Embedded(_) => FrameType::Embedded,
        }
    }

    /// Number of bytes the frame occupied on the wire.
    pub fn wire_len(&self) -> usize {
        self.wire_len
    }

    /// Frame size implied by the header alone: header, `length` payload bytes
    /// and checksum. One less than [`wire_len`](Self::wire_len) when the frame
    /// was padded; older peers report this figure.
    pub fn declared_len(&self) -> usize {
        HEADER_SIZE + usize::from(self.length) + CHECKSUM_SIZE
    }

    /// Whether a pad byte sits between payload and checksum.
    pub fn is_padded(&self) -> bool {
        (HEADER_SIZE + usize::from(self.length)) % 2 != 0
    }

    /// Control text with surrounding NULs trimmed.
    pub fn control_text(&self) -> Option<String> {
        match &self.payload {
            FramePayload::Control(text) => Some(render_text(text)),
            FramePayload::Embedded(_) => None,
        }
    }

    /// The embedded RHMP message, if any.
    pub fn message(&self) -> Option<&InnerMessage> {
        match &self.payload {
            FramePayload::Embedded(msg) => Some(msg),
            FramePayload::Control(_) => None,
        }
    }
}

/// Encode an RHP frame from a raw payload.
///
/// The payload is measured up to its first zero byte for either type. Control
/// frames add one for the terminator and store the bytes back to front;
/// Embedded frames store them in order. Returns the number of bytes written,
/// pad byte included.
///
/// Wire format:
/// ```text
/// ┌─────────┬──────┬──────────┬────────┬──────────┬───────┬──────────┐
/// │ Version │ Type │ Port ID  │ Length │ Payload  │ Pad   │ Checksum │
/// │ (1B)=5  │ (1B) │ (2B LE)  │ (1B)   │ (Length) │ (0-1) │ (2B LE)  │
/// └─────────┴──────┴──────────┴────────┴──────────┴───────┴──────────┘
/// ```
pub fn encode_frame(
    payload: &[u8],
    frame_type: FrameType,
    port_id: u16,
    dst: &mut BytesMut,
) -> Result<usize> {
    let text = until_nul(payload);
    match frame_type {
        FrameType::Control => {
            let mut body = Vec::with_capacity(text.len() + 1);
            body.push(0);
            body.extend(text.iter().rev());
            write_frame(frame_type, port_id, &body, dst)
        }
        FrameType::Embedded => write_frame(frame_type, port_id, text, dst),
    }
}

/// Encode an Embedded RHP frame carrying `message`.
///
/// The full serialized message is embedded, zero bytes included.
pub fn encode_message_frame(
    message: &InnerMessage,
    port_id: u16,
    dst: &mut BytesMut,
) -> Result<usize> {
    let body = message.to_bytes()?;
    write_frame(FrameType::Embedded, port_id, &body, dst)
}

fn write_frame(
    frame_type: FrameType,
    port_id: u16,
    body: &[u8],
    dst: &mut BytesMut,
) -> Result<usize> {
    if body.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: body.len(),
            max: MAX_PAYLOAD,
        });
    }

    let start = dst.len();
    dst.reserve(HEADER_SIZE + body.len() + 1 + CHECKSUM_SIZE);
    dst.put_u8(RHP_VERSION);
    dst.put_u8(frame_type.as_u8());
    dst.put_u16_le(port_id);
    dst.put_u8(body.len() as u8);
    dst.put_slice(body);

    if (HEADER_SIZE + body.len()) % 2 != 0 {
        dst.put_u8(0);
    }

    let checksum = compute_checksum(&dst[start..]);
    dst.put_u16_le(checksum);

    Ok(dst.len() - start)
}

/// Decode a complete RHP frame from one datagram.
///
/// The checksum is read but not verified; callers check it with
/// [`verify_checksum`](crate::verify_checksum) first. Control payloads are
/// returned as stored, so text encoded by [`encode_frame`] comes back
/// reversed. Embedded payloads are decoded as RHMP messages.
pub fn decode_frame(src: &[u8]) -> Result<RhpFrame> {
    if src.len() < HEADER_SIZE + CHECKSUM_SIZE {
        return Err(FrameError::Malformed {
            context: "rhp header",
            needed: HEADER_SIZE + CHECKSUM_SIZE,
            available: src.len(),
        });
    }

    let version = src[0];
    let frame_type = FrameType::try_from(src[1])?;
    let port_id = u16::from_le_bytes([src[2], src[3]]);
    let length = src[4];

    let end = HEADER_SIZE + usize::from(length);
    if end + CHECKSUM_SIZE > src.len() {
        return Err(FrameError::Malformed {
            context: "rhp payload",
            needed: end + CHECKSUM_SIZE,
            available: src.len(),
        });
    }

    let raw_payload = Bytes::copy_from_slice(&src[HEADER_SIZE..end]);
    let checksum = u16::from_le_bytes([src[src.len() - 2], src[src.len() - 1]]);

    let payload = match frame_type {
        FrameType::Control => FramePayload::Control(raw_payload.clone()),
        FrameType::Embedded => FramePayload::Embedded(decode_message(&raw_payload)?),
    };

    trace!(version, port_id, length, ?frame_type, "decoded rhp frame");

    Ok(RhpFrame {
        version,
        port_id,
        length,
        raw_payload,
        payload,
        checksum,
        wire_len: src.len(),
    })
}
