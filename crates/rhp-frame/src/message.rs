//! RHMP message codec.
//!
//! Header layout (bit 0 is the least significant bit of each byte):
//!
//! ```text
//! byte 0: [ src 0-3 (bits 4-7) | type (bits 0-3) ]
//! byte 1: [ src 4-11                             ]
//! byte 2: [ dst 0-5 (bits 2-7) | src 12-13 (0-1) ]
//! byte 3: [ dst 6-13                             ]
//! ```
//!
//! Payloads by type:
//! - IdRequest, MessageRequest: none.
//! - IdResponse: 4 identifier bytes, written in reverse of their source order
//!   and read back as a little-endian `u32`. Pack-then-parse therefore yields
//!   the byte-swapped identifier.
//! - MessageResponse: a length byte (text plus terminator), then the text
//!   written reversed and read back verbatim.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::ports::mask_port;

/// Size of the bit-packed RHMP header.
pub const MESSAGE_HEADER_SIZE: usize = 4;

/// Size of the IdResponse identifier.
pub const ID_SIZE: usize = 4;

/// Longest MessageResponse text: the length byte also counts the terminator.
pub const MAX_MESSAGE_TEXT: usize = u8::MAX as usize - 1;

/// RHMP message type, the low nibble of header byte 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    IdRequest = 2,
    MessageRequest = 4,
    IdResponse = 6,
    MessageResponse = 8,
}

impl MessageType {
    /// Wire value of this type.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            MessageType::IdRequest => "ID_REQUEST",
            MessageType::MessageRequest => "MESSAGE_REQUEST",
            MessageType::IdResponse => "ID_RESPONSE",
            MessageType::MessageResponse => "MESSAGE_RESPONSE",
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            2 => Ok(MessageType::IdRequest),
            4 => Ok(MessageType::MessageRequest),
            6 => Ok(MessageType::IdResponse),
            8 => Ok(MessageType::MessageResponse),
            other => Err(FrameError::UnknownMessageType(other)),
        }
    }
}

/// Typed RHMP payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    IdRequest,
    MessageRequest,
    /// Identifier as it appears on the wire, read little-endian.
    IdResponse(u32),
    /// Text bytes exactly as they appear on the wire.
    MessageResponse(Bytes),
}

/// A decoded or to-be-encoded RHMP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerMessage {
    /// Source port (14 bits on the wire).
    pub src_port: u16,
    /// Destination port (14 bits on the wire).
    pub dst_port: u16,
    /// Type-dependent payload.
    pub body: MessageBody,
}

impl InnerMessage {
    /// Create an ID request.
    pub fn id_request(src_port: u16, dst_port: u16) -> Self {
        Self {
            src_port,
            dst_port,
            body: MessageBody::IdRequest,
        }
    }

    /// Create a message request.
    pub fn message_request(src_port: u16, dst_port: u16) -> Self {
        Self {
            src_port,
            dst_port,
            body: MessageBody::MessageRequest,
        }
    }

    /// Create an ID response carrying `id`.
    pub fn id_response(src_port: u16, dst_port: u16, id: u32) -> Self {
        Self {
            src_port,
            dst_port,
            body: MessageBody::IdResponse(id),
        }
    }

    /// Create a message response carrying `text`.
    pub fn message_response(src_port: u16, dst_port: u16, text: impl Into<Bytes>) -> Self {
        Self {
            src_port,
            dst_port,
            body: MessageBody::MessageResponse(text.into()),
        }
    }

    /// The wire type of this message.
    pub fn msg_type(&self) -> MessageType {
        match self.body {
            MessageBody::IdRequest => MessageType::IdRequest,
            MessageBody::MessageRequest => MessageType::MessageRequest,
            MessageBody::IdResponse(_) => MessageType::IdResponse,
            MessageBody::MessageResponse(_) => MessageType::MessageResponse,
        }
    }

    /// Encode this message onto `dst`.
    ///
    /// An IdResponse identifier is taken in little-endian source order, so it
    /// lands on the wire big-endian.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        match &self.body {
            MessageBody::IdResponse(id) => encode_message(
                &id.to_le_bytes(),
                MessageType::IdResponse,
                self.src_port,
                self.dst_port,
                dst,
            ),
            MessageBody::MessageResponse(text) => encode_message(
                text,
                MessageType::MessageResponse,
                self.src_port,
                self.dst_port,
                dst,
            ),
            _ => encode_message(&[], self.msg_type(), self.src_port, self.dst_port, dst),
        }
    }

    /// Encode this message into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(MESSAGE_HEADER_SIZE + 1 + MAX_MESSAGE_TEXT + 1);
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Text of a MessageResponse with surrounding NULs trimmed.
    pub fn text(&self) -> Option<String> {
        match &self.body {
            MessageBody::MessageResponse(text) => Some(render_text(text)),
            _ => None,
        }
    }
}

/// Encode an RHMP message from a raw payload.
///
/// `payload` is interpreted by `msg_type`:
/// - MessageResponse: a zero-terminated string (the terminator may be
///   implicit at the end of the slice).
/// - IdResponse: the first four bytes of the identifier's source
///   representation.
/// - IdRequest, MessageRequest: ignored.
///
/// Ports wider than 14 bits are masked, not rejected.
pub fn encode_message(
    payload: &[u8],
    msg_type: MessageType,
    src_port: u16,
    dst_port: u16,
    dst: &mut BytesMut,
) -> Result<()> {
    let src_port = mask_port(src_port);
    let dst_port = mask_port(dst_port);

    dst.reserve(MESSAGE_HEADER_SIZE);
    dst.put_u8(msg_type.as_u8() & 0x0F | ((src_port & 0x000F) << 4) as u8);
    dst.put_u8(((src_port & 0x0FF0) >> 4) as u8);
    dst.put_u8((((dst_port & 0x003F) << 2) | ((src_port & 0x3000) >> 12)) as u8);
    dst.put_u8(((dst_port & 0x3FC0) >> 6) as u8);

    match msg_type {
        MessageType::IdRequest | MessageType::MessageRequest => {}
        MessageType::MessageResponse => {
            let text = until_nul(payload);
            if text.len() > MAX_MESSAGE_TEXT {
                return Err(FrameError::PayloadTooLarge {
                    size: text.len(),
                    max: MAX_MESSAGE_TEXT,
                });
            }
            dst.reserve(2 + text.len());
            dst.put_u8((text.len() + 1) as u8);
            // Terminator first, then the text back to front.
            dst.put_u8(0);
            dst.extend(text.iter().rev());
        }
        MessageType::IdResponse => {
            let id = payload.get(..ID_SIZE).ok_or_else(|| {
                FrameError::InvalidPayload(format!(
                    "id response needs {ID_SIZE} identifier bytes, got {}",
                    payload.len()
                ))
            })?;
            dst.extend(id.iter().rev());
        }
    }

    Ok(())
}

/// Decode an RHMP message.
///
/// Bytes beyond the message (such as RHP padding) are ignored.
pub fn decode_message(src: &[u8]) -> Result<InnerMessage> {
    require(src, MESSAGE_HEADER_SIZE, "rhmp header")?;

    let msg_type = MessageType::try_from(src[0] & 0x0F)?;
    let src_port =
        u16::from(src[0] >> 4) | (u16::from(src[1]) << 4) | (u16::from(src[2] & 0x03) << 12);
    let dst_port = u16::from(src[2] >> 2) | (u16::from(src[3]) << 6);

    let body = match msg_type {
        MessageType::IdRequest => MessageBody::IdRequest,
        MessageType::MessageRequest => MessageBody::MessageRequest,
        MessageType::IdResponse => {
            require(src, MESSAGE_HEADER_SIZE + ID_SIZE, "rhmp id response")?;
            MessageBody::IdResponse(u32::from_le_bytes([src[4], src[5], src[6], src[7]]))
        }
        MessageType::MessageResponse => {
            require(src, MESSAGE_HEADER_SIZE + 1, "rhmp message length")?;
            let length = usize::from(src[4]);
            let start = MESSAGE_HEADER_SIZE + 1;
            require(src, start + length, "rhmp message text")?;
            MessageBody::MessageResponse(Bytes::copy_from_slice(&src[start..start + length]))
        }
    };

    Ok(InnerMessage {
        src_port,
        dst_port,
        body,
    })
}

/// Render wire text for display, dropping NUL padding at either end.
pub(crate) fn render_text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim_matches('\0').to_string()
}

/// The prefix of `bytes` before its first zero byte.
pub(crate) fn until_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

fn require(src: &[u8], needed: usize, context: &'static str) -> Result<()> {
    if src.len() < needed {
        return Err(FrameError::Malformed {
            context,
            needed,
            available: src.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::ports::MAX_PORT;

    fn encode(msg: &InnerMessage) -> Vec<u8> {
        msg.to_bytes().unwrap().to_vec()
    }

    #[test]
    fn test_id_request_header_bytes() {
        let wire = encode(&InnerMessage::id_request(514, 105));
        assert_eq!(wire, [0x22, 0x20, 0xA4, 0x01]);
    }

    #[test]
    fn test_id_request_with_low_destination_clears_last_byte() {
        // Destination 41 has no bits above bit 5.
        let wire = encode(&InnerMessage::id_request(514, 41));
        assert_eq!(wire, [0x22, 0x20, 0xA4, 0x00]);
    }

    #[test]
    fn test_message_request_header_bytes() {
        let wire = encode(&InnerMessage::message_request(223, 105));
        assert_eq!(wire, [0xF4, 0x0D, 0xA4, 0x01]);
    }

    #[test]
    fn test_header_roundtrip_at_port_bounds() {
        for (src, dst) in [(0, 0), (MAX_PORT, MAX_PORT), (0, MAX_PORT), (MAX_PORT, 0)] {
            let msg = InnerMessage::message_request(src, dst);
            let decoded = decode_message(&encode(&msg)).unwrap();
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn test_all_ones_ports_fill_header() {
        let wire = encode(&InnerMessage::id_request(MAX_PORT, MAX_PORT));
        assert_eq!(wire, [0xF2, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_oversized_ports_are_masked() {
        let msg = InnerMessage::id_request(16384 + 514, 0xFFFF);
        let wire = encode(&msg);
        assert_eq!(wire, encode(&InnerMessage::id_request(514, 0x3FFF)));

        let decoded = decode_message(&wire).unwrap();
        assert_eq!(decoded.src_port, 514);
        assert_eq!(decoded.dst_port, 0x3FFF);
    }

    #[test]
    fn test_message_response_written_reversed_read_verbatim() {
        let msg = InnerMessage::message_response(105, 223, "hey");
        let wire = encode(&msg);
        assert_eq!(&wire[4..], &[4, 0x00, b'y', b'e', b'h']);

        let decoded = decode_message(&wire).unwrap();
        assert_eq!(
            decoded.body,
            MessageBody::MessageResponse(Bytes::from_static(b"\0yeh"))
        );
        assert_eq!(decoded.text().as_deref(), Some("yeh"));
    }

    #[test]
    fn test_message_response_stops_at_first_nul() {
        let mut buf = BytesMut::new();
        encode_message(b"ab\0cd", MessageType::MessageResponse, 1, 2, &mut buf).unwrap();
        assert_eq!(&buf[4..], &[3, 0x00, b'b', b'a']);
    }

    #[test]
    fn test_message_response_too_long() {
        let text = vec![b'x'; MAX_MESSAGE_TEXT + 1];
        let err = InnerMessage::message_response(1, 2, text).to_bytes().unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 255, max: 254 }));
    }

    #[test]
    fn test_id_response_is_byte_swapped_by_roundtrip() {
        let msg = InnerMessage::id_response(105, 514, 0x1122_3344);
        let wire = encode(&msg);
        assert_eq!(&wire[4..], &[0x11, 0x22, 0x33, 0x44]);

        let decoded = decode_message(&wire).unwrap();
        assert_eq!(decoded.body, MessageBody::IdResponse(0x4433_2211));
    }

    #[test]
    fn test_id_response_palindrome_survives_roundtrip() {
        let msg = InnerMessage::id_response(1, 2, 0xAB00_00AB);
        let decoded = decode_message(&encode(&msg)).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_raw_id_response_needs_four_bytes() {
        let mut buf = BytesMut::new();
        let err = encode_message(&[1, 2], MessageType::IdResponse, 1, 2, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::InvalidPayload(_)));
    }

    #[test]
    fn test_decode_short_header() {
        let err = decode_message(&[0x22, 0x20]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Malformed {
                needed: 4,
                available: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_decode_truncated_text() {
        let err = decode_message(&[0x08, 0x00, 0x00, 0x00, 5, b'a']).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Malformed {
                needed: 10,
                available: 6,
                ..
            }
        ));
    }

    #[test]
    fn test_decode_truncated_id() {
        let err = decode_message(&[0x06, 0x00, 0x00, 0x00, 1, 2]).unwrap_err();
        assert!(matches!(err, FrameError::Malformed { needed: 8, .. }));
    }

    #[test]
    fn test_decode_unknown_type() {
        let err = decode_message(&[0x03, 0x00, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, FrameError::UnknownMessageType(3)));
    }

    #[test]
    fn test_message_type_values() {
        assert_eq!(MessageType::IdRequest.as_u8(), 2);
        assert_eq!(MessageType::MessageRequest.as_u8(), 4);
        assert_eq!(MessageType::IdResponse.as_u8(), 6);
        assert_eq!(MessageType::MessageResponse.as_u8(), 8);
        assert_eq!(MessageType::try_from(6).unwrap(), MessageType::IdResponse);
    }

    proptest! {
        #[test]
        fn test_prop_ports_roundtrip_masked(src in any::<u16>(), dst in any::<u16>()) {
            let decoded = decode_message(&encode(&InnerMessage::id_request(src, dst))).unwrap();
            prop_assert_eq!(decoded.src_port, src & 0x3FFF);
            prop_assert_eq!(decoded.dst_port, dst & 0x3FFF);
            prop_assert_eq!(decoded.msg_type(), MessageType::IdRequest);
        }
    }
}
