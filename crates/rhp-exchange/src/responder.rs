use std::time::Duration;

use bytes::{Bytes, BytesMut};
use rhp_frame::{
    decode_frame, encode_frame, encode_message_frame, verify_checksum, FramePayload, FrameType,
    InnerMessage, MessageBody,
};
use rhp_transport::udp::UdpServer;
use rhp_transport::TransportError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ResponderConfig;
use crate::error::Result;

/// Answers RHP requests the way a classroom server would.
///
/// - Control frame: a Control reply with the configured text.
/// - MessageRequest: a MessageResponse from the requested port back to the
///   requester.
/// - IdRequest: an IdResponse carrying the configured identifier.
///
/// Frames with a bad checksum and RHMP responses get no reply.
#[derive(Debug, Clone)]
pub struct Responder {
    config: ResponderConfig,
    corrupted: u32,
}

impl Responder {
    /// Create a responder.
    pub fn new(config: ResponderConfig) -> Self {
        Self {
            config,
            corrupted: 0,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &ResponderConfig {
        &self.config
    }

    /// Build the reply to one request datagram, if it warrants one.
    pub fn respond(&mut self, datagram: &[u8]) -> Result<Option<Bytes>> {
        if !verify_checksum(datagram) {
            warn!(len = datagram.len(), "dropping request with invalid checksum");
            return Ok(None);
        }

        let request = decode_frame(datagram)?;
        let mut reply = BytesMut::new();

        match &request.payload {
            FramePayload::Control(_) => {
                debug!(port_id = request.port_id, "control request");
                encode_frame(
                    self.config.control_reply.as_bytes(),
                    FrameType::Control,
                    self.config.port_id,
                    &mut reply,
                )?;
            }
            FramePayload::Embedded(message) => {
                let Some(answer) = self.answer(message) else {
                    debug!(msg_type = message.msg_type().name(), "no reply for message");
                    return Ok(None);
                };
                encode_message_frame(&answer, self.config.port_id, &mut reply)?;
            }
        }

        if self.corrupted < self.config.corrupt_replies {
            self.corrupted += 1;
            let last = reply.len() - 1;
            reply[last] ^= 0xFF;
            debug!(corrupted = self.corrupted, "corrupting reply checksum");
        }

        Ok(Some(reply.freeze()))
    }

    fn answer(&self, request: &InnerMessage) -> Option<InnerMessage> {
        let (src, dst) = (request.dst_port, request.src_port);
        match request.body {
            MessageBody::MessageRequest => Some(InnerMessage::message_response(
                src,
                dst,
                Bytes::from(self.config.message.clone()),
            )),
            MessageBody::IdRequest => Some(InnerMessage::id_response(src, dst, self.config.id)),
            MessageBody::IdResponse(_) | MessageBody::MessageResponse(_) => None,
        }
    }
}

/// Serve requests on `server` until `cancel` fires or `limit` replies are sent.
///
/// `poll` bounds how long each receive blocks, and so how quickly
/// cancellation is noticed. Oversized and undecodable datagrams are logged
/// and skipped. Returns the number of replies sent.
pub fn serve(
    server: &UdpServer,
    responder: &mut Responder,
    cancel: &CancellationToken,
    poll: Duration,
    limit: Option<usize>,
) -> Result<usize> {
    let mut replies = 0usize;

    while !cancel.is_cancelled() {
        if limit.is_some_and(|limit| replies >= limit) {
            break;
        }

        let (datagram, peer) = match server.recv_from(poll) {
            Ok(received) => received,
            Err(TransportError::Timeout(_)) => continue,
            Err(err @ TransportError::DatagramTooLarge { .. }) => {
                warn!(error = %err, "dropping oversized datagram");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        match responder.respond(&datagram) {
            Ok(Some(reply)) => {
                server.send_to(&reply, peer)?;
                replies += 1;
                info!(%peer, len = reply.len(), "reply sent");
            }
            Ok(None) => {}
            Err(err) => warn!(%peer, error = %err, "undecodable request"),
        }
    }

    Ok(replies)
}
