use bytes::Bytes;
use rhp_frame::{decode_frame, verify_checksum, RhpFrame};
use rhp_transport::{Datagram, TransportError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ExchangeConfig;
use crate::error::{ExchangeError, Result};

/// Where an exchange currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// Nothing sent yet.
    Idle,
    /// Request sent, waiting for a reply.
    Sent,
    /// A reply arrived and is being checked.
    Validating,
    /// The exchange has finished, successfully or not.
    Done,
}

/// Result of an exchange that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// A reply verified and decoded.
    Success {
        /// The decoded reply.
        frame: RhpFrame,
        /// Receive attempt (1-based) that produced the reply.
        attempts: u32,
    },
    /// Every attempt ended in a bad checksum or a timeout.
    Failed {
        /// Receive attempts made.
        attempts_used: u32,
    },
}

impl ExchangeOutcome {
    /// Returns true if a valid reply was received.
    pub fn is_success(&self) -> bool {
        matches!(self, ExchangeOutcome::Success { .. })
    }

    /// The decoded reply, if any.
    pub fn frame(&self) -> Option<&RhpFrame> {
        match self {
            ExchangeOutcome::Success { frame, .. } => Some(frame),
            ExchangeOutcome::Failed { .. } => None,
        }
    }

    /// Receive attempts made.
    pub fn attempts(&self) -> u32 {
        match self {
            ExchangeOutcome::Success { attempts, .. } => *attempts,
            ExchangeOutcome::Failed { attempts_used } => *attempts_used,
        }
    }
}

/// Why a receive attempt did not produce a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryReason {
    InvalidChecksum,
    Timeout,
}

/// What one receive attempt produced.
#[derive(Debug)]
pub(crate) enum Received {
    Reply(RhpFrame),
    Retry(RetryReason),
}

/// Classify the result of one receive call.
///
/// Timeouts and bad checksums are retryable; any other transport error, and
/// any verified datagram that fails to decode, ends the exchange.
pub(crate) fn inspect(result: rhp_transport::Result<Bytes>) -> Result<Received> {
    let datagram = match result {
        Ok(datagram) => datagram,
        Err(TransportError::Timeout(timeout)) => {
            warn!(?timeout, "no reply before receive timeout");
            return Ok(Received::Retry(RetryReason::Timeout));
        }
        Err(err) => return Err(err.into()),
    };

    if !verify_checksum(&datagram) {
        warn!(len = datagram.len(), "received frame had invalid checksum");
        return Ok(Received::Retry(RetryReason::InvalidChecksum));
    }

    let frame = decode_frame(&datagram)?;
    Ok(Received::Reply(frame))
}

/// Drives one request/response cycle over a datagram transport.
///
/// The request is sent once, then up to `max_attempts` receives follow. After
/// a failed receive the identical request bytes are resent, unless that was
/// the last attempt, so a peer that never answers correctly sees exactly
/// `max_attempts` sends.
pub struct Exchange<'t, T> {
    transport: &'t mut T,
    config: ExchangeConfig,
    cancel: CancellationToken,
    state: ExchangeState,
    sends: u32,
}

impl<'t, T: Datagram> Exchange<'t, T> {
    /// Create an exchange over `transport`.
    pub fn new(transport: &'t mut T, config: ExchangeConfig) -> Self {
        Self {
            transport,
            config,
            cancel: CancellationToken::new(),
            state: ExchangeState::Idle,
            sends: 0,
        }
    }

    /// Stop the exchange before the next attempt once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Current state.
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Number of times the request has been sent.
    pub fn sends(&self) -> u32 {
        self.sends
    }

    /// Send `request` and wait for a reply whose checksum verifies.
    pub fn run(&mut self, request: &[u8]) -> Result<ExchangeOutcome> {
        self.config.validate()?;
        self.state = ExchangeState::Idle;
        self.sends = 0;

        if self.cancel.is_cancelled() {
            return Err(ExchangeError::Cancelled);
        }

        let result = self.drive(request);
        self.state = ExchangeState::Done;
        result
    }

    fn drive(&mut self, request: &[u8]) -> Result<ExchangeOutcome> {
        self.send(request)?;

        let max_attempts = self.config.max_attempts;
        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                info!(attempt, "exchange cancelled");
                return Err(ExchangeError::Cancelled);
            }

            let received = self.transport.receive(self.config.receive_timeout);
            self.state = ExchangeState::Validating;

            match inspect(received)? {
                Received::Reply(frame) => {
                    info!(
                        attempt,
                        port_id = frame.port_id,
                        frame_type = frame.frame_type().name(),
                        "exchange complete"
                    );
                    return Ok(ExchangeOutcome::Success {
                        frame,
                        attempts: attempt,
                    });
                }
                Received::Retry(reason) => {
                    if attempt < max_attempts {
                        debug!(attempt, ?reason, "resending request");
                        self.send(request)?;
                    }
                }
            }
        }

        warn!(attempts = max_attempts, "no valid reply, giving up");
        Ok(ExchangeOutcome::Failed {
            attempts_used: max_attempts,
        })
    }

    fn send(&mut self, request: &[u8]) -> Result<()> {
        self.transport.send(request)?;
        self.sends += 1;
        self.state = ExchangeState::Sent;
        debug!(len = request.len(), send = self.sends, "request sent");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use bytes::BytesMut;
    use rhp_frame::{encode_frame, encode_message_frame, FrameType, InnerMessage};

    use super::*;

    /// Scripted transport: replays canned receive results, records sends.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        pub sent: Vec<Vec<u8>>,
        pub replies: VecDeque<rhp_transport::Result<Bytes>>,
        pub fallback: Option<Bytes>,
        pub timeouts_seen: Vec<Duration>,
        pub cancel_after_receive: Option<CancellationToken>,
    }

    impl ScriptedTransport {
        pub fn replying(replies: Vec<rhp_transport::Result<Bytes>>) -> Self {
            Self {
                replies: replies.into(),
                ..Self::default()
            }
        }

        pub fn always(reply: Bytes) -> Self {
            Self {
                fallback: Some(reply),
                ..Self::default()
            }
        }
    }

    impl Datagram for ScriptedTransport {
        fn send(&mut self, bytes: &[u8]) -> rhp_transport::Result<()> {
            self.sent.push(bytes.to_vec());
            Ok(())
        }

        fn receive(&mut self, timeout: Duration) -> rhp_transport::Result<Bytes> {
            self.timeouts_seen.push(timeout);
            if let Some(token) = &self.cancel_after_receive {
                token.cancel();
            }
            match self.replies.pop_front() {
                Some(reply) => reply,
                None => match &self.fallback {
                    Some(reply) => Ok(reply.clone()),
                    None => Err(TransportError::Timeout(timeout)),
                },
            }
        }
    }

    pub(crate) fn control_frame(text: &[u8], port_id: u16) -> Bytes {
        let mut buf = BytesMut::new();
        encode_frame(text, FrameType::Control, port_id, &mut buf).unwrap();
        buf.freeze()
    }

    pub(crate) fn corrupt(frame: &Bytes) -> Bytes {
        let mut bad = frame.to_vec();
        let last = bad.len() - 1;
        bad[last] ^= 0x5A;
        Bytes::from(bad)
    }

    fn request() -> Bytes {
        control_frame(b"hello", 514)
    }

    fn config() -> ExchangeConfig {
        ExchangeConfig {
            max_attempts: 5,
            receive_timeout: Duration::from_millis(50),
        }
    }

    #[test]
    fn first_valid_reply_completes() {
        let reply = control_frame(b"world", 514);
        let mut transport = ScriptedTransport::always(reply);
        let mut exchange = Exchange::new(&mut transport, config());

        let outcome = exchange.run(&request()).unwrap();
        assert_eq!(exchange.state(), ExchangeState::Done);
        assert_eq!(exchange.sends(), 1);
        assert_eq!(outcome.attempts(), 1);
        let frame = outcome.frame().unwrap();
        assert_eq!(frame.control_text().as_deref(), Some("dlrow"));
    }

    #[test]
    fn always_bad_checksum_sends_exactly_five_times() {
        let bad = corrupt(&control_frame(b"world", 514));
        let mut transport = ScriptedTransport::always(bad);

        let outcome = Exchange::new(&mut transport, config())
            .run(&request())
            .unwrap();

        assert_eq!(outcome, ExchangeOutcome::Failed { attempts_used: 5 });
        assert_eq!(transport.sent.len(), 5);
        assert_eq!(transport.timeouts_seen.len(), 5);
        let expected = request();
        assert!(transport.sent.iter().all(|sent| sent == expected.as_ref()));
    }

    #[test]
    fn recovers_after_bad_checksums() {
        let good = control_frame(b"ok", 514);
        let mut transport = ScriptedTransport::replying(vec![
            Ok(corrupt(&good)),
            Ok(corrupt(&good)),
            Ok(good.clone()),
        ]);

        let outcome = Exchange::new(&mut transport, config())
            .run(&request())
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(transport.sent.len(), 3);
    }

    #[test]
    fn timeouts_feed_retry_bookkeeping() {
        let good = control_frame(b"late", 514);
        let mut transport = ScriptedTransport::replying(vec![
            Err(TransportError::Timeout(Duration::from_millis(50))),
            Ok(good),
        ]);

        let outcome = Exchange::new(&mut transport, config())
            .run(&request())
            .unwrap();

        assert_eq!(outcome.attempts(), 2);
        assert_eq!(transport.sent.len(), 2);
        assert!(transport
            .timeouts_seen
            .iter()
            .all(|t| *t == Duration::from_millis(50)));
    }

    #[test]
    fn silent_peer_fails_after_all_attempts() {
        let mut transport = ScriptedTransport::default();
        let outcome = Exchange::new(&mut transport, config())
            .run(&request())
            .unwrap();
        assert_eq!(outcome, ExchangeOutcome::Failed { attempts_used: 5 });
        assert_eq!(transport.sent.len(), 5);
    }

    #[test]
    fn transport_error_is_fatal() {
        let mut transport = ScriptedTransport::replying(vec![Err(TransportError::Io(
            std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        ))]);

        let err = Exchange::new(&mut transport, config())
            .run(&request())
            .unwrap_err();

        assert!(matches!(err, ExchangeError::Transport(TransportError::Io(_))));
        assert_eq!(transport.sent.len(), 1);
    }

    #[test]
    fn verified_but_malformed_reply_fails_closed() {
        // Valid checksum, unknown frame type.
        let mut frame = BytesMut::from(&[0x05, 0x03, 0x00, 0x00, 0x00, 0x00][..]);
        let checksum = rhp_frame::compute_checksum(&frame);
        frame.extend_from_slice(&checksum.to_le_bytes());

        let mut transport = ScriptedTransport::always(frame.freeze());
        let err = Exchange::new(&mut transport, config())
            .run(&request())
            .unwrap_err();

        assert!(matches!(
            err,
            ExchangeError::Frame(rhp_frame::FrameError::UnknownFrameType(3))
        ));
    }

    #[test]
    fn embedded_reply_is_decoded() {
        let mut reply = BytesMut::new();
        encode_message_frame(&InnerMessage::id_response(105, 514, 7), 312, &mut reply).unwrap();
        let mut transport = ScriptedTransport::always(reply.freeze());

        let outcome = Exchange::new(&mut transport, config())
            .run(&request())
            .unwrap();

        let message = outcome.frame().and_then(RhpFrame::message).unwrap();
        assert_eq!(message.src_port, 105);
        assert_eq!(message.dst_port, 514);
    }

    #[test]
    fn cancelled_before_start_sends_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let mut transport = ScriptedTransport::default();

        let err = Exchange::new(&mut transport, config())
            .with_cancellation(token)
            .run(&request())
            .unwrap_err();

        assert!(matches!(err, ExchangeError::Cancelled));
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn cancellation_checked_before_each_retry() {
        let token = CancellationToken::new();
        let bad = corrupt(&control_frame(b"x", 1));
        let mut transport = ScriptedTransport::always(bad);
        transport.cancel_after_receive = Some(token.clone());

        let err = Exchange::new(&mut transport, config())
            .with_cancellation(token)
            .run(&request())
            .unwrap_err();

        assert!(matches!(err, ExchangeError::Cancelled));
        assert_eq!(transport.timeouts_seen.len(), 1);
        assert_eq!(transport.sent.len(), 2);
    }

    #[test]
    fn invalid_config_rejected_before_sending() {
        let mut transport = ScriptedTransport::default();
        let err = Exchange::new(
            &mut transport,
            ExchangeConfig {
                max_attempts: 0,
                ..config()
            },
        )
        .run(&request())
        .unwrap_err();

        assert!(matches!(err, ExchangeError::Config(_)));
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn single_attempt_never_resends() {
        let mut transport = ScriptedTransport::default();
        let outcome = Exchange::new(
            &mut transport,
            ExchangeConfig {
                max_attempts: 1,
                ..config()
            },
        )
        .run(&request())
        .unwrap();

        assert_eq!(outcome, ExchangeOutcome::Failed { attempts_used: 1 });
        assert_eq!(transport.sent.len(), 1);
    }
}
