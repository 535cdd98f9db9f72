use bytes::BytesMut;
use rhp_frame::{encode_frame, encode_message_frame, fits_port, FrameType, InnerMessage};
use rhp_transport::{resolve, Datagram, UdpTransport};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ClientConfig;
use crate::error::{ExchangeError, Result};
use crate::exchange::{Exchange, ExchangeOutcome};

/// Sends RHP requests to one server and waits for verified replies.
///
/// Each call runs an independent [`Exchange`]; calls never overlap because
/// they all borrow the client mutably.
pub struct Client<T> {
    transport: T,
    config: ClientConfig,
    cancel: CancellationToken,
}

impl Client<UdpTransport> {
    /// Resolve `config.server` and connect a UDP transport to it.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let server = resolve(&config.server)?;
        let transport = UdpTransport::connect(server)?;
        info!(%server, "client ready");
        Self::new(transport, config)
    }
}

impl<T: Datagram> Client<T> {
    /// Wrap an existing transport.
    pub fn new(transport: T, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Share a cancellation token with the caller.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The token checked before every receive attempt.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a Control frame carrying `text` on the control port.
    pub fn send_control(&mut self, text: &str) -> Result<ExchangeOutcome> {
        let mut request = BytesMut::new();
        encode_frame(
            text.as_bytes(),
            FrameType::Control,
            self.config.control_port,
            &mut request,
        )?;
        info!(text, port_id = self.config.control_port, "sending control message");
        self.exchange(&request)
    }

    /// Ask `dst_port` for its message text.
    pub fn request_message(&mut self, src_port: u16, dst_port: u16) -> Result<ExchangeOutcome> {
        check_ports(src_port, dst_port)?;
        self.send_message(&InnerMessage::message_request(src_port, dst_port))
    }

    /// Ask `dst_port` for its identifier.
    pub fn request_id(&mut self, src_port: u16, dst_port: u16) -> Result<ExchangeOutcome> {
        check_ports(src_port, dst_port)?;
        self.send_message(&InnerMessage::id_request(src_port, dst_port))
    }

    /// Send `message` embedded in an RHP frame on the message port.
    pub fn send_message(&mut self, message: &InnerMessage) -> Result<ExchangeOutcome> {
        let mut request = BytesMut::new();
        encode_message_frame(message, self.config.message_port, &mut request)?;
        info!(
            msg_type = message.msg_type().name(),
            src_port = message.src_port,
            dst_port = message.dst_port,
            "sending rhmp message"
        );
        self.exchange(&request)
    }

    /// Run one exchange with already-encoded request bytes.
    pub fn exchange(&mut self, request: &[u8]) -> Result<ExchangeOutcome> {
        Exchange::new(&mut self.transport, self.config.exchange.clone())
            .with_cancellation(self.cancel.clone())
            .run(request)
    }

    /// Borrow the transport.
    pub fn get_ref(&self) -> &T {
        &self.transport
    }

    /// Consume the client and return the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }
}

fn check_ports(src_port: u16, dst_port: u16) -> Result<()> {
    for port in [src_port, dst_port] {
        if !fits_port(port) {
            return Err(ExchangeError::PortOutOfRange(port));
        }
    }
    Ok(())
}
