use std::path::Path;
use std::time::Duration;

use rhp_frame::fits_port;
use serde::{Deserialize, Serialize};

use crate::error::{ExchangeError, Result};

/// Retry policy for a single exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Receive attempts per exchange; the request is sent once per attempt.
    pub max_attempts: u32,
    /// How long each receive waits before counting as a failed attempt.
    #[serde(rename = "receive_timeout_ms", with = "millis")]
    pub receive_timeout: Duration,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            receive_timeout: Duration::from_secs(2),
        }
    }
}

impl ExchangeConfig {
    /// Reject settings that would make an exchange meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ExchangeError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.receive_timeout.is_zero() {
            return Err(ExchangeError::Config(
                "receive_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Client endpoint and addressing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server `host:port`.
    pub server: String,
    /// RHP port ID for Control frames.
    pub control_port: u16,
    /// RHP port ID for frames carrying RHMP messages.
    pub message_port: u16,
    /// RHMP source port.
    pub src_port: u16,
    /// RHMP destination port.
    pub dst_port: u16,
    /// Control text sent by a session.
    pub greeting: String,
    /// Retry policy.
    pub exchange: ExchangeConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:1874".to_string(),
            control_port: 514,
            message_port: 312,
            src_port: 514,
            dst_port: 105,
            greeting: "hello".to_string(),
            exchange: ExchangeConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load a configuration from a JSON file; missing fields keep defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|source| ExchangeError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_slice(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check ports and retry policy.
    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(ExchangeError::Config("server must not be empty".to_string()));
        }
        for port in [self.src_port, self.dst_port] {
            if !fits_port(port) {
                return Err(ExchangeError::PortOutOfRange(port));
            }
        }
        self.exchange.validate()
    }
}

/// What a [`Responder`](crate::Responder) answers with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// RHP port ID stamped on replies.
    pub port_id: u16,
    /// Reply text for Control frames.
    pub control_reply: String,
    /// Text of MessageResponse replies.
    pub message: String,
    /// Identifier of IdResponse replies.
    pub id: u32,
    /// Number of initial replies sent with a broken checksum.
    pub corrupt_replies: u32,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            port_id: 312,
            control_reply: "hello".to_string(),
            message: "greetings from rhp".to_string(),
            id: 0x0001_E240,
            corrupt_replies: 0,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
