//! Request/response exchanges of RHP frames over an unreliable channel.
//!
//! One exchange sends a request frame, then waits for a reply whose checksum
//! verifies. Bad checksums and receive timeouts trigger a resend of the same
//! bytes; after [`ExchangeConfig::max_attempts`] receive attempts the exchange
//! ends with [`ExchangeOutcome::Failed`]. Transport failures other than
//! timeouts, and replies that verify but cannot be decoded, end the exchange
//! with an error.

pub mod client;
pub mod config;
pub mod error;
pub mod exchange;
pub mod responder;
pub mod session;

#[cfg(feature = "async")]
pub mod async_exchange;

pub use client::Client;
pub use config::{ClientConfig, ExchangeConfig, ResponderConfig};
pub use error::{ExchangeError, Result};
pub use exchange::{Exchange, ExchangeOutcome, ExchangeState};
pub use responder::{serve, Responder};
pub use session::{run_session, SessionStep, StepReport};
pub use tokio_util::sync::CancellationToken;

#[cfg(feature = "async")]
pub use async_exchange::exchange_async;
