//! Connectionless datagram transport for RHP exchanges.
//!
//! The exchange layer only needs two things from the network: send one
//! datagram to the peer, and wait a bounded time for one datagram back.
//! [`Datagram`] captures that contract; [`UdpTransport`] implements it over a
//! connected `std::net::UdpSocket`.
//!
//! With the `async` feature, [`AsyncUdpTransport`] provides the same contract
//! on top of `tokio::net::UdpSocket`.

pub mod error;
pub mod traits;
pub mod udp;

#[cfg(feature = "async")]
pub mod tokio_udp;

pub use error::{Result, TransportError};
pub use traits::{Datagram, DEFAULT_MAX_DATAGRAM};
pub use udp::{resolve, UdpServer, UdpTransport};

#[cfg(feature = "async")]
pub use tokio_udp::AsyncUdpTransport;
