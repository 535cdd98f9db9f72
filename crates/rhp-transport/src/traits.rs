use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// Largest datagram accepted by the bundled transports: 1 KiB.
pub const DEFAULT_MAX_DATAGRAM: usize = 1024;

/// A connectionless channel to a single peer.
///
/// Each `send` transmits exactly one datagram; each `receive` returns exactly
/// one datagram or fails. Implementations must honour the timeout: an
/// unresponsive peer yields [`TransportError::Timeout`](crate::TransportError::Timeout)
/// rather than blocking forever.
pub trait Datagram {
    /// Send one datagram to the peer.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for one datagram from the peer.
    fn receive(&mut self, timeout: Duration) -> Result<Bytes>;
}

impl<T: Datagram + ?Sized> Datagram for &mut T {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }

    fn receive(&mut self, timeout: Duration) -> Result<Bytes> {
        (**self).receive(timeout)
    }
}
