use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::DEFAULT_MAX_DATAGRAM;

/// Async UDP transport connected to a single peer.
#[derive(Debug)]
pub struct AsyncUdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
    max_datagram: usize,
}

impl AsyncUdpTransport {
    /// Bind an ephemeral local port and connect to `peer`.
    pub async fn connect(peer: SocketAddr) -> Result<Self> {
        let local = if peer.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        Self::bind(local, peer).await
    }

    /// Bind `local` and connect to `peer`.
    pub async fn bind(local: SocketAddr, peer: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| TransportError::Bind {
                addr: local,
                source,
            })?;
        socket
            .connect(peer)
            .await
            .map_err(|source| TransportError::Connect { addr: peer, source })?;

        debug!(?local, ?peer, "async udp transport connected");

        Ok(Self {
            socket,
            peer,
            max_datagram: DEFAULT_MAX_DATAGRAM,
        })
    }

    /// Override the largest datagram accepted by `receive`.
    pub fn with_max_datagram(mut self, max_datagram: usize) -> Self {
        self.max_datagram = max_datagram;
        self
    }

    /// The remote peer address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// The bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(Into::into)
    }

    /// Send one datagram to the peer.
    pub async fn send(&self, bytes: &[u8]) -> Result<()> {
        self.socket.send(bytes).await?;
        debug!(len = bytes.len(), peer = ?self.peer, "datagram sent");
        Ok(())
    }

    /// Wait up to `timeout` for one datagram from the peer.
    pub async fn receive(&self, timeout: Duration) -> Result<Bytes> {
        let mut buf = vec![0u8; self.max_datagram + 1];
        let read = tokio::time::timeout(timeout, self.socket.recv(&mut buf))
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;

        if read > self.max_datagram {
            return Err(TransportError::DatagramTooLarge {
                size: read,
                max: self.max_datagram,
            });
        }

        buf.truncate(read);
        debug!(len = read, peer = ?self.peer, "datagram received");
        Ok(Bytes::from(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_async_roundtrip_and_timeout() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();

        let client = AsyncUdpTransport::bind(SocketAddr::from(([127, 0, 0, 1], 0)), server_addr)
            .await
            .unwrap();
        assert_eq!(client.peer_addr(), server_addr);
        client.send(b"ping").await.unwrap();

        let mut buf = [0u8; 16];
        let (n, from) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");

        server.send_to(b"pong", from).await.unwrap();
        let reply = client.receive(Duration::from_secs(2)).await.unwrap();
        assert_eq!(reply.as_ref(), b"pong");

        let err = client.receive(Duration::from_millis(20)).await.unwrap_err();
        assert!(err.is_timeout());
    }
}
