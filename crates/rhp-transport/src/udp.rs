use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{Datagram, DEFAULT_MAX_DATAGRAM};

/// Smallest timeout handed to the socket; `set_read_timeout` rejects zero.
const MIN_SOCKET_TIMEOUT: Duration = Duration::from_millis(1);

/// Resolve `host:port` to the first matching socket address.
pub fn resolve(target: &str) -> Result<SocketAddr> {
    let mut addrs = target
        .to_socket_addrs()
        .map_err(|err| TransportError::Resolve {
            target: target.to_string(),
            reason: err.to_string(),
        })?;
    addrs.next().ok_or_else(|| TransportError::Resolve {
        target: target.to_string(),
        reason: "no addresses found".to_string(),
    })
}

/// UDP transport bound to one local address and connected to one peer.
///
/// Connecting the socket makes the kernel drop datagrams from any other
/// source, so `receive` only ever yields replies from the peer.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
    max_datagram: usize,
}

impl UdpTransport {
    /// Bind an ephemeral local port and connect to `peer`.
    pub fn connect(peer: SocketAddr) -> Result<Self> {
        let local = if peer.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        Self::bind(local, peer)
    }

    /// Bind `local` and connect to `peer`.
    pub fn bind(local: SocketAddr, peer: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(local).map_err(|source| TransportError::Bind {
            addr: local,
            source,
        })?;
        socket
            .connect(peer)
            .map_err(|source| TransportError::Connect { addr: peer, source })?;

        debug!(?local, ?peer, "udp transport connected");

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
}

impl Datagram for UdpTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        loop {
            match self.socket.send(bytes) {
                Ok(_) => {
                    debug!(len = bytes.len(), peer = ?self.peer, "datagram sent");
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn receive(&mut self, timeout: Duration) -> Result<Bytes> {
        self.socket
            .set_read_timeout(Some(timeout.max(MIN_SOCKET_TIMEOUT)))?;

        // One spare byte tells an exactly-full datagram apart from a truncated one.
        let mut buf = vec![0u8; self.max_datagram + 1];
        let read = recv_with_timeout(timeout, || self.socket.recv(&mut buf))?;

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

/// Unconnected UDP socket that answers whichever peer wrote to it.
#[derive(Debug)]
pub struct UdpServer {
    socket: UdpSocket,
    max_datagram: usize,
}

impl UdpServer {
    /// Bind a server socket on `local`.
    pub fn bind(local: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(local).map_err(|source| TransportError::Bind {
            addr: local,
            source,
        })?;
        info!(addr = ?socket.local_addr().ok(), "listening for datagrams");
        Ok(Self {
            socket,
            max_datagram: DEFAULT_MAX_DATAGRAM,
        })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(Into::into)
    }

    /// Wait up to `timeout` for a datagram from any peer.
    pub fn recv_from(&self, timeout: Duration) -> Result<(Bytes, SocketAddr)> {
        self.socket
            .set_read_timeout(Some(timeout.max(MIN_SOCKET_TIMEOUT)))?;

        let mut buf = vec![0u8; self.max_datagram + 1];
        let mut from = None;
        let read = recv_with_timeout(timeout, || {
            let (n, addr) = self.socket.recv_from(&mut buf)?;
            from = Some(addr);
            Ok(n)
        })?;

        if read > self.max_datagram {
            return Err(TransportError::DatagramTooLarge {
                size: read,
                max: self.max_datagram,
            });
        }

        let from = from.ok_or_else(|| {
            TransportError::Io(std::io::Error::other("recv_from returned no address"))
        })?;
        buf.truncate(read);
        Ok((Bytes::from(buf), from))
    }

    /// Send one datagram to `peer`.
    pub fn send_to(&self, bytes: &[u8], peer: SocketAddr) -> Result<()> {
        self.socket.send_to(bytes, peer)?;
        debug!(len = bytes.len(), ?peer, "datagram sent");
        Ok(())
    }
}

fn recv_with_timeout<F>(timeout: Duration, mut recv: F) -> Result<usize>
where
    F: FnMut() -> std::io::Result<usize>,
{
    loop {
        match recv() {
            Ok(n) => return Ok(n),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut => {
                return Err(TransportError::Timeout(timeout));
            }
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[test]
    fn test_send_receive_over_loopback() {
        let server = UdpServer::bind(loopback()).unwrap();
        let server_addr = server.local_addr().unwrap();

        let mut client = UdpTransport::bind(loopback(), server_addr).unwrap();
        assert_eq!(client.peer_addr(), server_addr);
        client.send(b"hello").unwrap();

        let (data, from) = server.recv_from(Duration::from_secs(2)).unwrap();
        assert_eq!(data.as_ref(), b"hello");
        assert_eq!(from, client.local_addr().unwrap());

        server.send_to(b"world", from).unwrap();
        let reply = client.receive(Duration::from_secs(2)).unwrap();
        assert_eq!(reply.as_ref(), b"world");
    }

    #[test]
    fn test_receive_times_out() {
        let server = UdpServer::bind(loopback()).unwrap();
        let mut client = UdpTransport::bind(loopback(), server.local_addr().unwrap()).unwrap();

        let err = client.receive(Duration::from_millis(20)).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_oversized_datagram_rejected() {
        let server = UdpServer::bind(loopback()).unwrap();
        let mut client = UdpTransport::bind(loopback(), server.local_addr().unwrap())
            .unwrap()
            .with_max_datagram(8);

        server
            .send_to(&[0xAB; 32], client.local_addr().unwrap())
            .unwrap();
        let err = client.receive(Duration::from_secs(2)).unwrap_err();
        assert!(matches!(
            err,
            TransportError::DatagramTooLarge { size: 9, max: 8 }
        ));
    }

    #[test]
    fn test_ignores_datagrams_from_other_peers() {
        let server = UdpServer::bind(loopback()).unwrap();
        let stranger = UdpServer::bind(loopback()).unwrap();
        let mut client = UdpTransport::bind(loopback(), server.local_addr().unwrap()).unwrap();
        let client_addr = client.local_addr().unwrap();

        stranger.send_to(b"noise", client_addr).unwrap();
        server.send_to(b"reply", client_addr).unwrap();

        let data = client.receive(Duration::from_secs(2)).unwrap();
        assert_eq!(data.as_ref(), b"reply");
    }

    #[test]
    fn test_resolve_localhost() {
        let addr = resolve("127.0.0.1:1874").unwrap();
        assert_eq!(addr.port(), 1874);
    }

    #[test]
    fn test_resolve_rejects_garbage() {
        let result = resolve("not a host");
        assert!(matches!(result, Err(TransportError::Resolve { .. })));
    }
}
