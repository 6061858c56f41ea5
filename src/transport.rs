//! # Datagram Transport
//!
//! Best-effort, one-datagram-per-message delivery between peers. There is no
//! retry, acknowledgment, ordering or duplicate suppression; a lost datagram
//! is simply lost.

use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{lookup_host, UdpSocket};
use tracing::debug;

use crate::error::TransportError;
use crate::protocol::MAX_DATAGRAM_SIZE;

/// One inbound datagram.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub payload: Bytes,
    pub source: SocketAddr,
}

impl Datagram {
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one payload to `peer` (`host:port`). Returns bytes sent.
    async fn send(&self, peer: &str, payload: &[u8]) -> Result<usize, TransportError>;

    /// Wait for the next inbound datagram.
    async fn recv(&self) -> Result<Datagram, TransportError>;
}

/// UDP implementation. One socket is used for both directions.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    send_timeout: Duration,
}

impl UdpTransport {
    /// Bind the node's receive socket. Failure here is fatal to startup.
    pub async fn bind(addr: SocketAddr, send_timeout: Duration) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr).await.map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let local_addr = socket.local_addr().map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        Ok(Self {
            socket,
            local_addr,
            send_timeout,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn resolve(&self, peer: &str) -> Result<SocketAddr, TransportError> {
        let mut addrs = lookup_host(peer)
            .await
            .map_err(|source| TransportError::Resolve {
                peer: peer.to_string(),
                source,
            })?
            .collect::<Vec<_>>();

        // Prefer the family the socket is bound to.
        let wanted_v4 = self.local_addr.is_ipv4();
        addrs.sort_by_key(|addr| addr.is_ipv4() != wanted_v4);
        addrs
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::NoAddress(peer.to_string()))
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, peer: &str, payload: &[u8]) -> Result<usize, TransportError> {
        let attempt = async {
            let target = self.resolve(peer).await?;
            self.socket
                .send_to(payload, target)
                .await
                .map_err(|source| TransportError::Send {
                    peer: peer.to_string(),
                    source,
                })
        };

        let sent = tokio::time::timeout(self.send_timeout, attempt)
            .await
            .map_err(|_| TransportError::Timeout {
                peer: peer.to_string(),
                timeout: self.send_timeout,
            })??;

        debug!("Sent {} bytes to {}", sent, peer);
        Ok(sent)
    }

    async fn recv(&self) -> Result<Datagram, TransportError> {
        // One spare byte tells a full-size message from a truncated larger one.
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE + 1];
        let (len, source) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(TransportError::Receive)?;
        if len > MAX_DATAGRAM_SIZE {
            return Err(TransportError::Oversized {
                peer: source,
                limit: MAX_DATAGRAM_SIZE,
            });
        }
        buf.truncate(len);

        Ok(Datagram {
            payload: Bytes::from(buf),
            source,
        })
    }
}
