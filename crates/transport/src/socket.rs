//! UdpExchangeSocket - leader side of the clock exchange

use std::net::SocketAddr;
use std::time::Duration;

use contracts::{ContractError, ExchangeSocket};
use tokio::net::UdpSocket;
use tracing::debug;

/// Tokio UDP socket with receive timeouts
pub struct UdpExchangeSocket {
    socket: UdpSocket,
}

impl UdpExchangeSocket {
    /// Bind to a local address (port 0 picks an ephemeral port)
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        debug!(local = ?socket.local_addr().ok(), "exchange socket bound");
        Ok(Self { socket })
    }

    pub fn from_socket(socket: UdpSocket) -> Self {
        Self { socket }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl ExchangeSocket for UdpExchangeSocket {
    async fn send_to(&self, payload: &[u8], target: SocketAddr) -> Result<(), ContractError> {
        self.socket
            .send_to(payload, target)
            .await
            .map(|_| ())
            .map_err(|e| ContractError::network(target, e.to_string()))
    }

    async fn recv_timeout(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<(usize, SocketAddr)>, ContractError> {
        match tokio::time::timeout(timeout, self.socket.recv_from(buf)).await {
            Err(_) => Ok(None),
            Ok(Ok(received)) => Ok(Some(received)),
            Ok(Err(e)) => Err(ContractError::network("udp", e.to_string())),
        }
    }
}
