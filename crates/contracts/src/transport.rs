//! Datagram transport interfaces consumed by the engines

use std::net::SocketAddr;
use std::time::Duration;

use crate::{ClientAddress, ContractError, RpcMethod};

/// Datagram socket used by the clock exchange
#[trait_variant::make(ExchangeSocket: Send)]
pub trait LocalExchangeSocket {
    /// Send one datagram
    async fn send_to(&self, payload: &[u8], target: SocketAddr) -> Result<(), ContractError>;

    /// Receive one datagram into `buf`, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when the wait timed out. Datagrams longer than
    /// `buf` are truncated to `buf.len()`.
    async fn recv_timeout(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<(usize, SocketAddr)>, ContractError>;
}

/// Out-of-band control channel towards clients
#[trait_variant::make(RpcSender: Send)]
pub trait LocalRpcSender {
    async fn send_rpc(
        &self,
        method: RpcMethod,
        payload: &str,
        client: ClientAddress,
    ) -> Result<(), ContractError>;
}
