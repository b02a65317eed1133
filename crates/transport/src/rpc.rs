//! UdpRpcSender - leader side of the control channel

use std::net::SocketAddr;

use contracts::{ClientAddress, ContractError, RpcMethod, RpcSender};
use tokio::net::UdpSocket;
use tracing::{debug, instrument};

use crate::wire::ControlMessage;

/// Sends fixed-size control datagrams to `client:port`
pub struct UdpRpcSender {
    socket: UdpSocket,
    port: u16,
}

impl UdpRpcSender {
    /// Bind to any available port and target the given client port
    pub async fn bind(local: SocketAddr, port: u16) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        Ok(Self { socket, port })
    }

    pub fn new(socket: UdpSocket, port: u16) -> Self {
        Self { socket, port }
    }

    /// Client port this sender targets
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl RpcSender for UdpRpcSender {
    #[instrument(
        name = "rpc_send",
        skip(self, payload),
        fields(client = %client, method = ?method)
    )]
    async fn send_rpc(
        &self,
        method: RpcMethod,
        payload: &str,
        client: ClientAddress,
    ) -> Result<(), ContractError> {
        let message = ControlMessage::new(method, payload).encode()?;
        let target = client.with_port(self.port);
        let sent = self
            .socket
            .send_to(&message, target)
            .await
            .map_err(|e| ContractError::network(target, e.to_string()))?;

        debug!(bytes = sent, "control message sent");
        Ok(())
    }
}
