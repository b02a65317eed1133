//! ExchangeResponder - client side of the clock exchange
//!
//! 对每个 8 字节请求：收到即记录 `t1`，回复前记录 `t2`，回送 `t0, t1, t2`。

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use contracts::{Clock, ShutdownFlag};
use tokio::net::UdpSocket;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::TransportError;
use crate::metrics::ListenerMetrics;
use crate::wire::{ExchangeReply, ExchangeRequest};

/// Shutdown 轮询间隔
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Exchange 应答器
pub struct ExchangeResponder<C> {
    socket: UdpSocket,
    clock: C,
    shutdown: ShutdownFlag,
    metrics: Arc<ListenerMetrics>,
    poll_interval: Duration,
}

impl<C: Clock> ExchangeResponder<C> {
    pub fn new(socket: UdpSocket, clock: C, shutdown: ShutdownFlag) -> Self {
        Self {
            socket,
            clock,
            shutdown,
            metrics: Arc::new(ListenerMetrics::new()),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub async fn bind(addr: SocketAddr, clock: C, shutdown: ShutdownFlag) -> std::io::Result<Self> {
        Ok(Self::new(UdpSocket::bind(addr).await?, clock, shutdown))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn metrics(&self) -> Arc<ListenerMetrics> {
        self.metrics.clone()
    }

    /// 应答直到 shutdown flag 被设置
    ///
    /// # Errors
    /// 非 shutdown 期间的 socket 接收错误
    #[instrument(name = "exchange_responder", skip(self), fields(addr = ?self.socket.local_addr().ok()))]
    pub async fn run(self) -> Result<(), TransportError> {
        let mut buf = [0u8; 64];
        info!("exchange responder started");

        while !self.shutdown.is_triggered() {
            let received =
                tokio::time::timeout(self.poll_interval, self.socket.recv_from(&mut buf)).await;
            let (len, peer) = match received {
                Err(_) => continue,
                Ok(Ok(received)) => received,
                Ok(Err(e)) if self.shutdown.is_triggered() => {
                    debug!(error = %e, "receive interrupted by shutdown");
                    break;
                }
                Ok(Err(e)) => {
                    error!(error = %e, "exchange receive failed");
                    return Err(e.into());
                }
            };

            let t1 = self.clock.read();
            let request = match ExchangeRequest::decode(&buf[..len]) {
                Ok(request) => request,
                Err(e) => {
                    warn!(peer = %peer, error = %e, "ignoring malformed exchange request");
                    self.metrics.inc_malformed();
                    continue;
                }
            };
            let t2 = self.clock.read();

            let reply = ExchangeReply {
                t0: request.t0,
                t1,
                t2,
            }
            .encode();
            match self.socket.send_to(&reply, peer).await {
                Ok(_) => {
                    self.metrics.inc_handled();
                    trace!(peer = %peer, t0 = request.t0, t1, t2, "exchange reply sent");
                }
                Err(e) => {
                    // UDP is best-effort; the leader counts the round as missing
                    warn!(peer = %peer, error = %e, "exchange reply send failed");
                    self.metrics.inc_failures();
                }
            }
        }

        info!("exchange responder stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Clock that advances by 10ns per read
    #[derive(Default)]
    struct SteppingClock(AtomicI64);

    impl Clock for SteppingClock {
        fn read(&self) -> i64 {
            self.0.fetch_add(10, Ordering::SeqCst)
        }
    }

    async fn start() -> (SocketAddr, ShutdownFlag, Arc<ListenerMetrics>, tokio::task::JoinHandle<Result<(), TransportError>>) {
        let shutdown = ShutdownFlag::new();
        let responder = ExchangeResponder::bind(
            "127.0.0.1:0".parse().unwrap(),
            SteppingClock::default(),
            shutdown.clone(),
        )
        .await
        .unwrap();
        let addr = responder.local_addr().unwrap();
        let metrics = responder.metrics();
        let handle = tokio::spawn(responder.run());
        (addr, shutdown, metrics, handle)
    }

    #[tokio::test]
    async fn test_reply_echoes_t0() {
        let (addr, shutdown, metrics, handle) = start().await;
        let leader = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        leader
            .send_to(&ExchangeRequest { t0: 777 }.encode(), addr)
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), leader.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let reply = ExchangeReply::decode(&buf[..len]).unwrap();
        assert_eq!(reply.t0, 777);
        assert!(reply.t2 > reply.t1);

        shutdown.trigger();
        assert!(handle.await.unwrap().is_ok());
        assert_eq!(metrics.snapshot().handled, 1);
    }

    #[tokio::test]
    async fn test_malformed_request_is_ignored() {
        let (addr, shutdown, metrics, handle) = start().await;
        let leader = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        leader.send_to(&[1, 2, 3], addr).await.unwrap();
        leader
            .send_to(&ExchangeRequest { t0: 5 }.encode(), addr)
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), leader.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ExchangeReply::decode(&buf[..len]).unwrap().t0, 5);

        shutdown.trigger();
        handle.await.unwrap().unwrap();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.malformed, 1);
        assert_eq!(snapshot.handled, 1);
    }
}
