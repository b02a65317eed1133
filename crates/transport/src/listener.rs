//! ControlListener - client side of the control channel
//!
//! - `StartRecording`: 录制固定窗口，随后连接 leader 的传输端口上传录制文件
//! - `StopRecording`: 窗口固定，仅记录日志
//! - `OffsetUpdate`: 更新 `LeaderAlignedClock`
//! - 未知 method: 记录日志并忽略

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    Clock, FileDetails, GyroRecorder, LeaderAlignedClock, RpcMethod, ShutdownFlag, RPC_BUFFER_SIZE,
};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tracing::{debug, error, info, instrument, warn};

use crate::error::TransportError;
use crate::file_transfer::send_file;
use crate::metrics::ListenerMetrics;
use crate::wire::ControlMessage;

/// 控制监听配置
#[derive(Debug, Clone)]
pub struct ControlListenerConfig {
    /// 固定录制窗口
    pub recording_window: Duration,

    /// Leader 接收录制文件的 TCP 端口
    pub transfer_port: u16,

    /// Shutdown 轮询间隔
    pub poll_interval: Duration,
}

impl Default for ControlListenerConfig {
    fn default() -> Self {
        Self {
            recording_window: Duration::from_secs(10),
            transfer_port: 9429,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// 控制报文监听器
pub struct ControlListener<R: ?Sized, C> {
    socket: UdpSocket,
    recorder: Arc<R>,
    clock: Arc<LeaderAlignedClock<C>>,
    config: ControlListenerConfig,
    shutdown: ShutdownFlag,
    metrics: Arc<ListenerMetrics>,
}

impl<R, C> ControlListener<R, C>
where
    R: GyroRecorder + ?Sized,
    C: Clock,
{
    pub fn new(
        socket: UdpSocket,
        recorder: Arc<R>,
        clock: Arc<LeaderAlignedClock<C>>,
        config: ControlListenerConfig,
        shutdown: ShutdownFlag,
    ) -> Self {
        Self {
            socket,
            recorder,
            clock,
            config,
            shutdown,
            metrics: Arc::new(ListenerMetrics::new()),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn metrics(&self) -> Arc<ListenerMetrics> {
        self.metrics.clone()
    }

    /// 监听直到 shutdown flag 被设置
    ///
    /// # Errors
    /// 非 shutdown 期间的 socket 接收错误
    #[instrument(name = "control_listener", skip(self), fields(addr = ?self.socket.local_addr().ok()))]
    pub async fn run(self) -> Result<(), TransportError> {
        let mut buf = vec![0u8; RPC_BUFFER_SIZE];
        info!("control listener started");

        while !self.shutdown.is_triggered() {
            let received =
                tokio::time::timeout(self.config.poll_interval, self.socket.recv_from(&mut buf))
                    .await;
            let (len, peer) = match received {
                Err(_) => continue,
                Ok(Ok(received)) => received,
                Ok(Err(e)) if self.shutdown.is_triggered() => {
                    debug!(error = %e, "receive interrupted by shutdown");
                    break;
                }
                Ok(Err(e)) => {
                    error!(error = %e, "control receive failed");
                    return Err(e.into());
                }
            };
            self.handle(&buf[..len], peer).await;
        }

        info!("control listener stopped");
        Ok(())
    }

    async fn handle(&self, datagram: &[u8], peer: SocketAddr) {
        let message = match ControlMessage::decode(datagram) {
            Ok(message) => message,
            Err(e) => {
                warn!(peer = %peer, error = %e, "ignoring malformed control message");
                self.metrics.inc_malformed();
                return;
            }
        };

        match message.method() {
            Some(RpcMethod::StartRecording) => match self.record_and_upload(peer).await {
                Ok(details) => {
                    info!(name = %details.name, size = details.size, "recording uploaded to leader");
                    self.metrics.inc_handled();
                }
                Err(e) => {
                    warn!(peer = %peer, error = %e, "recording request failed");
                    self.metrics.inc_failures();
                }
            },
            Some(RpcMethod::StopRecording) => {
                debug!(peer = %peer, "stop recording received, window is fixed");
                self.metrics.inc_handled();
            }
            Some(RpcMethod::OffsetUpdate) => match message.payload.trim().parse::<i64>() {
                Ok(offset_ns) => {
                    self.clock.set_offset_ns(offset_ns);
                    info!(offset_ns, "offset updated from leader");
                    self.metrics.inc_handled();
                }
                Err(e) => {
                    warn!(payload = %message.payload, error = %e, "invalid offset payload");
                    self.metrics.inc_malformed();
                }
            },
            None => {
                warn!(peer = %peer, code = message.code, "unknown control method, ignoring");
                self.metrics.inc_unknown();
            }
        }
    }

    async fn record_and_upload(&self, leader: SocketAddr) -> Result<FileDetails, TransportError> {
        let session = chrono::Local::now().format("%d.%m.%H.%M.%S").to_string();
        self.recorder.start_recording(&session)?;
        debug!(session = %session, window = ?self.config.recording_window, "recording");
        tokio::time::sleep(self.config.recording_window).await;
        let path = self.recorder.stop_recording()?;

        let target = SocketAddr::new(leader.ip(), self.config.transfer_port);
        let mut stream = TcpStream::connect(target).await?;
        let details = send_file(&path, &mut stream).await?;
        stream.shutdown().await?;
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use contracts::{ContractError, MonotonicClock};
    use tokio::net::TcpListener;

    /// Recorder that writes a fixed file on stop
    struct FixedRecorder {
        dir: PathBuf,
        session: Mutex<Option<String>>,
    }

    impl GyroRecorder for FixedRecorder {
        fn start_recording(&self, session: &str) -> Result<(), ContractError> {
            *self.session.lock().unwrap() = Some(session.to_string());
            Ok(())
        }

        fn stop_recording(&self) -> Result<PathBuf, ContractError> {
            let session = self
                .session
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| ContractError::recording("not recording"))?;
            let path = self.dir.join(format!("gyro_{session}.csv"));
            std::fs::write(&path, "1,2,3,100\n")?;
            Ok(path)
        }

        fn is_recording(&self) -> bool {
            self.session.lock().unwrap().is_some()
        }
    }

    struct Harness {
        addr: SocketAddr,
        clock: Arc<LeaderAlignedClock<MonotonicClock>>,
        metrics: Arc<ListenerMetrics>,
        shutdown: ShutdownFlag,
        handle: tokio::task::JoinHandle<Result<(), TransportError>>,
        _dir: tempfile::TempDir,
    }

    async fn start(transfer_port: u16) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(FixedRecorder {
            dir: dir.path().to_path_buf(),
            session: Mutex::new(None),
        });
        let clock = Arc::new(LeaderAlignedClock::new(MonotonicClock::new()));
        let shutdown = ShutdownFlag::new();
        let listener = ControlListener::new(
            UdpSocket::bind("127.0.0.1:0").await.unwrap(),
            recorder,
            clock.clone(),
            ControlListenerConfig {
                recording_window: Duration::from_millis(20),
                transfer_port,
                poll_interval: Duration::from_millis(20),
            },
            shutdown.clone(),
        );
        let addr = listener.local_addr().unwrap();
        let metrics = listener.metrics();
        let handle = tokio::spawn(listener.run());
        Harness {
            addr,
            clock,
            metrics,
            shutdown,
            handle,
            _dir: dir,
        }
    }

    async fn send(addr: SocketAddr, message: ControlMessage) -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket
            .send_to(&message.encode().unwrap(), addr)
            .await
            .unwrap();
        socket
    }

    async fn wait_for(metrics: &ListenerMetrics, f: impl Fn(&crate::MetricsSnapshot) -> bool) {
        for _ in 0..100 {
            if f(&metrics.snapshot()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached: {:?}", metrics.snapshot());
    }

    #[tokio::test]
    async fn test_offset_update_applies_to_clock() {
        let harness = start(9).await;
        let _sender = send(
            harness.addr,
            ControlMessage::new(RpcMethod::OffsetUpdate, "-5000"),
        )
        .await;

        wait_for(&harness.metrics, |s| s.handled == 1).await;
        assert_eq!(harness.clock.offset_ns(), -5000);

        harness.shutdown.trigger();
        harness.handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_unknown_method_is_ignored() {
        let harness = start(9).await;
        let _sender = send(
            harness.addr,
            ControlMessage {
                code: 999,
                payload: String::new(),
            },
        )
        .await;

        wait_for(&harness.metrics, |s| s.unknown == 1).await;
        assert_eq!(harness.clock.offset_ns(), 0);

        harness.shutdown.trigger();
        harness.handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_start_recording_uploads_file() {
        let leader = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let harness = start(leader.local_addr().unwrap().port()).await;
        let _sender = send(
            harness.addr,
            ControlMessage::new(RpcMethod::StartRecording, ""),
        )
        .await;

        let (mut stream, _) = tokio::time::timeout(Duration::from_secs(2), leader.accept())
            .await
            .unwrap()
            .unwrap();
        let out = tempfile::tempdir().unwrap();
        let path = crate::receive_file(&mut stream, out.path(), "gyro_client.csv")
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "1,2,3,100\n");

        wait_for(&harness.metrics, |s| s.handled == 1).await;
        harness.shutdown.trigger();
        harness.handle.await.unwrap().unwrap();
    }
}
