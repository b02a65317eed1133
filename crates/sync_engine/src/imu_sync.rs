//! Signal-based sync engine
//!
//! Leader 与 client 同时录制一段陀螺仪数据，client 通过 TCP 上传录制文件，
//! leader 用 [`SignalDelayEstimator`] 估计两条轨迹的延迟：
//!
//! ```text
//! offset_ns = -(mean(t_leader[i] - t_client[i]) + delay) * 1e9
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use contracts::{
    ClientAddress, DelayEstimate, GyroRecorder, ImuSyncConfig, RpcMethod, RpcSender, SignalSeries,
    SyncEvent, SyncResult, TimeSyncEngine,
};
use ingestion::read_signal_csv;
use observability::metrics::record_sync_result;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use transport::receive_file;

use crate::error::ImuSyncError;
use crate::estimator::{EstimatorConfig, SignalDelayEstimator};

/// 接收到的 client 录制文件名
pub const CLIENT_RECORDING_NAME: &str = "gyro_client.csv";

/// 录制会话标签
fn session_tag() -> String {
    chrono::Local::now().format("%d.%m.%H.%M.%S").to_string()
}

/// 未正常结束时停止录制
struct RecordingGuard<'a, R: GyroRecorder + ?Sized> {
    recorder: &'a R,
}

impl<R: GyroRecorder + ?Sized> Drop for RecordingGuard<'_, R> {
    fn drop(&mut self) {
        if self.recorder.is_recording() {
            if let Err(e) = self.recorder.stop_recording() {
                warn!(error = %e, "failed to stop abandoned recording");
            }
        }
    }
}

pub struct ImuSyncEngine<T, R: ?Sized> {
    control: T,
    recorder: Arc<R>,
    estimator: SignalDelayEstimator,
    config: ImuSyncConfig,
    bind_ip: IpAddr,
    /// 接收 client 录制文件的 TCP 端口
    transfer_port: u16,
    events: Option<broadcast::Sender<SyncEvent>>,
}

impl<T, R> ImuSyncEngine<T, R>
where
    T: RpcSender + Sync,
    R: GyroRecorder + ?Sized,
{
    pub fn new(
        control: T,
        recorder: Arc<R>,
        config: ImuSyncConfig,
        bind_ip: IpAddr,
        transfer_port: u16,
    ) -> Self {
        Self {
            control,
            recorder,
            estimator: SignalDelayEstimator::new(EstimatorConfig::from(&config)),
            config,
            bind_ip,
            transfer_port,
            events: None,
        }
    }

    /// 失败阶段通知
    pub fn with_events(mut self, events: broadcast::Sender<SyncEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn estimator(&self) -> &SignalDelayEstimator {
        &self.estimator
    }

    /// 执行一次完整的信号同步
    ///
    /// # Errors
    /// 见 [`ImuSyncError`]；[`ImuSyncError::phase`] 给出失败阶段
    #[instrument(name = "imu_sync", skip(self), fields(client = %client))]
    pub async fn run(&self, client: ClientAddress) -> Result<SyncResult, ImuSyncError> {
        if client.ip().is_unspecified() {
            return Err(ImuSyncError::UnroutableClient { client });
        }

        // bound before the client is told to record, so its upload always finds us
        let addr = SocketAddr::new(self.bind_ip, self.transfer_port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ImuSyncError::Listen { addr, source })?;

        let session = session_tag();
        self.control
            .send_rpc(RpcMethod::StartRecording, &session, client)
            .await
            .map_err(ImuSyncError::Control)?;

        let leader_path = self.record_local(&session).await?;
        if let Err(e) = self
            .control
            .send_rpc(RpcMethod::StopRecording, &session, client)
            .await
        {
            debug!(error = %e, "stop recording notification failed");
        }

        let client_path = self.receive_recording(&listener, client).await?;
        let result = self.estimate_offset(client_path, leader_path).await?;
        info!(
            offset_ns = result.offset_ns,
            sync_accuracy_ns = result.sync_accuracy_ns,
            "signal sync complete"
        );
        Ok(result)
    }

    async fn record_local(&self, session: &str) -> Result<PathBuf, ImuSyncError> {
        self.recorder
            .start_recording(session)
            .map_err(ImuSyncError::Recorder)?;
        let _guard = RecordingGuard {
            recorder: &*self.recorder,
        };

        tokio::time::sleep(self.config.recording_window()).await;
        self.recorder.stop_recording().map_err(ImuSyncError::Recorder)
    }

    /// 等待 client 上传；来自其他地址的连接被忽略
    async fn receive_recording(
        &self,
        listener: &TcpListener,
        client: ClientAddress,
    ) -> Result<PathBuf, ImuSyncError> {
        let deadline = tokio::time::Instant::now() + self.config.transfer_timeout();
        loop {
            let (mut stream, peer) = tokio::time::timeout_at(deadline, listener.accept())
                .await
                .map_err(|_| ImuSyncError::TransferTimeout { client })?
                .map_err(ImuSyncError::Accept)?;

            if peer.ip() != client.ip() {
                warn!(peer = %peer, "ignoring upload from unexpected peer");
                continue;
            }

            let path =
                receive_file(&mut stream, &self.config.recordings_dir, CLIENT_RECORDING_NAME)
                    .await?;
            debug!(path = %path.display(), "client recording received");
            return Ok(path);
        }
    }

    async fn estimate_offset(
        &self,
        client_path: PathBuf,
        leader_path: PathBuf,
    ) -> Result<SyncResult, ImuSyncError> {
        let estimator = self.estimator.clone();
        tokio::task::spawn_blocking(move || {
            let client = read_signal_csv(&client_path)?;
            let leader = read_signal_csv(&leader_path)?;
            offset_from_recordings(&estimator, client, leader)
        })
        .await?
    }
}

/// Leader 与 client 录制的比对结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordingComparison {
    /// `second` (leader) 相对 `first` (client) 的延迟
    pub estimate: DelayEstimate,
    /// `mean(t_leader[i] - t_client[i])` (秒)
    pub mean_diff_seconds: f64,
    /// 截断后的公共样本数
    pub samples: usize,
}

impl RecordingComparison {
    /// `client - leader`，与 exchange 的 offset 同号
    pub fn offset_seconds(&self) -> f64 {
        -(self.mean_diff_seconds + self.estimate.delay_seconds)
    }

    pub fn to_result(&self) -> SyncResult {
        SyncResult::success(
            (self.offset_seconds() * 1e9).round() as i64,
            (self.estimate.step_seconds * 1e9).round() as i64,
        )
    }
}

/// 两段录制截断到相同长度后比对 (client 为第一条轨迹)
///
/// 无法估计延迟时返回 `None`。
pub fn compare_recordings(
    estimator: &SignalDelayEstimator,
    mut client: SignalSeries,
    mut leader: SignalSeries,
) -> Option<RecordingComparison> {
    let samples = client.len().min(leader.len());
    client.truncate(samples);
    leader.truncate(samples);

    let estimate = estimator.estimate(&client, &leader)?;
    let mean_diff_seconds = leader
        .timestamps()
        .iter()
        .zip(client.timestamps())
        .map(|(l, c)| l - c)
        .sum::<f64>()
        / samples as f64;

    debug!(
        mean_diff_seconds,
        delay_seconds = estimate.delay_seconds,
        "recordings compared"
    );
    Some(RecordingComparison {
        estimate,
        mean_diff_seconds,
        samples,
    })
}

fn offset_from_recordings(
    estimator: &SignalDelayEstimator,
    client: SignalSeries,
    leader: SignalSeries,
) -> Result<SyncResult, ImuSyncError> {
    let (client_len, leader_len) = (client.len(), leader.len());
    compare_recordings(estimator, client, leader)
        .map(|comparison| comparison.to_result())
        .ok_or(ImuSyncError::NoEstimate {
            client: client_len,
            leader: leader_len,
        })
}

impl<T, R> TimeSyncEngine for ImuSyncEngine<T, R>
where
    T: RpcSender + Sync,
    R: GyroRecorder + ?Sized,
{
    fn name(&self) -> &str {
        "imu"
    }

    async fn synchronize(&self, client: ClientAddress) -> SyncResult {
        let started = Instant::now();
        let result = match self.run(client).await {
            Ok(result) => result,
            Err(e) => {
                let phase = e.phase();
                warn!(client = %client, error = %e, "{}", phase.message());
                if let Some(events) = &self.events {
                    // no subscribers is fine
                    let _ = events.send(SyncEvent::Failed { client, phase });
                }
                SyncResult::failure()
            }
        };
        record_sync_result(self.name(), &client, &result, started.elapsed());
        result
    }
}
