//! Mock 陀螺仪录制器
//!
//! 用于无真实传感器环境的测试和演示：后台线程按固定频率采样一个
//! 共享的运动曲线，并用设备自己的时钟打时间戳。

use std::f64::consts::TAU;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::{Clock, ContractError, GyroRecorder};
use metrics::counter;
use tracing::{debug, info};

use crate::csv::GyroCsvWriter;
use crate::error::{IngestionError, Result};

/// 设备晃动曲线
///
/// 同一进程内的多个录制器共享一个实例时，它们观测到同一段物理运动。
#[derive(Debug, Clone, Copy)]
pub struct MotionProfile {
    origin: Instant,
}

impl MotionProfile {
    pub fn new(origin: Instant) -> Self {
        Self { origin }
    }

    /// 某一时刻的三轴角速度 (rad/s)
    pub fn sample(&self, at: Instant) -> [f64; 3] {
        let t = at.saturating_duration_since(self.origin).as_secs_f64();
        Self::at_seconds(t)
    }

    /// 以 origin 为零点的运动曲线 (非周期，便于互相关唯一定位)
    pub fn at_seconds(t: f64) -> [f64; 3] {
        let envelope = 0.6 + 0.4 * (TAU * 0.13 * t).sin();
        [
            envelope * (TAU * 1.7 * t).sin() + 0.3 * (TAU * 4.1 * t).sin(),
            envelope * (TAU * 2.3 * t + 0.7).sin() - 0.2 * (TAU * 0.37 * t).cos(),
            0.5 * (TAU * 0.9 * t + 1.3).sin() * (TAU * 0.21 * t).cos(),
        ]
    }
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

/// Mock 录制器配置
#[derive(Debug, Clone)]
pub struct MockGyroConfig {
    /// 采样频率 (Hz)
    pub frequency_hz: f64,

    /// 输出目录
    pub output_dir: PathBuf,

    /// 文件名前缀
    pub file_prefix: String,
}

impl Default for MockGyroConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 200.0,
            output_dir: PathBuf::from("local_sensors"),
            file_prefix: "gyro".to_string(),
        }
    }
}

struct ActiveRecording {
    session: String,
    running: Arc<AtomicBool>,
    handle: JoinHandle<Result<PathBuf>>,
}

/// Mock 陀螺仪录制器
pub struct MockGyroRecorder {
    config: MockGyroConfig,
    clock: Arc<dyn Clock>,
    motion: MotionProfile,
    active: Mutex<Option<ActiveRecording>>,
}

impl MockGyroRecorder {
    pub fn new(config: MockGyroConfig, clock: Arc<dyn Clock>, motion: MotionProfile) -> Self {
        Self {
            config,
            clock,
            motion,
            active: Mutex::new(None),
        }
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveRecording>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, session: &str) -> Result<()> {
        let mut active = self.active();
        if let Some(current) = active.as_ref() {
            return Err(IngestionError::AlreadyRecording {
                session: current.session.clone(),
            });
        }

        fs::create_dir_all(&self.config.output_dir)?;
        let path = self
            .config
            .output_dir
            .join(format!("{}_{}.csv", self.config.file_prefix, session));
        let mut writer = GyroCsvWriter::create(&path)?;

        let running = Arc::new(AtomicBool::new(true));
        let interval = Duration::from_secs_f64(1.0 / self.config.frequency_hz.max(1.0));
        let clock = self.clock.clone();
        let motion = self.motion;
        let flag = running.clone();
        let session_name = session.to_string();

        let handle = thread::spawn(move || {
            debug!(session = %session_name, "mock gyro recording started");
            while flag.load(Ordering::Relaxed) {
                let t_ns = clock.read();
                writer.write_row(motion.sample(Instant::now()), t_ns)?;
                thread::sleep(interval);
            }
            let rows = writer.rows();
            writer.finish()?;
            debug!(session = %session_name, rows, "mock gyro recording finished");
            Ok(path)
        });

        *active = Some(ActiveRecording {
            session: session.to_string(),
            running,
            handle,
        });
        Ok(())
    }

    fn end(&self) -> Result<PathBuf> {
        let recording = self.active().take().ok_or(IngestionError::NotRecording)?;
        recording.running.store(false, Ordering::SeqCst);

        let path = recording
            .handle
            .join()
            .map_err(|_| IngestionError::RecorderPanicked {
                session: recording.session.clone(),
            })??;

        counter!("gyro_recordings_total", "recorder" => "mock").increment(1);
        info!(session = %recording.session, path = %path.display(), "gyro recording saved");
        Ok(path)
    }
}

impl GyroRecorder for MockGyroRecorder {
    fn start_recording(&self, session: &str) -> std::result::Result<(), ContractError> {
        Ok(self.begin(session)?)
    }

    fn stop_recording(&self) -> std::result::Result<PathBuf, ContractError> {
        Ok(self.end()?)
    }

    fn is_recording(&self) -> bool {
        self.active().is_some()
    }
}
