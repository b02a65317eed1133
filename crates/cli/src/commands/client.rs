//! `client` command implementation.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use contracts::{Clock, GyroRecorder, LeaderAlignedClock, MonotonicClock, ShutdownFlag};
use ingestion::{MockGyroConfig, MockGyroRecorder, MotionProfile, ReplayGyroRecorder};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use transport::{ControlListener, ControlListenerConfig, ExchangeResponder, TransportError};

use super::{load_config, shutdown_signal};
use crate::cli::ClientArgs;
use crate::error::CliError;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Execute the `client` command
pub async fn run_client(args: &ClientArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;
    if let Some(bind) = args.bind {
        config.network.bind_address = bind;
    }
    let bind_ip = config.network.bind_address;

    let local = Arc::new(MonotonicClock::new());
    let aligned = Arc::new(LeaderAlignedClock::new(local.clone()));
    let shutdown = ShutdownFlag::new();

    let recorder: Arc<dyn GyroRecorder> = match &args.recording {
        Some(path) => {
            if !path.is_file() {
                anyhow::bail!("Recording not found: {}", path.display());
            }
            Arc::new(
                ReplayGyroRecorder::new(path, config.imu.recordings_dir.clone())
                    .with_prefix("gyro_client"),
            )
        }
        None => {
            let clock: Arc<dyn Clock> = local.clone();
            Arc::new(MockGyroRecorder::new(
                MockGyroConfig {
                    frequency_hz: args.mock_rate_hz,
                    output_dir: config.imu.recordings_dir.clone(),
                    file_prefix: "gyro_client".to_string(),
                },
                clock,
                MotionProfile::default(),
            ))
        }
    };

    let exchange_addr = SocketAddr::new(bind_ip, config.network.exchange_port);
    let responder = ExchangeResponder::bind(exchange_addr, local.clone(), shutdown.clone())
        .await
        .map_err(|e| CliError::bind("exchange responder", exchange_addr, e))?;

    let listener_config = ControlListenerConfig {
        recording_window: config.imu.recording_window(),
        transfer_port: config.network.imu_port,
        poll_interval: POLL_INTERVAL,
    };
    let mut tasks: Vec<(&'static str, JoinHandle<Result<(), TransportError>>)> =
        vec![("exchange responder", tokio::spawn(responder.run()))];

    for (name, port) in [
        ("offset listener", config.network.rpc_port),
        ("recording listener", config.network.imu_port),
    ] {
        let addr = SocketAddr::new(bind_ip, port);
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| CliError::bind(name, addr, e))?;
        let listener = ControlListener::new(
            socket,
            recorder.clone(),
            aligned.clone(),
            listener_config.clone(),
            shutdown.clone(),
        );
        tasks.push((name, tokio::spawn(listener.run())));
    }

    info!(
        exchange_port = config.network.exchange_port,
        rpc_port = config.network.rpc_port,
        imu_port = config.network.imu_port,
        "Client started"
    );

    shutdown_signal().await;
    warn!("Received shutdown signal, stopping client...");
    shutdown.trigger();

    for (name, task) in tasks {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(task = name, error = %e, "Task failed"),
            Err(e) => error!(task = name, error = ?e, "Task panicked"),
        }
    }

    info!(offset_ns = aligned.offset_ns(), "Client stopped");
    Ok(())
}
