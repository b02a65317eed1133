//! `leader` command implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use contracts::{
    Clock, GyroRecorder, MonotonicClock, ShutdownFlag, SyncConfig, SyncEvent, SyncResult,
    SyncStrategy,
};
use ingestion::{MockGyroConfig, MockGyroRecorder, MotionProfile, ReplayGyroRecorder};
use observability::SyncStatsAggregator;
use serde_json::json;
use sync_engine::{
    ClockExchangeEngine, ImuSyncEngine, InMemoryClientRegistry, ShutdownOutcome, SyncScheduler,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use transport::{UdpExchangeSocket, UdpRpcSender};

use super::{load_config, shutdown_signal};
use crate::cli::LeaderArgs;
use crate::error::CliError;

const EVENT_CAPACITY: usize = 64;

/// Execute the `leader` command
pub async fn run_leader(args: &LeaderArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, args);
    config_loader::ConfigLoader::validate(&config)
        .map_err(|e| CliError::config_validation(e.to_string()))?;
    if config.clients.is_empty() {
        return Err(CliError::NoClients.into());
    }

    let bind_ip = config.network.bind_address;
    let registry = Arc::new(InMemoryClientRegistry::with_clients(
        config.clients.iter().copied(),
    ));
    let rpc_addr = SocketAddr::new(bind_ip, 0);
    let rpc = Arc::new(
        UdpRpcSender::bind(rpc_addr, config.network.rpc_port)
            .await
            .map_err(|e| CliError::bind("rpc sender", rpc_addr, e))?,
    );

    let shutdown = ShutdownFlag::new();
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    let scheduler = spawn_scheduler(&config, args, registry.clone(), rpc, &shutdown, &events).await?;

    info!(
        engine = scheduler.engine_name(),
        clients = registry.len(),
        heartbeat = ?config.scheduler.heartbeat_interval(),
        "Leader started"
    );

    let stats = heartbeat_loop(&scheduler, &registry, &config, args).await;

    shutdown.trigger();
    match scheduler.close().await {
        ShutdownOutcome::Clean => info!("Scheduler closed"),
        ShutdownOutcome::TimedOut => warn!("Scheduler closed with sync tasks still running"),
    }

    println!("{}", stats.summary());
    for record in registry.snapshot() {
        info!(
            client = %record.address,
            offset_ns = record.last_offset_ns,
            accuracy_ns = record.last_accuracy_ns,
            syncs = record.sync_count,
            "Final client state"
        );
    }
    Ok(())
}

fn apply_overrides(config: &mut SyncConfig, args: &LeaderArgs) {
    if let Some(strategy) = args.strategy {
        info!(strategy = ?strategy, "Overriding sync strategy from CLI");
        config.scheduler.strategy = strategy.into();
    }
    if let Some(bind) = args.bind {
        config.network.bind_address = bind;
    }
    for client in &args.clients {
        if !config.clients.contains(client) {
            config.clients.push(*client);
        }
    }
}

async fn spawn_scheduler(
    config: &SyncConfig,
    args: &LeaderArgs,
    registry: Arc<InMemoryClientRegistry>,
    rpc: Arc<UdpRpcSender>,
    shutdown: &ShutdownFlag,
    events: &broadcast::Sender<SyncEvent>,
) -> Result<SyncScheduler> {
    let bind_ip = config.network.bind_address;
    let grace = config.scheduler.shutdown_grace();
    let local = SocketAddr::new(bind_ip, 0);

    let scheduler = match config.scheduler.strategy {
        SyncStrategy::Exchange => {
            let socket = UdpExchangeSocket::bind(local)
                .await
                .map_err(|e| CliError::bind("exchange socket", local, e))?;
            let engine = ClockExchangeEngine::new(
                socket,
                MonotonicClock::new(),
                config.exchange.clone(),
                config.network.exchange_port,
            )
            .with_shutdown(shutdown.clone());
            SyncScheduler::spawn_with_events(engine, registry, rpc, grace, events.clone())
        }
        SyncStrategy::Imu => {
            let control = UdpRpcSender::bind(local, config.network.imu_port)
                .await
                .map_err(|e| CliError::bind("recording control sender", local, e))?;
            let recorder = leader_recorder(config, args)?;
            let engine = ImuSyncEngine::new(
                control,
                recorder,
                config.imu.clone(),
                bind_ip,
                config.network.imu_port,
            )
            .with_events(events.clone());
            SyncScheduler::spawn_with_events(engine, registry, rpc, grace, events.clone())
        }
    };
    Ok(scheduler)
}

fn leader_recorder(config: &SyncConfig, args: &LeaderArgs) -> Result<Arc<dyn GyroRecorder>> {
    let output_dir = config.imu.recordings_dir.clone();
    let recorder: Arc<dyn GyroRecorder> = match &args.recording {
        Some(path) => {
            if !path.is_file() {
                anyhow::bail!("Recording not found: {}", path.display());
            }
            Arc::new(ReplayGyroRecorder::new(path, output_dir).with_prefix("gyro_leader"))
        }
        None => {
            let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
            Arc::new(MockGyroRecorder::new(
                MockGyroConfig {
                    output_dir,
                    file_prefix: "gyro_leader".to_string(),
                    ..Default::default()
                },
                clock,
                MotionProfile::default(),
            ))
        }
    };
    Ok(recorder)
}

/// Submit every client each heartbeat until a signal or the heartbeat limit
async fn heartbeat_loop(
    scheduler: &SyncScheduler,
    registry: &InMemoryClientRegistry,
    config: &SyncConfig,
    args: &LeaderArgs,
) -> SyncStatsAggregator {
    let mut stats = SyncStatsAggregator::new();
    let mut events = scheduler.subscribe();
    let mut heartbeat = tokio::time::interval(config.scheduler.heartbeat_interval());
    let mut beats = 0u64;

    let signal = shutdown_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if args.heartbeats > 0 && beats >= args.heartbeats {
                    if scheduler.pending_len() == 0 {
                        info!(beats, "Heartbeat limit reached");
                        break;
                    }
                    continue;
                }
                beats += 1;
                for record in registry.snapshot() {
                    scheduler.submit(record.address);
                }
            }
            event = events.recv() => match event {
                Ok(event) => {
                    report_event(&event, args.json);
                    match event {
                        SyncEvent::OffsetUpdated { client, aligned_offset_ns, sync_accuracy_ns } => {
                            stats.update(client, &SyncResult::success(aligned_offset_ns, sync_accuracy_ns));
                        }
                        SyncEvent::Failed { client, .. } => {
                            stats.update(client, &SyncResult::failure());
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Sync events dropped"),
                Err(RecvError::Closed) => break,
            },
            _ = &mut signal => {
                warn!("Received shutdown signal, stopping leader...");
                break;
            }
        }
    }
    stats
}

fn report_event(event: &SyncEvent, as_json: bool) {
    if as_json {
        let line = match event {
            SyncEvent::OffsetUpdated {
                client,
                aligned_offset_ns,
                sync_accuracy_ns,
            } => json!({
                "event": "offset_updated",
                "client": client,
                "aligned_offset_ns": aligned_offset_ns,
                "sync_accuracy_ns": sync_accuracy_ns,
            }),
            SyncEvent::Failed { client, phase } => json!({
                "event": "failed",
                "client": client,
                "phase": phase,
                "message": phase.message(),
            }),
        };
        println!("{line}");
        return;
    }

    match event {
        SyncEvent::OffsetUpdated {
            client,
            aligned_offset_ns,
            sync_accuracy_ns,
        } => println!(
            "✓ {client}: offset {aligned_offset_ns} ns (±{:.3} ms)",
            *sync_accuracy_ns as f64 / 1e6
        ),
        SyncEvent::Failed { client, phase } => println!("✗ {client}: {phase}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;
    use std::path::PathBuf;

    use crate::cli::StrategyArg;

    fn args() -> LeaderArgs {
        LeaderArgs {
            config: PathBuf::from("config.toml"),
            strategy: None,
            clients: Vec::new(),
            bind: None,
            heartbeats: 0,
            recording: None,
            json: false,
        }
    }

    #[test]
    fn test_overrides_merge_clients_and_strategy() {
        let mut config = SyncConfig {
            clients: vec!["10.0.0.2".parse().unwrap()],
            ..Default::default()
        };
        let mut args = args();
        args.strategy = Some(StrategyArg::Imu);
        args.clients = vec!["10.0.0.2".parse().unwrap(), "10.0.0.3".parse().unwrap()];
        args.bind = Some(IpAddr::from([127, 0, 0, 1]));

        apply_overrides(&mut config, &args);

        assert_eq!(config.scheduler.strategy, SyncStrategy::Imu);
        assert_eq!(config.clients.len(), 2);
        assert_eq!(config.network.bind_address, IpAddr::from([127, 0, 0, 1]));
    }

    #[test]
    fn test_missing_replay_recording_is_rejected() {
        let mut args = args();
        args.recording = Some(PathBuf::from("/nonexistent/gyro.csv"));
        assert!(leader_recorder(&SyncConfig::default(), &args).is_err());
    }
}
