//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 回环 e2e 测试：leader 引擎对真实 client 组件

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{RpcMethod, SyncConfig, SyncResult};

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = SyncResult::failure();
    }

    #[test]
    fn test_method_codes_are_stable() {
        assert_eq!(RpcMethod::OffsetUpdate.code(), 3);
        assert_eq!(RpcMethod::StartRecording.code(), 4);
        assert_eq!(RpcMethod::StopRecording.code(), 5);
    }

    #[test]
    fn test_empty_toml_is_default_config() {
        let config = ConfigLoader::load_from_str("", ConfigFormat::Toml).unwrap();
        assert_eq!(config, SyncConfig::default());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{
        ClientAddress, Clock, ExchangeConfig, ImuSyncConfig, LeaderAlignedClock, MonotonicClock,
        ShutdownFlag, SignalSeries, SyncEvent, SyncResult, TimeSyncEngine,
    };
    use ingestion::{write_signal_csv, ReplayGyroRecorder};
    use sync_engine::{
        ClockExchangeEngine, ImuSyncEngine, InMemoryClientRegistry, ShutdownOutcome, SyncScheduler,
    };
    use tokio::net::UdpSocket;
    use transport::{
        ControlListener, ControlListenerConfig, ExchangeResponder, UdpExchangeSocket, UdpRpcSender,
    };

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
    const DT: f64 = 0.004;

    fn localhost() -> ClientAddress {
        ClientAddress::new(LOCALHOST)
    }

    fn any_port() -> SocketAddr {
        SocketAddr::new(LOCALHOST, 0)
    }

    fn free_tcp_port() -> u16 {
        std::net::TcpListener::bind(any_port())
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    /// Shares one time base with the leader, shifted by a fixed skew
    struct SkewedClock {
        base: Arc<MonotonicClock>,
        skew_ns: i64,
    }

    impl Clock for SkewedClock {
        fn read(&self) -> i64 {
            self.base.read() + self.skew_ns
        }
    }

    struct FixedEngine(SyncResult);

    impl TimeSyncEngine for FixedEngine {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn synchronize(&self, _client: ClientAddress) -> SyncResult {
            self.0
        }
    }

    fn bump(x: f64, center: f64, width: f64) -> f64 {
        (-((x - center) / width).powi(2)).exp()
    }

    /// Three axes of a short shake, `lag` samples late
    fn write_trace(path: &Path, start: f64, lag: f64) {
        let mut series = SignalSeries::new();
        for n in 0..480 {
            let x = n as f64 - lag;
            series.push(
                start + n as f64 * DT,
                [
                    1.5 * bump(x, 160.0, 10.0),
                    -bump(x, 230.0, 18.0),
                    0.8 * bump(x, 300.0, 7.0),
                ],
            );
        }
        write_signal_csv(path, &series).unwrap();
    }

    async fn wait_for_offset<C: Clock>(clock: &LeaderAlignedClock<C>, expected: i64) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while clock.offset_ns() != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("client clock was not updated");
    }

    /// Exchange engine against a real responder whose clock runs 3 s ahead
    #[tokio::test]
    async fn test_e2e_exchange_over_loopback() {
        let base = Arc::new(MonotonicClock::new());
        let skew_ns = 3_000_000_000;
        let shutdown = ShutdownFlag::new();

        let responder = ExchangeResponder::bind(
            any_port(),
            SkewedClock {
                base: base.clone(),
                skew_ns,
            },
            shutdown.clone(),
        )
        .await
        .unwrap();
        let port = responder.local_addr().unwrap().port();
        let responder_metrics = responder.metrics();
        let responder_handle = tokio::spawn(responder.run());

        let config = ExchangeConfig {
            num_cycles: 20,
            socket_timeout_ms: 200,
            ..Default::default()
        };
        let engine = ClockExchangeEngine::new(
            UdpExchangeSocket::bind(any_port()).await.unwrap(),
            base.clone(),
            config,
            port,
        );

        let result = engine.synchronize(localhost()).await;
        assert!(result.success);
        assert!(
            (result.offset_ns - skew_ns).abs() < 5_000_000,
            "offset {}",
            result.offset_ns
        );
        assert!(result.sync_accuracy_ns >= 0);
        assert!(responder_metrics.snapshot().handled >= 1);

        // client side: leader time = local - offset
        let aligned = LeaderAlignedClock::new(SkewedClock {
            base: base.clone(),
            skew_ns,
        });
        aligned.set_offset_ns(result.offset_ns);
        assert!((aligned.read() - base.read()).abs() < 5_000_000);

        shutdown.trigger();
        responder_handle.await.unwrap().unwrap();
    }

    /// Replies never arrive; the missing budget ends the exchange
    #[tokio::test]
    async fn test_e2e_exchange_silent_client_fails() {
        let silent = UdpSocket::bind(any_port()).await.unwrap();
        let port = silent.local_addr().unwrap().port();

        let config = ExchangeConfig {
            num_cycles: 10,
            socket_timeout_ms: 20,
            missing_message_budget: 3,
            ..Default::default()
        };
        let engine = ClockExchangeEngine::new(
            UdpExchangeSocket::bind(any_port()).await.unwrap(),
            MonotonicClock::new(),
            config,
            port,
        );

        let started = std::time::Instant::now();
        let result = engine.synchronize(localhost()).await;
        assert_eq!(result, SyncResult::failure());
        assert!(started.elapsed() < Duration::from_millis(150));
    }

    /// Scheduler pushes the aligned offset to a real control listener
    #[tokio::test]
    async fn test_e2e_scheduler_updates_client_clock() {
        let shutdown = ShutdownFlag::new();
        let clock = Arc::new(LeaderAlignedClock::new(MonotonicClock::new()));
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(ReplayGyroRecorder::new(dir.path().join("unused.csv"), dir.path()));

        let listener = ControlListener::new(
            UdpSocket::bind(any_port()).await.unwrap(),
            recorder,
            clock.clone(),
            ControlListenerConfig {
                poll_interval: Duration::from_millis(20),
                ..Default::default()
            },
            shutdown.clone(),
        );
        let rpc_port = listener.local_addr().unwrap().port();
        let listener_handle = tokio::spawn(listener.run());

        let registry = Arc::new(InMemoryClientRegistry::with_clients([localhost()]));
        registry.set_leader_epoch_offset_ns(100);
        let rpc = Arc::new(UdpRpcSender::bind(any_port(), rpc_port).await.unwrap());
        let scheduler = SyncScheduler::spawn(
            FixedEngine(SyncResult::success(1_234, 10)),
            registry.clone(),
            rpc,
            Duration::from_millis(500),
        );
        let mut events = scheduler.subscribe();

        scheduler.submit(localhost());

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            SyncEvent::OffsetUpdated {
                client: localhost(),
                aligned_offset_ns: 1_334,
                sync_accuracy_ns: 10,
            }
        );
        wait_for_offset(&clock, 1_334).await;

        let record = registry.get(&localhost()).unwrap();
        assert_eq!(record.last_offset_ns, 1_234);
        assert_eq!(record.sync_count, 1);

        assert_eq!(scheduler.close().await, ShutdownOutcome::Clean);
        shutdown.trigger();
        listener_handle.await.unwrap().unwrap();
    }

    /// Full signal path: record, upload over TCP, estimate, push offset
    #[tokio::test]
    async fn test_e2e_signal_sync_over_loopback() {
        let dir = tempfile::tempdir().unwrap();
        let client_file = dir.path().join("client_source.csv");
        let leader_file = dir.path().join("leader_source.csv");
        write_trace(&client_file, 100.0, 0.0);
        write_trace(&leader_file, 100.5, 6.0);

        let transfer_port = free_tcp_port();
        let shutdown = ShutdownFlag::new();
        let clock = Arc::new(LeaderAlignedClock::new(MonotonicClock::new()));
        let listener = ControlListener::new(
            UdpSocket::bind(any_port()).await.unwrap(),
            Arc::new(
                ReplayGyroRecorder::new(&client_file, dir.path().join("client"))
                    .with_prefix("gyro_client"),
            ),
            clock.clone(),
            ControlListenerConfig {
                recording_window: Duration::from_millis(20),
                transfer_port,
                poll_interval: Duration::from_millis(20),
            },
            shutdown.clone(),
        );
        let control_port = listener.local_addr().unwrap().port();
        let listener_metrics = listener.metrics();
        let listener_handle = tokio::spawn(listener.run());

        let engine = ImuSyncEngine::new(
            UdpRpcSender::bind(any_port(), control_port).await.unwrap(),
            Arc::new(
                ReplayGyroRecorder::new(&leader_file, dir.path().join("leader"))
                    .with_prefix("gyro_leader"),
            ),
            ImuSyncConfig {
                resample: false,
                recording_window_ms: 20,
                transfer_timeout_ms: 2_000,
                recordings_dir: dir.path().join("received"),
                ..Default::default()
            },
            LOCALHOST,
            transfer_port,
        );

        let registry = Arc::new(InMemoryClientRegistry::with_clients([localhost()]));
        let rpc = Arc::new(UdpRpcSender::bind(any_port(), control_port).await.unwrap());
        let scheduler = SyncScheduler::spawn(engine, registry.clone(), rpc, Duration::from_secs(1));
        let mut events = scheduler.subscribe();

        scheduler.submit(localhost());

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        let SyncEvent::OffsetUpdated {
            aligned_offset_ns, ..
        } = event
        else {
            panic!("unexpected event {event:?}");
        };

        let expected = (-(0.5 + 6.0 * DT) * 1e9) as i64;
        assert!(
            (aligned_offset_ns - expected).abs() < (0.05 * DT * 1e9) as i64,
            "offset {aligned_offset_ns} expected {expected}"
        );
        wait_for_offset(&clock, aligned_offset_ns).await;
        assert!(dir.path().join("received").join(sync_engine::CLIENT_RECORDING_NAME).is_file());
        assert!(registry.get(&localhost()).unwrap().is_synced());

        assert_eq!(scheduler.close().await, ShutdownOutcome::Clean);
        shutdown.trigger();
        listener_handle.await.unwrap().unwrap();
        // start, stop and offset update
        assert_eq!(listener_metrics.snapshot().handled, 3);
    }
}
