//! SyncScheduler - per-client deduplicated sync queue
//!
//! `submit` 只做去重与入队，立即返回；单个 worker 顺序执行同步任务，
//! 因此同一 engine 实例上不会并发 exchange。

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use contracts::{
    ClientAddress, ClientRegistry, RpcMethod, RpcSender, SyncEvent, SyncResult, TimeSyncEngine,
};
use observability::metrics::record_submit;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// 事件通道容量
const EVENT_CAPACITY: usize = 64;

/// 正在排队或执行中的 client 集合
///
/// 所有修改都经过同一把锁。
#[derive(Debug, Clone, Default)]
pub struct PendingSet {
    inner: Arc<Mutex<HashSet<ClientAddress>>>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入 client；已存在时返回 `false`
    pub fn try_acquire(&self, client: ClientAddress) -> bool {
        self.lock().insert(client)
    }

    pub fn release(&self, client: &ClientAddress) -> bool {
        self.lock().remove(client)
    }

    pub fn contains(&self, client: &ClientAddress) -> bool {
        self.lock().contains(client)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<ClientAddress>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Queued,
    /// 同一 client 已在队列或执行中
    AlreadyPending,
    /// Scheduler 已关闭
    Closed,
}

impl SubmitOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::AlreadyPending => "already_pending",
            Self::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// 所有任务在宽限期内完成
    Clean,
    /// 宽限期结束时仍有任务在执行，已放弃等待
    TimedOut,
}

/// 同步调度器
pub struct SyncScheduler {
    engine_name: String,
    tx: Mutex<Option<mpsc::UnboundedSender<ClientAddress>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    pending: PendingSet,
    events: broadcast::Sender<SyncEvent>,
    grace: Duration,
}

impl SyncScheduler {
    /// 创建 scheduler 并启动 worker（需在 tokio runtime 内调用）
    pub fn spawn<E, R, T>(engine: E, registry: Arc<R>, rpc: Arc<T>, grace: Duration) -> Self
    where
        E: TimeSyncEngine + Sync + 'static,
        R: ClientRegistry + ?Sized + 'static,
        T: RpcSender + Sync + 'static,
    {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self::spawn_with_events(engine, registry, rpc, grace, events)
    }

    /// 与 engine 共享事件通道
    pub fn spawn_with_events<E, R, T>(
        engine: E,
        registry: Arc<R>,
        rpc: Arc<T>,
        grace: Duration,
        events: broadcast::Sender<SyncEvent>,
    ) -> Self
    where
        E: TimeSyncEngine + Sync + 'static,
        R: ClientRegistry + ?Sized + 'static,
        T: RpcSender + Sync + 'static,
    {
        let engine_name = engine.name().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = PendingSet::new();

        let worker = tokio::spawn(scheduler_worker(
            Arc::new(engine),
            registry,
            rpc,
            rx,
            pending.clone(),
            events.clone(),
        ));
        info!(engine = %engine_name, "sync scheduler started");

        Self {
            engine_name,
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            pending,
            events,
            grace,
        }
    }

    pub fn engine_name(&self) -> &str {
        &self.engine_name
    }

    /// 请求同步一个 client，立即返回
    pub fn submit(&self, client: ClientAddress) -> SubmitOutcome {
        let outcome = self.enqueue(client);
        record_submit(outcome.as_str());
        match outcome {
            SubmitOutcome::Queued => debug!(client = %client, "sync queued"),
            SubmitOutcome::AlreadyPending => {
                warn!(client = %client, "already queued sync with client, skipping")
            }
            SubmitOutcome::Closed => warn!(client = %client, "scheduler closed, sync dropped"),
        }
        outcome
    }

    fn enqueue(&self, client: ClientAddress) -> SubmitOutcome {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = tx.as_ref() else {
            return SubmitOutcome::Closed;
        };
        if !self.pending.try_acquire(client) {
            return SubmitOutcome::AlreadyPending;
        }
        metrics::gauge!("sync_pending_clients").set(self.pending.len() as f64);
        if tx.send(client).is_err() {
            self.pending.release(&client);
            return SubmitOutcome::Closed;
        }
        SubmitOutcome::Queued
    }

    pub fn is_pending(&self, client: &ClientAddress) -> bool {
        self.pending.contains(client)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// 停止接收新请求，最多等待宽限期让已入队任务完成
    ///
    /// 超时后任务不会被中止，只是不再等待。
    #[instrument(name = "sync_scheduler_close", skip(self), fields(engine = %self.engine_name))]
    pub async fn close(&self) -> ShutdownOutcome {
        drop(self.tx.lock().unwrap_or_else(PoisonError::into_inner).take());
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut worker) = worker else {
            return ShutdownOutcome::Clean;
        };

        match tokio::time::timeout(self.grace, &mut worker).await {
            Ok(Ok(())) => {
                info!("sync scheduler stopped");
                ShutdownOutcome::Clean
            }
            Ok(Err(e)) => {
                error!(error = ?e, "scheduler worker panicked");
                ShutdownOutcome::Clean
            }
            Err(_) => {
                warn!(
                    grace = ?self.grace,
                    pending = self.pending.len(),
                    "sync tasks still running after grace period, abandoning"
                );
                ShutdownOutcome::TimedOut
            }
        }
    }
}

#[instrument(name = "sync_scheduler_worker", skip_all)]
async fn scheduler_worker<E, R, T>(
    engine: Arc<E>,
    registry: Arc<R>,
    rpc: Arc<T>,
    mut rx: mpsc::UnboundedReceiver<ClientAddress>,
    pending: PendingSet,
    events: broadcast::Sender<SyncEvent>,
) where
    E: TimeSyncEngine + Sync + 'static,
    R: ClientRegistry + ?Sized,
    T: RpcSender + Sync,
{
    debug!("scheduler worker started");

    while let Some(client) = rx.recv().await {
        let result = run_sync(&engine, registry.as_ref(), rpc.as_ref(), client).await;

        // unconditional; the next heartbeat retries failures
        pending.release(&client);
        metrics::gauge!("sync_pending_clients").set(pending.len() as f64);

        if let Some((aligned_offset_ns, result)) = result {
            // no subscribers is fine
            let _ = events.send(SyncEvent::OffsetUpdated {
                client,
                aligned_offset_ns,
                sync_accuracy_ns: result.sync_accuracy_ns,
            });
        }
    }

    debug!("scheduler worker stopped");
}

/// 执行一次同步；成功时返回 `(aligned_offset_ns, result)`
#[instrument(name = "sync_task", skip(engine, registry, rpc), fields(client = %client))]
async fn run_sync<E, R, T>(
    engine: &Arc<E>,
    registry: &R,
    rpc: &T,
    client: ClientAddress,
) -> Option<(i64, SyncResult)>
where
    E: TimeSyncEngine + Sync + 'static,
    R: ClientRegistry + ?Sized,
    T: RpcSender + Sync,
{
    if !registry.contains(&client) {
        warn!("client was removed, skipping sync");
        return None;
    }

    // panics stay inside the task
    let task_engine = Arc::clone(engine);
    let result = match tokio::spawn(async move { task_engine.synchronize(client).await }).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = ?e, "sync task panicked");
            SyncResult::failure()
        }
    };
    if !result.success {
        debug!("sync failed");
        return None;
    }

    let aligned = result
        .offset_ns
        .wrapping_add(registry.leader_epoch_offset_ns());
    registry.update_client_offset(&client, &result);

    info!(
        offset_ns = result.offset_ns,
        aligned_offset_ns = aligned,
        sync_accuracy_ns = result.sync_accuracy_ns,
        "sending offset update"
    );
    if let Err(e) = rpc
        .send_rpc(RpcMethod::OffsetUpdate, &aligned.to_string(), client)
        .await
    {
        warn!(error = %e, "offset update delivery failed");
    }

    Some((aligned, result))
}
