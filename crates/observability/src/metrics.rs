//! 时钟同步指标收集模块
//!
//! 记录 exchange 轮次、同步结果、信号延迟估计，并在内存中聚合每个 client 的 offset 统计。

use std::collections::BTreeMap;
use std::time::Duration;

use contracts::{ClientAddress, DelayEstimate, SyncResult};
use metrics::{counter, gauge, histogram};

/// 单轮 exchange 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeRoundOutcome {
    /// 有效轮次
    Valid,
    /// 接收超时
    Timeout,
    /// 长度错误
    Corrupted,
    /// `t0` 不匹配 (过期应答)
    OutOfOrder,
}

impl ExchangeRoundOutcome {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Timeout => "timeout",
            Self::Corrupted => "corrupted",
            Self::OutOfOrder => "out_of_order",
        }
    }
}

/// 记录一轮 exchange
pub fn record_exchange_round(outcome: ExchangeRoundOutcome, latency_ns: Option<i64>) {
    counter!("sync_exchange_rounds_total", "outcome" => outcome.as_str()).increment(1);
    if outcome == ExchangeRoundOutcome::Timeout {
        counter!("sync_exchange_missing_total").increment(1);
    }
    if let Some(latency) = latency_ns {
        histogram!("sync_exchange_latency_us").record(latency as f64 / 1_000.0);
    }
}

/// 记录一次同步结果
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_sync_result;
///
/// let started = Instant::now();
/// let result = engine.synchronize(client).await;
/// record_sync_result(engine.name(), &client, &result, started.elapsed());
/// ```
pub fn record_sync_result(
    engine: &str,
    client: &ClientAddress,
    result: &SyncResult,
    elapsed: Duration,
) {
    let outcome = if result.success { "success" } else { "failure" };
    counter!(
        "sync_results_total",
        "engine" => engine.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("sync_duration_seconds", "engine" => engine.to_string())
        .record(elapsed.as_secs_f64());

    if result.success {
        gauge!("sync_offset_ns", "client" => client.to_string()).set(result.offset_ns as f64);
        gauge!("sync_accuracy_ns", "client" => client.to_string())
            .set(result.sync_accuracy_ns as f64);
    }
}

/// 记录 submit 结果 (queued / already_pending / closed)
pub fn record_submit(outcome: &'static str) {
    counter!("sync_submit_total", "outcome" => outcome).increment(1);
}

/// 记录信号延迟估计
pub fn record_delay_estimate(estimate: Option<&DelayEstimate>) {
    match estimate {
        Some(estimate) => {
            counter!("sync_delay_estimates_total", "outcome" => "estimated").increment(1);
            histogram!("sync_delay_estimate_ms").record(estimate.delay_seconds.abs() * 1000.0);
        }
        None => {
            counter!("sync_delay_estimates_total", "outcome" => "no_estimate").increment(1);
        }
    }
}

/// 同步结果聚合器
///
/// 在内存中按 client 聚合 offset / accuracy，便于输出摘要。
#[derive(Debug, Clone, Default)]
pub struct SyncStatsAggregator {
    clients: BTreeMap<ClientAddress, ClientStats>,
}

#[derive(Debug, Clone, Default)]
struct ClientStats {
    attempts: u64,
    failures: u64,
    last_offset_ns: Option<i64>,
    /// offset (ms)
    offset: RunningStats,
    /// accuracy (ms)
    accuracy: RunningStats,
}

impl SyncStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, client: ClientAddress, result: &SyncResult) {
        let stats = self.clients.entry(client).or_default();
        stats.attempts += 1;
        if result.success {
            stats.last_offset_ns = Some(result.offset_ns);
            stats.offset.push(result.offset_ns as f64 / 1e6);
            stats.accuracy.push(result.sync_accuracy_ns as f64 / 1e6);
        } else {
            stats.failures += 1;
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> SyncSummary {
        let clients = self
            .clients
            .iter()
            .map(|(address, stats)| ClientSummary {
                address: *address,
                attempts: stats.attempts,
                failures: stats.failures,
                last_offset_ns: stats.last_offset_ns,
                offset_ms: StatsSummary::from(&stats.offset),
                accuracy_ms: StatsSummary::from(&stats.accuracy),
            })
            .collect::<Vec<_>>();

        let total_attempts = clients.iter().map(|c| c.attempts).sum();
        let total_failures = clients.iter().map(|c| c.failures).sum();
        SyncSummary {
            total_attempts,
            total_failures,
            clients,
        }
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    pub total_attempts: u64,
    pub total_failures: u64,
    pub clients: Vec<ClientSummary>,
}

impl SyncSummary {
    /// 失败率 (%)
    pub fn failure_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            self.total_failures as f64 / self.total_attempts as f64 * 100.0
        }
    }
}

/// 单个 client 的摘要
#[derive(Debug, Clone)]
pub struct ClientSummary {
    pub address: ClientAddress,
    pub attempts: u64,
    pub failures: u64,
    pub last_offset_ns: Option<i64>,
    pub offset_ms: StatsSummary,
    pub accuracy_ms: StatsSummary,
}

impl std::fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Clock Sync Summary ===")?;
        writeln!(
            f,
            "Attempts: {} (failed: {}, {:.2}%)",
            self.total_attempts,
            self.total_failures,
            self.failure_rate()
        )?;
        for client in &self.clients {
            writeln!(f, "Client {}:", client.address)?;
            match client.last_offset_ns {
                Some(offset) => writeln!(f, "  Last offset: {offset} ns")?,
                None => writeln!(f, "  Last offset: never synced")?,
            }
            writeln!(f, "  Offset (ms): {}", client.offset_ms)?;
            writeln!(f, "  Accuracy (ms): {}", client.accuracy_ms)?;
        }
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
