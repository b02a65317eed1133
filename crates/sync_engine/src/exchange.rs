//! Clock exchange engine (NTP/PTP-style round trip)
//!
//! 每轮：发送 `t0` → 等待应答 `t0, t1, t2` → 记录 `t3`，保留 latency 最小的一轮。

use std::time::Instant;

use contracts::{
    ClientAddress, Clock, ContractError, ExchangeConfig, ExchangeSample, ExchangeSocket,
    ShutdownFlag, SyncResult, TimeSyncEngine,
};
use observability::metrics::{record_exchange_round, record_sync_result, ExchangeRoundOutcome};
use tracing::{debug, error, instrument, trace, warn};
use transport::{ExchangeReply, ExchangeRequest};

/// 接收缓冲区，大于应答长度以便识别超长报文
const RECV_BUFFER_LEN: usize = 64;

/// Clock exchange engine
///
/// 同一实例上的 exchange 由 scheduler 串行调度。
pub struct ClockExchangeEngine<S, C> {
    socket: S,
    clock: C,
    config: ExchangeConfig,
    /// Client 侧 responder 端口
    client_port: u16,
    shutdown: ShutdownFlag,
}

impl<S, C> ClockExchangeEngine<S, C>
where
    S: ExchangeSocket + Sync,
    C: Clock,
{
    pub fn new(socket: S, clock: C, config: ExchangeConfig, client_port: u16) -> Self {
        Self {
            socket,
            clock,
            config,
            client_port,
            shutdown: ShutdownFlag::new(),
        }
    }

    /// 共享 shutdown flag，用于区分 shutdown 期间的 socket 错误
    pub fn with_shutdown(mut self, shutdown: ShutdownFlag) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// 执行一次完整 exchange
    ///
    /// 超时预算耗尽或没有任何有效轮次时返回 `SyncResult::failure()`。
    ///
    /// # Errors
    /// Socket 发送/接收错误
    #[instrument(name = "clock_exchange", skip(self), fields(client = %client))]
    pub async fn exchange(&self, client: ClientAddress) -> Result<SyncResult, ContractError> {
        let target = client.with_port(self.client_port);
        let timeout = self.config.socket_timeout();
        let mut missing_budget = self.config.missing_message_budget;
        let mut best: Option<ExchangeSample> = None;
        let mut buf = [0u8; RECV_BUFFER_LEN];

        for round in 0..self.config.num_cycles {
            let t0 = self.clock.read();
            self.socket
                .send_to(&ExchangeRequest { t0 }.encode(), target)
                .await?;

            let Some((len, _)) = self.socket.recv_timeout(&mut buf, timeout).await? else {
                record_exchange_round(ExchangeRoundOutcome::Timeout, None);
                missing_budget = missing_budget.saturating_sub(1);
                if missing_budget == 0 {
                    warn!(round, "too many missing exchange replies, aborting");
                    return Ok(SyncResult::failure());
                }
                warn!(round, missing_budget, "exchange reply timed out, skipping round");
                continue;
            };
            let t3 = self.clock.read();

            let reply = match ExchangeReply::decode(&buf[..len]) {
                Ok(reply) => reply,
                Err(e) => {
                    record_exchange_round(ExchangeRoundOutcome::Corrupted, None);
                    warn!(round, error = %e, "corrupted exchange reply, skipping round");
                    continue;
                }
            };

            if reply.t0 != t0 {
                record_exchange_round(ExchangeRoundOutcome::OutOfOrder, None);
                warn!(
                    round,
                    expected = t0,
                    received = reply.t0,
                    "out of order exchange reply, skipping round"
                );
                // Best-effort catch-up read; may swallow the next round's reply
                let _ = self.socket.recv_timeout(&mut buf, timeout).await?;
                continue;
            }

            let sample = ExchangeSample {
                t0,
                t1: reply.t1,
                t2: reply.t2,
                t3,
            };
            let latency = sample.latency_ns();
            record_exchange_round(ExchangeRoundOutcome::Valid, Some(latency));
            trace!(round, offset_ns = sample.offset_ns(), latency_ns = latency, "exchange round");

            if best.is_none_or(|b| latency < b.latency_ns()) {
                best = Some(sample);
                if latency < self.config.min_round_trip_latency_ns {
                    debug!(round, latency_ns = latency, "latency below threshold, stopping early");
                    break;
                }
            }
        }

        Ok(match best {
            Some(sample) => SyncResult::success(sample.offset_ns(), sample.latency_ns()),
            None => {
                warn!("no valid exchange round");
                SyncResult::failure()
            }
        })
    }
}

impl<S, C> TimeSyncEngine for ClockExchangeEngine<S, C>
where
    S: ExchangeSocket + Sync,
    C: Clock,
{
    fn name(&self) -> &str {
        "clock_exchange"
    }

    async fn synchronize(&self, client: ClientAddress) -> SyncResult {
        let started = Instant::now();
        let result = match self.exchange(client).await {
            Ok(result) => result,
            Err(e) if self.shutdown.is_triggered() => {
                debug!(client = %client, error = %e, "exchange interrupted by shutdown");
                SyncResult::failure()
            }
            Err(e) => {
                error!(client = %client, error = %e, "clock exchange failed");
                SyncResult::failure()
            }
        };
        record_sync_result(self.name(), &client, &result, started.elapsed());
        result
    }
}
