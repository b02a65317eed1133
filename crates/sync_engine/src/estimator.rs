//! Signal delay estimator
//!
//! 对两条 3 轴陀螺仪轨迹做互相关，估计第二条相对第一条的延迟（秒）。
//!
//! 流程：
//! 1. 选取公共步长 `dt`，可选线性重采样到等间隔网格
//! 2. 逐样本取模长，计算完整互相关，取峰值
//! 3. 以峰值 lag 对齐后做 3x3 轴标定，再算一次互相关
//! 4. 在新峰值附近用三次样条求亚采样精度
//!
//! 延迟为正表示第二条轨迹滞后于第一条。

use contracts::{DelayEstimate, ImuSyncConfig, SignalSeries};
use nalgebra::{Matrix3, Vector3};
use observability::metrics::record_delay_estimate;
use tracing::{debug, instrument, trace};

use crate::spline::refine_peak;

/// Estimator 参数
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorConfig {
    /// 是否先重采样到等间隔网格
    pub resample: bool,
    /// 重采样频率上限 (Hz)，实际步长取 `min(1/rate, 两条轨迹平均间隔)`
    pub resample_rate_hz: f64,
    /// 峰值搜索的最大 |lag| (秒)
    pub max_lag_seconds: Option<f64>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            resample: true,
            resample_rate_hz: 1.0,
            max_lag_seconds: None,
        }
    }
}

impl From<&ImuSyncConfig> for EstimatorConfig {
    fn from(config: &ImuSyncConfig) -> Self {
        Self {
            resample: config.resample,
            resample_rate_hz: config.resample_rate_hz,
            max_lag_seconds: config.max_lag_seconds,
        }
    }
}

/// 基于互相关的信号延迟估计器
#[derive(Debug, Clone, Default)]
pub struct SignalDelayEstimator {
    config: EstimatorConfig,
}

impl SignalDelayEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// 估计 `second` 相对 `first` 的延迟
    ///
    /// 任一轨迹少于 2 个样本、步长不可用或结果非有限值时返回 `None`。
    #[instrument(
        name = "estimate_delay",
        level = "debug",
        skip_all,
        fields(first = first.len(), second = second.len())
    )]
    pub fn estimate(&self, first: &SignalSeries, second: &SignalSeries) -> Option<DelayEstimate> {
        let estimate = self.run(first, second);
        record_delay_estimate(estimate.as_ref());
        estimate
    }

    fn run(&self, first: &SignalSeries, second: &SignalSeries) -> Option<DelayEstimate> {
        if first.len() < 2 || second.len() < 2 {
            debug!("series too short for delay estimation");
            return None;
        }

        let dt = self.grid_step(first, second)?;

        let (mut a, b) = if self.config.resample {
            let overlap = first.span().min(second.span());
            let count = (overlap / dt).floor() as usize + 1;
            (
                resample_linear(first, dt, count),
                resample_linear(second, dt, count),
            )
        } else {
            (first.samples().to_vec(), second.samples().to_vec())
        };
        if a.len() < 2 || b.len() < 2 {
            debug!(first = a.len(), second = b.len(), "too few samples after resampling");
            return None;
        }

        let shift = 1 - a.len() as i64;
        let max_lag_steps = self
            .config
            .max_lag_seconds
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(|s| (s / dt).floor() as i64);

        let corr = cross_correlate(&norms(&a), &norms(&b));
        let initial = peak_index(&corr, a.len(), max_lag_steps)?;
        trace!(lag = initial as i64 + shift, "initial correlation peak");

        calibrate_axes(&mut a, &b, initial as i64 + shift);

        let corr = cross_correlate(&norms(&a), &norms(&b));
        let peak = peak_index(&corr, a.len(), max_lag_steps)?;
        let (index, fraction) = refine_peak(&corr, peak);

        let lag_steps = index as i64 + shift;
        let delay_seconds = (lag_steps as f64 + fraction) * dt;
        if !delay_seconds.is_finite() {
            debug!("non-finite delay estimate");
            return None;
        }

        debug!(delay_seconds, dt, lag_steps, fraction, "delay estimated");
        Some(DelayEstimate {
            delay_seconds,
            step_seconds: dt,
            lag_steps,
        })
    }

    fn grid_step(&self, first: &SignalSeries, second: &SignalSeries) -> Option<f64> {
        let mut dt = f64::INFINITY;
        if self.config.resample_rate_hz.is_finite() && self.config.resample_rate_hz > 0.0 {
            dt = 1.0 / self.config.resample_rate_hz;
        }
        dt = dt.min(first.mean_interval()?).min(second.mean_interval()?);

        if dt.is_finite() && dt > 0.0 {
            Some(dt)
        } else {
            debug!(dt, "unusable grid step");
            None
        }
    }
}

/// 从序列起点开始，以 `step` 为间隔线性插值 `count` 个样本
fn resample_linear(series: &SignalSeries, step: f64, count: usize) -> Vec<[f64; 3]> {
    let ts = series.timestamps();
    let xs = series.samples();
    let start = ts[0];

    let mut out = Vec::with_capacity(count);
    let mut j = 0;
    for k in 0..count {
        let t = start + k as f64 * step;
        while j + 2 < ts.len() && ts[j + 1] < t {
            j += 1;
        }
        let (t0, t1) = (ts[j], ts[j + 1]);
        let w = if t1 > t0 {
            ((t - t0) / (t1 - t0)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let (x0, x1) = (xs[j], xs[j + 1]);
        out.push([
            x0[0] + (x1[0] - x0[0]) * w,
            x0[1] + (x1[1] - x0[1]) * w,
            x0[2] + (x1[2] - x0[2]) * w,
        ]);
    }
    out
}

fn norms(samples: &[[f64; 3]]) -> Vec<f64> {
    samples
        .iter()
        .map(|[x, y, z]| (x * x + y * y + z * z).sqrt())
        .collect()
}

/// 完整互相关
///
/// `corr[k] = Σ_n second[n + k - (n1 - 1)] · first[n]`，`k ∈ [0, n1 + n2 - 1)`，
/// 结果零填充到下一个 2 的幂。
pub(crate) fn cross_correlate(first: &[f64], second: &[f64]) -> Vec<f64> {
    let (n1, n2) = (first.len(), second.len());
    if n1 == 0 || n2 == 0 {
        return Vec::new();
    }

    let full = n1 + n2 - 1;
    let mut corr = vec![0.0; full.next_power_of_two()];
    for (k, slot) in corr.iter_mut().take(full).enumerate() {
        // second index m = n + k - (n1 - 1) must lie in [0, n2)
        let lo = (n1 - 1).saturating_sub(k);
        let hi = (n1 - 1 + n2 - k).min(n1);
        let offset = k as isize - (n1 as isize - 1);
        let mut acc = 0.0;
        for n in lo..hi {
            acc += second[(n as isize + offset) as usize] * first[n];
        }
        *slot = acc;
    }
    corr
}

/// 相关峰值位置（首个最大值），可选限制 |lag|
///
/// 全零相关没有信息量，返回 `None`。
fn peak_index(corr: &[f64], first_len: usize, max_lag_steps: Option<i64>) -> Option<usize> {
    let zero_lag = first_len as i64 - 1;
    let mut best: Option<(usize, f64)> = None;
    for (k, &value) in corr.iter().enumerate() {
        if let Some(max) = max_lag_steps {
            if (k as i64 - zero_lag).abs() > max {
                continue;
            }
        }
        if best.is_none_or(|(_, v)| value > v) {
            best = Some((k, value));
        }
    }
    best.filter(|&(_, v)| v > 0.0).map(|(k, _)| k)
}

/// 以 `lag` 对齐两条轨迹后求 `M = (BᵀA)(AᵀA)⁻¹`，并将 `first` 的每一行映射为 `M·r`
///
/// 重叠不足或矩阵奇异时保持 `first` 不变。
fn calibrate_axes(first: &mut [[f64; 3]], second: &[[f64; 3]], lag: i64) {
    let (n1, n2) = (first.len() as i64, second.len() as i64);
    let (a_start, a_end, b_start) = if lag >= 0 {
        (0, n1 - lag, lag)
    } else {
        (-lag, n1, 0)
    };
    if a_start >= a_end || b_start >= n2 {
        debug!(lag, "no overlap for axis calibration");
        return;
    }

    let a = &first[a_start as usize..a_end as usize];
    let b = &second[b_start as usize..];
    let rows = a.len().min(b.len());
    if rows < 3 {
        debug!(rows, "too few rows for axis calibration");
        return;
    }

    let mut ata = Matrix3::<f64>::zeros();
    let mut bta = Matrix3::<f64>::zeros();
    for (ra, rb) in a[..rows].iter().zip(&b[..rows]) {
        let va = Vector3::from(*ra);
        let vb = Vector3::from(*rb);
        ata += va * va.transpose();
        bta += vb * va.transpose();
    }

    let scale = ata.norm();
    if ata.determinant().abs() <= f64::EPSILON * scale * scale * scale {
        debug!("singular axis calibration, skipped");
        return;
    }
    let Some(inverse) = ata.try_inverse() else {
        debug!("singular axis calibration, skipped");
        return;
    };
    let m = bta * inverse;
    trace!(?m, "axis calibration");

    for row in first.iter_mut() {
        let v = m * Vector3::from(*row);
        *row = [v.x, v.y, v.z];
    }
}
