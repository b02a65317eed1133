//! 三次样条插值 (单位节点间距)
//!
//! 用于在互相关峰值附近求亚采样精度的极值位置。

/// Natural cubic spline 在各节点处的一阶导数
///
/// 节点为 `x = 0, 1, ..., n-1`，两端二阶导为 0。
pub(crate) fn natural_spline_slopes(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return vec![0.0; n];
    }

    // second derivatives, M[0] = M[n-1] = 0
    let mut m = vec![0.0; n];
    if n > 2 {
        // M[i-1] + 4 M[i] + M[i+1] = 6 (y[i+1] - 2 y[i] + y[i-1]), Thomas algorithm
        let inner = n - 2;
        let mut c_prime = vec![0.0; inner];
        let mut d_prime = vec![0.0; inner];
        for k in 0..inner {
            let i = k + 1;
            let rhs = 6.0 * (values[i + 1] - 2.0 * values[i] + values[i - 1]);
            if k == 0 {
                c_prime[0] = 0.25;
                d_prime[0] = rhs / 4.0;
            } else {
                let denom = 4.0 - c_prime[k - 1];
                c_prime[k] = 1.0 / denom;
                d_prime[k] = (rhs - d_prime[k - 1]) / denom;
            }
        }
        for k in (0..inner).rev() {
            m[k + 1] = d_prime[k] - c_prime[k] * m[k + 2];
        }
    }

    let mut slopes = Vec::with_capacity(n);
    for i in 0..n - 1 {
        slopes.push((values[i + 1] - values[i]) - (2.0 * m[i] + m[i + 1]) / 6.0);
    }
    slopes.push((values[n - 1] - values[n - 2]) + (m[n - 2] + 2.0 * m[n - 1]) / 6.0);
    slopes
}

/// 单段三次多项式 `a + b x + c x^2 + d x^3`, `x ∈ [0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct HermiteSegment {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl HermiteSegment {
    /// 由节点值与节点斜率构造第 `i` 段 (`i + 1 < values.len()`)
    pub fn new(values: &[f64], slopes: &[f64], i: usize) -> Self {
        let (y0, y1) = (values[i], values[i + 1]);
        let (s0, s1) = (slopes[i], slopes[i + 1]);
        let c = 3.0 * (y1 - y0) - 2.0 * s0 - s1;
        let d = -2.0 * c / 3.0 + (s1 - s0) / 3.0;
        Self { a: y0, b: s0, c, d }
    }

    pub fn eval(&self, x: f64) -> f64 {
        ((self.d * x + self.c) * x + self.b) * x + self.a
    }

    fn derivative(&self, x: f64) -> f64 {
        (3.0 * self.d * x + 2.0 * self.c) * x + self.b
    }

    /// 导数零点中对应极大值的一个
    ///
    /// 复根取实部；退化为一次时取唯一根。
    pub fn stationary_point(&self) -> f64 {
        let qa = 3.0 * self.d;
        let qb = 2.0 * self.c;
        let qc = self.b;

        let (r0, r1) = if qa.abs() <= f64::EPSILON * (qb.abs() + qc.abs()) {
            if qb == 0.0 {
                return 0.0;
            }
            let root = -qc / qb;
            (root, root)
        } else {
            let disc = qb * qb - 4.0 * qa * qc;
            if disc < 0.0 {
                let re = -qb / (2.0 * qa);
                (re, re)
            } else {
                let sq = disc.sqrt();
                ((-qb - sq) / (2.0 * qa), (-qb + sq) / (2.0 * qa))
            }
        };

        let mid = 0.5 * (r0 + r1);
        if self.derivative(mid) < 0.0 {
            r0.min(r1)
        } else {
            r0.max(r1)
        }
    }
}

/// 在整数峰值 `peak` 附近求亚采样极大值
///
/// 返回 `(段起点, 段内偏移)`。
pub(crate) fn refine_peak(values: &[f64], peak: usize) -> (usize, f64) {
    if values.len() < 2 {
        return (peak, 0.0);
    }

    let mut slopes = natural_spline_slopes(values);
    let last = slopes.len() - 1;
    slopes[0] = 0.0;
    slopes[last] = 0.0;

    let mut index = peak.min(values.len() - 2);
    let mut segment = HermiteSegment::new(values, &slopes, index);
    if segment.b < 0.0 && index > 0 {
        index -= 1;
        segment = HermiteSegment::new(values, &slopes, index);
    }
    (index, segment.stationary_point())
}
