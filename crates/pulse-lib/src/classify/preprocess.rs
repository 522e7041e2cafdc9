use crate::error::{PulseError, Result};
use crate::signal::is_flat;
use serde::{Deserialize, Serialize};

/// Length every pulse is resampled to before classification.
pub const RESAMPLED_LEN: usize = 180;

/// Fewest samples a cubic spline can pass through.
const MIN_SPLINE_POINTS: usize = 4;

/// Pulse resampled to [`RESAMPLED_LEN`] samples and scaled into `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreprocessedPulse(Vec<f64>);

impl PreprocessedPulse {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Not-a-knot cubic spline through `(i, y[i])` for `i = 0..y.len()`.
struct CubicSpline<'a> {
    y: &'a [f64],
    /// Second derivatives at the knots.
    m: Vec<f64>,
}

impl<'a> CubicSpline<'a> {
    fn new(y: &'a [f64]) -> Self {
        let n = y.len();
        debug_assert!(n >= MIN_SPLINE_POINTS);
        // Unit knot spacing: m[i-1] + 4 m[i] + m[i+1] = r[i] for interior knots.
        let r: Vec<f64> = (0..n)
            .map(|i| {
                if i == 0 || i == n - 1 {
                    0.0
                } else {
                    6.0 * (y[i + 1] - 2.0 * y[i] + y[i - 1])
                }
            })
            .collect();

        let mut m = vec![0.0; n];
        // Not-a-knot (continuous third derivative at knots 1 and n-2) reduces
        // the first and last interior equations to 6 m[1] = r[1] and
        // 6 m[n-2] = r[n-2].
        m[1] = r[1] / 6.0;
        m[n - 2] = r[n - 2] / 6.0;

        // Tridiagonal solve for m[2..n-2] with the two ends fixed.
        let inner = n.saturating_sub(4);
        if inner > 0 {
            let mut c_prime = vec![0.0; inner];
            let mut d_prime = vec![0.0; inner];
            for j in 0..inner {
                let i = j + 2;
                let mut rhs = r[i];
                if j == 0 {
                    rhs -= m[1];
                }
                if j == inner - 1 {
                    rhs -= m[n - 2];
                }
                if j == 0 {
                    c_prime[j] = 1.0 / 4.0;
                    d_prime[j] = rhs / 4.0;
                } else {
                    let denom = 4.0 - c_prime[j - 1];
                    c_prime[j] = 1.0 / denom;
                    d_prime[j] = (rhs - d_prime[j - 1]) / denom;
                }
            }
            for j in (0..inner).rev() {
                let next = if j + 1 < inner { m[j + 3] } else { 0.0 };
                m[j + 2] = d_prime[j] - c_prime[j] * next;
            }
        }

        m[0] = 2.0 * m[1] - m[2];
        m[n - 1] = 2.0 * m[n - 2] - m[n - 3];
        Self { y, m }
    }

    fn eval(&self, x: f64) -> f64 {
        let n = self.y.len();
        let seg = (x.floor().max(0.0) as usize).min(n - 2);
        let t = x - seg as f64;
        let u = 1.0 - t;
        self.y[seg]
            + t * (self.y[seg + 1] - self.y[seg])
            + ((u * u * u - u) * self.m[seg] + (t * t * t - t) * self.m[seg + 1]) / 6.0
    }
}

/// Resample `pulse` to `len` points evenly spaced over its index range.
pub fn resample_cubic(pulse: &[f64], len: usize) -> Result<Vec<f64>> {
    if pulse.len() < MIN_SPLINE_POINTS {
        return Err(PulseError::DegeneratePulse(format!(
            "{} samples, cubic resampling needs at least {}",
            pulse.len(),
            MIN_SPLINE_POINTS
        )));
    }
    if pulse.iter().any(|v| !v.is_finite()) {
        return Err(PulseError::DegeneratePulse(
            "pulse contains non-finite samples".into(),
        ));
    }
    let spline = CubicSpline::new(pulse);
    let last = (pulse.len() - 1) as f64;
    let out = match len {
        0 => Vec::new(),
        1 => vec![spline.eval(0.0)],
        _ => (0..len)
            .map(|i| spline.eval(i as f64 * last / (len - 1) as f64))
            .collect(),
    };
    Ok(out)
}

/// Shift to a zero minimum and scale the maximum to one. A constant input
/// stays at zero instead of being divided by zero.
pub fn min_max_normalize(data: &mut [f64]) {
    let min = data.iter().copied().fold(f64::INFINITY, f64::min);
    if !min.is_finite() {
        return;
    }
    for v in data.iter_mut() {
        *v -= min;
    }
    let max = data.iter().copied().fold(0.0, f64::max);
    if max != 0.0 {
        for v in data.iter_mut() {
            *v /= max;
        }
    }
}

/// Resample and normalize one pulse for the classifier.
pub fn preprocess_pulse(pulse: &[f64]) -> Result<PreprocessedPulse> {
    let mut data = resample_cubic(pulse, RESAMPLED_LEN)?;
    if is_flat(pulse) {
        return Ok(PreprocessedPulse(vec![0.0; RESAMPLED_LEN]));
    }
    min_max_normalize(&mut data);
    Ok(PreprocessedPulse(data))
}

/// Preprocess every pulse, keeping per-pulse failures in place.
pub fn preprocess_for_classification(pulses: &[Vec<f64>]) -> Vec<Result<PreprocessedPulse>> {
    pulses.iter().map(|p| preprocess_pulse(p)).collect()
}
