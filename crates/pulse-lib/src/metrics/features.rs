use crate::signal::{is_flat, nan_argmax, nan_mean, nan_min_max};
use serde::{Deserialize, Serialize};

/// Descriptive features of a single pulse. NaN marks a value that is
/// undefined for this pulse (flat, empty or all-missing).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PulseFeatures {
    pub mean: f64,
    pub amplitude: f64,
    pub slope: f64,
}

/// Column-wise features for a sequence of pulses, in pulse order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PulseFeatureSet {
    pub means: Vec<f64>,
    pub amplitudes: Vec<f64>,
    pub slopes: Vec<f64>,
}

impl PulseFeatureSet {
    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<PulseFeatures> {
        Some(PulseFeatures {
            mean: *self.means.get(idx)?,
            amplitude: *self.amplitudes.get(idx)?,
            slope: *self.slopes.get(idx)?,
        })
    }
}

pub fn pulse_mean(pulse: &[f64]) -> f64 {
    nan_mean(pulse)
}

/// Peak-to-peak amplitude. A flat pulse (see [`is_flat`]) has no amplitude
/// (NaN), which keeps it distinguishable from a measured zero.
pub fn pulse_amplitude(pulse: &[f64]) -> f64 {
    match nan_min_max(pulse) {
        Some((lo, hi)) if !is_flat(pulse) => hi - lo,
        _ => f64::NAN,
    }
}

/// Ascending slope from pulse onset to pulse maximum, in signal units per
/// second. NaN when the maximum coincides with the onset in time.
pub fn pulse_slope(pulse: &[f64], time: &[f64]) -> f64 {
    let Some(peak) = nan_argmax(pulse) else {
        return f64::NAN;
    };
    let (Some(&t_peak), Some(&t_onset)) = (time.get(peak), time.first()) else {
        return f64::NAN;
    };
    let dt = t_peak - t_onset;
    if dt == 0.0 {
        return f64::NAN;
    }
    (pulse[peak] - pulse[0]) / dt
}

pub fn pulse_features(pulse: &[f64], time: &[f64]) -> PulseFeatures {
    PulseFeatures {
        mean: pulse_mean(pulse),
        amplitude: pulse_amplitude(pulse),
        slope: pulse_slope(pulse, time),
    }
}

pub fn batch_pulse_mean(pulses: &[Vec<f64>]) -> Vec<f64> {
    pulses.iter().map(|p| pulse_mean(p)).collect()
}

pub fn batch_pulse_amplitude(pulses: &[Vec<f64>]) -> Vec<f64> {
    pulses.iter().map(|p| pulse_amplitude(p)).collect()
}

/// Slopes for every pulse; a pulse without a matching time slice gets NaN.
pub fn batch_pulse_slope(pulses: &[Vec<f64>], times: &[Vec<f64>]) -> Vec<f64> {
    pulses
        .iter()
        .enumerate()
        .map(|(i, p)| match times.get(i) {
            Some(t) => pulse_slope(p, t),
            None => f64::NAN,
        })
        .collect()
}

/// Mean, amplitude and slope of every pulse.
pub fn extract_features(pulses: &[Vec<f64>], times: &[Vec<f64>]) -> PulseFeatureSet {
    PulseFeatureSet {
        means: batch_pulse_mean(pulses),
        amplitudes: batch_pulse_amplitude(pulses),
        slopes: batch_pulse_slope(pulses, times),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amplitude_is_peak_to_peak_or_nan_when_flat() {
        assert_eq!(pulse_amplitude(&[1.0, 4.0, 2.5, -0.5]), 4.5);
        assert_eq!(pulse_amplitude(&[f64::NAN, 3.0, 1.0]), 2.0);
        assert!(pulse_amplitude(&[2.0, 2.0, 2.0]).is_nan());
        assert!(pulse_amplitude(&[12.0, 12.0 + 1e-13, 12.0 - 1e-13]).is_nan());
        assert!(pulse_amplitude(&[f64::NAN, f64::NAN]).is_nan());
        assert!(pulse_amplitude(&[]).is_nan());
    }

    #[test]
    fn mean_ignores_missing_samples() {
        assert_eq!(pulse_mean(&[1.0, f64::NAN, 3.0]), 2.0);
        assert!(pulse_mean(&[]).is_nan());
        assert!(pulse_mean(&[f64::NAN]).is_nan());
    }

    #[test]
    fn slope_runs_from_onset_to_maximum() {
        let pulse = [1.0, 3.0, 5.0, 4.0];
        let time = [0.0, 0.01, 0.02, 0.03];
        assert!((pulse_slope(&pulse, &time) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn slope_is_nan_when_peak_is_onset() {
        assert!(pulse_slope(&[5.0, 3.0, 1.0], &[0.0, 0.1, 0.2]).is_nan());
        assert!(pulse_slope(&[7.0], &[0.0]).is_nan());
        assert!(pulse_slope(&[], &[]).is_nan());
        assert!(pulse_slope(&[1.0, 2.0], &[0.0]).is_nan());
    }

    #[test]
    fn batch_preserves_order_and_length() {
        let pulses = vec![vec![0.0, 2.0, 1.0], vec![3.0, 3.0], vec![1.0, 0.0, 4.0]];
        let times = vec![vec![0.0, 0.5, 1.0], vec![1.0, 1.5]];
        let set = extract_features(&pulses, &times);
        assert_eq!(set.len(), 3);
        assert_eq!(set.means, vec![1.0, 3.0, 5.0 / 3.0]);
        assert_eq!(set.amplitudes[0], 2.0);
        assert!(set.amplitudes[1].is_nan());
        assert_eq!(set.amplitudes[2], 4.0);
        assert_eq!(set.slopes[0], 4.0);
        assert!(set.slopes[1].is_nan());
        assert!(set.slopes[2].is_nan());
        let first = set.get(0).unwrap();
        assert_eq!(first.amplitude, 2.0);
        assert!(set.get(3).is_none());
    }
}
