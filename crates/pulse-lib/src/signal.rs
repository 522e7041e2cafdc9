use crate::error::{PulseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One channel of samples with an explicit validity mask.
///
/// Missing samples (NaN or infinite on input) are flagged invalid instead of
/// being carried through the numeric code as NaN. [`Samples::repaired`]
/// produces the dense signal the filters and detectors operate on.
#[derive(Debug, Clone, PartialEq)]
pub struct Samples {
    values: Vec<f64>,
    valid: Vec<bool>,
}

impl Samples {
    pub fn from_raw(raw: &[f64]) -> Self {
        let valid: Vec<bool> = raw.iter().map(|v| v.is_finite()).collect();
        let values = raw
            .iter()
            .zip(&valid)
            .map(|(&v, &ok)| if ok { v } else { 0.0 })
            .collect();
        Self { values, valid }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.valid.iter().filter(|ok| !**ok).count()
    }

    /// Mean of the valid samples, `None` when nothing is valid.
    pub fn valid_mean(&self) -> Option<f64> {
        let (sum, count) = self
            .values
            .iter()
            .zip(&self.valid)
            .filter(|(_, ok)| **ok)
            .fold((0.0, 0usize), |(s, c), (v, _)| (s + v, c + 1));
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    /// Dense copy with every missing sample replaced by the valid mean.
    ///
    /// A channel without a single valid sample repairs to all zeros.
    pub fn repaired(&self) -> Vec<f64> {
        let missing = self.missing_count();
        if missing == 0 {
            return self.values.clone();
        }
        let fill = self.valid_mean().unwrap_or(0.0);
        log::warn!(
            "repairing {} of {} missing samples with mean {:.4}",
            missing,
            self.len(),
            fill
        );
        self.values
            .iter()
            .zip(&self.valid)
            .map(|(&v, &ok)| if ok { v } else { fill })
            .collect()
    }
}

/// Raw recording as handed over by a reader: absolute timestamps plus named
/// channels of equal length.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recording {
    pub timestamps: Vec<f64>,
    pub channels: BTreeMap<String, Vec<f64>>,
}

impl Recording {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn channel(&self, name: &str) -> Result<&[f64]> {
        self.channels
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| PulseError::UnknownChannel(name.to_string()))
    }

    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }
}

/// Remove the least-squares line from `data`.
pub fn detrend(data: &[f64]) -> Vec<f64> {
    let n = data.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let t_mean = (n - 1) as f64 / 2.0;
    let y_mean = data.iter().sum::<f64>() / n as f64;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in data.iter().enumerate() {
        let dt = i as f64 - t_mean;
        num += dt * (y - y_mean);
        den += dt * dt;
    }
    let slope = num / den;
    data.iter()
        .enumerate()
        .map(|(i, &y)| y - y_mean - slope * (i as f64 - t_mean))
        .collect()
}

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Mean over the non-NaN entries; NaN when there are none.
pub fn nan_mean(data: &[f64]) -> f64 {
    let (sum, count) = data
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// `(min, max)` over the non-NaN entries.
pub fn nan_min_max(data: &[f64]) -> Option<(f64, f64)> {
    data.iter().filter(|v| !v.is_nan()).fold(None, |acc, &v| {
        Some(match acc {
            None => (v, v),
            Some((lo, hi)) => (lo.min(v), hi.max(v)),
        })
    })
}

/// Relative spread below which a series counts as constant.
pub const FLAT_TOLERANCE: f64 = 1e-9;

/// True when the non-NaN entries are constant up to [`FLAT_TOLERANCE`]
/// relative to their magnitude (or absolutely, below unit magnitude).
/// Filtering a constant leaves round-off ripple that this ignores.
pub fn is_flat(data: &[f64]) -> bool {
    match nan_min_max(data) {
        Some((lo, hi)) => hi - lo <= FLAT_TOLERANCE * hi.abs().max(lo.abs()).max(1.0),
        None => true,
    }
}

/// Index of the first maximum over the non-NaN entries.
pub fn nan_argmax(data: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in data.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repair_fills_gaps_with_valid_mean() {
        let samples = Samples::from_raw(&[1.0, f64::NAN, 3.0, f64::INFINITY]);
        assert_eq!(samples.missing_count(), 2);
        assert_eq!(samples.valid_mean(), Some(2.0));
        assert_eq!(samples.repaired(), vec![1.0, 2.0, 3.0, 2.0]);
    }

    #[test]
    fn round_off_ripple_counts_as_flat() {
        assert!(is_flat(&[80.0, 80.0 + 1e-12, 80.0 - 3e-12]));
        assert!(is_flat(&[0.0, 1e-15, -1e-15]));
        assert!(is_flat(&[f64::NAN, f64::NAN]));
        assert!(is_flat(&[]));
        assert!(!is_flat(&[80.0, 80.01]));
        assert!(!is_flat(&[0.0, 1e-6]));
    }

    #[test]
    fn all_missing_repairs_to_constant() {
        let samples = Samples::from_raw(&[f64::NAN; 5]);
        assert_eq!(samples.valid_mean(), None);
        let repaired = samples.repaired();
        assert!(repaired.iter().all(|v| *v == repaired[0]));
    }

    #[test]
    fn detrend_removes_line() {
        let data: Vec<f64> = (0..50).map(|i| 3.0 + 0.5 * i as f64).collect();
        let out = detrend(&data);
        assert!(out.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn nan_helpers_skip_missing() {
        let data = [f64::NAN, 2.0, 5.0, f64::NAN, -1.0];
        assert!((nan_mean(&data) - 2.0).abs() < 1e-12);
        assert_eq!(nan_min_max(&data), Some((-1.0, 5.0)));
        assert_eq!(nan_argmax(&data), Some(2));
        assert!(nan_mean(&[f64::NAN]).is_nan());
        assert_eq!(nan_argmax(&[]), None);
    }

    #[test]
    fn unknown_channel_is_an_error() {
        let rec = Recording::default();
        assert!(matches!(
            rec.channel("icp"),
            Err(PulseError::UnknownChannel(name)) if name == "icp"
        ));
    }
}
