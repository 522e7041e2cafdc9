//! Pulse onset detection and segmentation.
//!
//! Onsets (feet) of pressure and flow pulses are local minima of the signal.
//! The conditioned signal is inverted and passed to a multi-scale local
//! maximum detector after Bishop & Ercole, "Multi-scale peak and trough
//! detection optimised for periodic and quasi-periodic neuroscience data"
//! (Intracranial Pressure and Neuromonitoring XVI, 2018). The detector picks
//! the scale with the densest local-maximum structure, so it needs no prior
//! heart-rate assumption.

use crate::error::{PulseError, Result};
use crate::filter::{ChebyshevLowpass, LowpassSpec, DEFAULT_RIPPLE_DB};
use crate::signal::{detrend, is_flat, mean, Samples};
use serde::{Deserialize, Serialize};

/// Parameters of the onset segmenter.
#[derive(Debug, Clone, Copy)]
pub struct SegmenterConfig {
    /// Order of the Chebyshev-I pre-filter.
    pub prefilter_order: usize,
    /// Pre-filter cutoff (Hz), normalized against Nyquist like every other
    /// cutoff in this crate. Recordings sampled at `2 * prefilter_cutoff_hz`
    /// or below are rejected. Earlier tooling divided by `fs` instead, which
    /// halves the effective cutoff; pass half the value to reproduce it.
    pub prefilter_cutoff_hz: f64,
    /// Pre-filter passband ripple (dB).
    pub ripple_db: f64,
    /// Longest scale searched, in seconds. Multiplied by `fs` to get samples;
    /// zero searches the full signal length.
    pub max_scale_s: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            prefilter_order: 6,
            prefilter_cutoff_hz: 10.0,
            ripple_db: DEFAULT_RIPPLE_DB,
            max_scale_s: 1.0,
        }
    }
}

/// How each pulse's time axis is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeMode {
    /// The slice of the time vector covering the pulse.
    #[default]
    Segments,
    /// The mean of that slice.
    Mean,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PulseTimes {
    Segments(Vec<Vec<f64>>),
    Means(Vec<f64>),
}

impl PulseTimes {
    pub fn len(&self) -> usize {
        match self {
            PulseTimes::Segments(s) => s.len(),
            PulseTimes::Means(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Representative time of pulse `idx` (mean of its time slice).
    pub fn mean_time(&self, idx: usize) -> Option<f64> {
        match self {
            PulseTimes::Segments(s) => s.get(idx).map(|t| mean(t)),
            PulseTimes::Means(m) => m.get(idx).copied(),
        }
    }
}

/// Result of splitting one signal into pulses.
///
/// `pulses.len() == times.len() == onsets.len() - 1`; `onsets` is strictly
/// increasing, starts at 0 and ends at the last sample index.
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub pulses: Vec<Vec<f64>>,
    pub times: PulseTimes,
    pub onsets: Vec<usize>,
}

impl Segmentation {
    pub fn len(&self) -> usize {
        self.pulses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }
}

/// Boolean `(sample, scale)` matrix in one contiguous buffer.
struct ScaleMatrix {
    cells: Vec<bool>,
    scales: usize,
}

impl ScaleMatrix {
    fn new(samples: usize, scales: usize) -> Self {
        Self {
            cells: vec![false; samples * scales],
            scales,
        }
    }

    fn set(&mut self, sample: usize, scale: usize) {
        self.cells[sample * self.scales + scale] = true;
    }

    fn row(&self, sample: usize) -> &[bool] {
        let start = sample * self.scales;
        &self.cells[start..start + self.scales]
    }

    fn samples(&self) -> usize {
        if self.scales == 0 {
            0
        } else {
            self.cells.len() / self.scales
        }
    }
}

/// Number of scales evaluated for a search horizon of `max_scale` samples.
fn scale_count(max_scale: usize, n: usize) -> usize {
    let horizon = if max_scale == 0 { n } else { max_scale };
    ((horizon + 1) / 2).saturating_sub(1)
}

/// Indices of the local maxima confirmed at every scale up to the dominant one.
///
/// `max_scale` is the search horizon in samples; 0 searches the whole signal.
pub fn detect_peaks(signal: &[f64], max_scale: usize) -> Vec<usize> {
    let n = signal.len();
    let scales = scale_count(max_scale, n);
    if scales == 0 || n < 3 {
        return Vec::new();
    }
    let x = detrend(signal);

    let mut matrix = ScaleMatrix::new(n, scales);
    let mut column_sums = vec![0usize; scales];
    for k in 1..=scales {
        if n <= 2 * k + 1 {
            break;
        }
        for i in k..n - k - 1 {
            if x[i] > x[i - k] && x[i] > x[i + k] {
                matrix.set(i, k - 1);
                column_sums[k - 1] += 1;
            }
        }
    }

    let mut dominant = 0;
    for (col, &sum) in column_sums.iter().enumerate() {
        if sum > column_sums[dominant] {
            dominant = col;
        }
    }
    log::debug!(
        "multi-scale detection: {} samples, {} scales, dominant scale {} ({} maxima)",
        n,
        scales,
        dominant + 1,
        column_sums[dominant]
    );

    (0..matrix.samples())
        .filter(|&i| matrix.row(i)[..=dominant].iter().all(|&hit| hit))
        .collect()
}

/// Splits a signal into pulses at detected onsets.
#[derive(Debug, Clone, Copy, Default)]
pub struct PulseSegmenter {
    config: SegmenterConfig,
}

impl PulseSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Pulse onsets including the `0` and `N-1` sentinels.
    pub fn detect_onsets(&self, signal: &[f64], fs: f64) -> Result<Vec<usize>> {
        let repaired = Samples::from_raw(signal).repaired();
        self.onsets_from_repaired(&repaired, fs)
    }

    fn onsets_from_repaired(&self, repaired: &[f64], fs: f64) -> Result<Vec<usize>> {
        let n = repaired.len();
        if n < 2 {
            return Err(PulseError::InsufficientData {
                what: "pulse segmentation",
                required: 2,
                actual: n,
            });
        }
        let spec = LowpassSpec {
            order: self.config.prefilter_order,
            cutoff_hz: self.config.prefilter_cutoff_hz,
            ripple_db: self.config.ripple_db,
        };
        let prefilter = ChebyshevLowpass::design(&spec, fs)?;

        let detected = if is_flat(repaired) {
            log::debug!("flat signal, no pulse onsets to detect");
            Vec::new()
        } else {
            let conditioned = prefilter.filtfilt(&detrend(repaired))?;
            let inverted: Vec<f64> = conditioned.iter().map(|v| -v).collect();
            let max_scale = (self.config.max_scale_s * fs).round().max(0.0) as usize;
            detect_peaks(&inverted, max_scale)
        };

        let mut onsets = Vec::with_capacity(detected.len() + 2);
        onsets.push(0);
        onsets.extend(detected);
        onsets.push(n - 1);
        log::debug!("segmentation: {} onsets over {} samples", onsets.len(), n);
        Ok(onsets)
    }

    /// Split `signal` into pulses and pair each one with its time axis.
    ///
    /// Missing samples are repaired before detection and the pulses are cut
    /// from the repaired signal.
    pub fn split_pulses(
        &self,
        signal: &[f64],
        time: &[f64],
        fs: f64,
        mode: TimeMode,
    ) -> Result<Segmentation> {
        if signal.len() != time.len() {
            return Err(PulseError::LengthMismatch {
                signal: signal.len(),
                time: time.len(),
            });
        }
        let repaired = Samples::from_raw(signal).repaired();
        let onsets = self.onsets_from_repaired(&repaired, fs)?;

        let pulses: Vec<Vec<f64>> = onsets
            .windows(2)
            .map(|w| repaired[w[0]..w[1]].to_vec())
            .collect();
        let times = match mode {
            TimeMode::Segments => PulseTimes::Segments(
                onsets.windows(2).map(|w| time[w[0]..w[1]].to_vec()).collect(),
            ),
            TimeMode::Mean => {
                PulseTimes::Means(onsets.windows(2).map(|w| mean(&time[w[0]..w[1]])).collect())
            }
        };
        Ok(Segmentation {
            pulses,
            times,
            onsets,
        })
    }
}

/// Segment with the default segmenter configuration.
pub fn segment(signal: &[f64], time: &[f64], fs: f64, mode: TimeMode) -> Result<Segmentation> {
    PulseSegmenter::default().split_pulses(signal, time, fs, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine_recording(period_s: f64, fs: f64, duration_s: f64) -> (Vec<f64>, Vec<f64>) {
        let n = (duration_s * fs) as usize;
        let time: Vec<f64> = (0..n).map(|i| i as f64 / fs).collect();
        let signal = time
            .iter()
            .map(|t| 10.0 + (2.0 * PI * t / period_s).sin())
            .collect();
        (signal, time)
    }

    fn assert_partition(seg: &Segmentation, n: usize) {
        assert_eq!(seg.pulses.len(), seg.times.len());
        assert_eq!(seg.pulses.len(), seg.onsets.len() - 1);
        assert_eq!(seg.onsets[0], 0);
        assert_eq!(*seg.onsets.last().unwrap(), n - 1);
        assert!(seg.onsets.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn detects_maxima_of_periodic_signal() {
        let signal: Vec<f64> = (0..400)
            .map(|i| (2.0 * PI * i as f64 / 50.0).cos())
            .collect();
        let peaks = detect_peaks(&signal, 50);
        assert!(!peaks.is_empty());
        for w in peaks.windows(2) {
            assert!((w[1] - w[0]).abs_diff(50) <= 1, "{:?}", peaks);
        }
        for &p in &peaks {
            assert!(signal[p] > 0.99);
        }
    }

    #[test]
    fn scale_count_follows_horizon() {
        assert_eq!(scale_count(100, 1000), 49);
        assert_eq!(scale_count(125, 1000), 62);
        assert_eq!(scale_count(0, 11), 5);
        assert_eq!(scale_count(2, 1000), 0);
        assert!(detect_peaks(&[1.0, 3.0, 1.0, 3.0, 1.0], 2).is_empty());
    }

    #[test]
    fn sine_segments_into_expected_pulse_count() {
        let fs = 100.0;
        for &period in &[1.0, 0.8] {
            let (signal, time) = sine_recording(period, fs, 10.0);
            let seg = segment(&signal, &time, fs, TimeMode::Segments).unwrap();
            assert_partition(&seg, signal.len());
            let expected = 10.0 / period;
            let count = seg.len() as f64;
            assert!(
                (count - expected).abs() <= 1.0,
                "period {}: {} pulses, expected about {}",
                period,
                count,
                expected
            );
            // Interior onsets sit at the troughs of the sine.
            for &onset in &seg.onsets[1..seg.onsets.len() - 1] {
                assert!(signal[onset] < 9.0 + 0.01, "onset {} at {}", onset, signal[onset]);
            }
        }
    }

    #[test]
    fn constant_signal_is_a_single_pulse() {
        let signal = vec![12.0; 500];
        let time: Vec<f64> = (0..500).map(|i| i as f64 / 100.0).collect();
        let seg = segment(&signal, &time, 100.0, TimeMode::Segments).unwrap();
        assert_eq!(seg.onsets, vec![0, 499]);
        assert_eq!(seg.pulses.len(), 1);
        assert_eq!(seg.pulses[0].len(), 499);

        let PulseTimes::Segments(times) = &seg.times else {
            panic!("expected per-sample times");
        };
        let features = crate::metrics::extract_features(&seg.pulses, times);
        assert_eq!(features.len(), 1);
        assert!(features.amplitudes[0].is_nan());
        assert_eq!(features.means[0], 12.0);
        assert!(features.slopes[0].is_nan());
    }

    #[test]
    fn all_missing_signal_degenerates_to_single_pulse() {
        let signal = vec![f64::NAN; 300];
        let time: Vec<f64> = (0..300).map(|i| i as f64 / 100.0).collect();
        let seg = segment(&signal, &time, 100.0, TimeMode::Mean).unwrap();
        assert_eq!(seg.onsets, vec![0, 299]);
        assert!(seg.pulses[0].iter().all(|v| v.is_finite()));

        let features = crate::metrics::extract_features(&seg.pulses, &[time[..299].to_vec()]);
        assert!(features.amplitudes[0].is_nan());
        assert!(features.means[0].is_finite());
    }

    #[test]
    fn mean_time_mode_reports_slice_means() {
        let fs = 100.0;
        let (signal, time) = sine_recording(1.0, fs, 6.0);
        let seg = segment(&signal, &time, fs, TimeMode::Mean).unwrap();
        assert_partition(&seg, signal.len());
        let PulseTimes::Means(means) = &seg.times else {
            panic!("expected mean times");
        };
        for (i, w) in seg.onsets.windows(2).enumerate() {
            let expected = mean(&time[w[0]..w[1]]);
            assert!((means[i] - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn missing_samples_are_repaired_in_pulses() {
        let fs = 100.0;
        let (mut signal, time) = sine_recording(1.0, fs, 5.0);
        signal[120] = f64::NAN;
        let seg = segment(&signal, &time, fs, TimeMode::Segments).unwrap();
        assert_partition(&seg, signal.len());
        assert!(seg.pulses.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn rejects_bad_inputs() {
        let err = segment(&[1.0], &[0.0], 100.0, TimeMode::Segments).unwrap_err();
        assert!(matches!(err, PulseError::InsufficientData { .. }));

        let err = segment(&[1.0, 2.0, 3.0], &[0.0, 0.01], 100.0, TimeMode::Segments).unwrap_err();
        assert!(matches!(err, PulseError::LengthMismatch { signal: 3, time: 2 }));

        // Shorter than the prefilter padding.
        let ramp: Vec<f64> = (0..10).map(|i| (i * i) as f64).collect();
        let time: Vec<f64> = (0..10).map(|i| i as f64 / 100.0).collect();
        let err = segment(&ramp, &time, 100.0, TimeMode::Segments).unwrap_err();
        assert!(matches!(err, PulseError::InsufficientData { actual: 10, .. }));

        let (signal, time) = sine_recording(1.0, 20.0, 5.0);
        let err = segment(&signal, &time, 20.0, TimeMode::Segments).unwrap_err();
        assert!(matches!(err, PulseError::InvalidFilterConfiguration(_)));
    }
}
