//! Pulse morphology classification: preprocessing, batching and the
//! classifier seam.

pub mod preprocess;
pub mod service;

pub use preprocess::{
    preprocess_for_classification, preprocess_pulse, PreprocessedPulse, RESAMPLED_LEN,
};
pub use service::{CommandClassifier, PulseClassifier};

use crate::error::{PulseError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Morphology class label, 1-based. Class 5 is reserved for artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PulseClass(u8);

impl PulseClass {
    pub const ARTIFACT: PulseClass = PulseClass(5);
    pub const COUNT: u8 = 5;

    pub fn new(label: u8) -> Option<Self> {
        (1..=Self::COUNT).contains(&label).then_some(Self(label))
    }

    pub fn label(self) -> u8 {
        self.0
    }

    pub fn is_artifact(self) -> bool {
        self == Self::ARTIFACT
    }
}

struct PendingBatch {
    indices: Vec<usize>,
    pulses: Vec<PreprocessedPulse>,
    dispatched: usize,
}

impl PendingBatch {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            indices: Vec::with_capacity(capacity),
            pulses: Vec::with_capacity(capacity),
            dispatched: 0,
        }
    }

    fn len(&self) -> usize {
        self.pulses.len()
    }

    fn dispatch(
        &mut self,
        classifier: &mut dyn PulseClassifier,
        labels: &mut [Option<PulseClass>],
    ) -> Result<()> {
        let batch = self.dispatched;
        self.dispatched += 1;
        let raw = classifier
            .classify(&self.pulses)
            .map_err(|err| PulseError::ClassificationFailed {
                batch,
                reason: format!("{:#}", err),
            })?;
        if raw.len() != self.pulses.len() {
            return Err(PulseError::ClassificationFailed {
                batch,
                reason: format!(
                    "expected {} labels, classifier returned {}",
                    self.pulses.len(),
                    raw.len()
                ),
            });
        }
        for (&idx, &label) in self.indices.iter().zip(&raw) {
            let class = PulseClass::new(label).ok_or_else(|| PulseError::ClassificationFailed {
                batch,
                reason: format!("label {} outside 1..={}", label, PulseClass::COUNT),
            })?;
            labels[idx] = Some(class);
        }
        log::debug!("classified batch {} ({} pulses)", batch, self.pulses.len());
        self.indices.clear();
        self.pulses.clear();
        Ok(())
    }
}

/// Classify `pulses` in batches of `batch_size`.
///
/// Labels come back in pulse order. Pulses that cannot be preprocessed
/// (too short, non-finite samples) get `None`; any classifier failure aborts
/// with [`PulseError::ClassificationFailed`].
pub fn classify_pulses(
    pulses: &[Vec<f64>],
    classifier: &mut dyn PulseClassifier,
    batch_size: usize,
) -> Result<Vec<Option<PulseClass>>> {
    if batch_size == 0 {
        return Err(PulseError::InvalidConfiguration(
            "batch size must be at least 1".into(),
        ));
    }
    let mut labels = vec![None; pulses.len()];
    let mut pending = PendingBatch::with_capacity(batch_size);
    for (idx, pulse) in pulses.iter().enumerate() {
        match preprocess_pulse(pulse) {
            Ok(prepared) => {
                pending.indices.push(idx);
                pending.pulses.push(prepared);
            }
            Err(err) => {
                log::warn!("pulse {} left unclassified: {}", idx, err);
                continue;
            }
        }
        if pending.len() == batch_size {
            pending.dispatch(classifier, &mut labels)?;
        }
    }
    if pending.len() > 0 {
        pending.dispatch(classifier, &mut labels)?;
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse(len: usize, peak: f64) -> Vec<f64> {
        (0..len)
            .map(|i| peak * (std::f64::consts::PI * i as f64 / len as f64).sin())
            .collect()
    }

    #[test]
    fn class_labels_are_bounded() {
        assert!(PulseClass::new(0).is_none());
        assert!(PulseClass::new(6).is_none());
        assert_eq!(PulseClass::new(3).map(PulseClass::label), Some(3));
        assert!(PulseClass::new(5).unwrap().is_artifact());
    }

    #[test]
    fn batches_are_bounded_and_labels_keep_pulse_order() {
        let pulses: Vec<Vec<f64>> = (0..10).map(|i| pulse(20 + i, 1.0 + i as f64)).collect();
        let mut sizes = Vec::new();
        let mut next = 0u8;
        let mut classifier = |batch: &[PreprocessedPulse]| -> anyhow::Result<Vec<u8>> {
            sizes.push(batch.len());
            Ok(batch
                .iter()
                .map(|_| {
                    next += 1;
                    (next - 1) % 5 + 1
                })
                .collect())
        };
        let labels = classify_pulses(&pulses, &mut classifier, 4).unwrap();
        assert_eq!(sizes, vec![4, 4, 2]);
        let got: Vec<u8> = labels.iter().map(|l| l.unwrap().label()).collect();
        assert_eq!(got, vec![1, 2, 3, 4, 5, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn degenerate_pulses_get_placeholders() {
        let pulses = vec![pulse(30, 2.0), vec![1.0, 2.0], pulse(25, 1.0), vec![]];
        let mut calls = 0;
        let mut classifier = |batch: &[PreprocessedPulse]| -> anyhow::Result<Vec<u8>> {
            calls += 1;
            assert!(batch.iter().all(|p| p.as_slice().len() == RESAMPLED_LEN));
            Ok(vec![2; batch.len()])
        };
        let labels = classify_pulses(&pulses, &mut classifier, 32).unwrap();
        assert_eq!(calls, 1);
        assert_eq!(labels[0], PulseClass::new(2));
        assert_eq!(labels[1], None);
        assert_eq!(labels[2], PulseClass::new(2));
        assert_eq!(labels[3], None);
    }

    #[test]
    fn classifier_failures_abort() {
        let pulses = vec![pulse(30, 2.0); 3];
        let mut failing =
            |_: &[PreprocessedPulse]| -> anyhow::Result<Vec<u8>> { anyhow::bail!("device lost") };
        let err = classify_pulses(&pulses, &mut failing, 2).unwrap_err();
        assert!(matches!(
            err,
            PulseError::ClassificationFailed { batch: 0, ref reason } if reason.contains("device lost")
        ));

        let mut short = |_: &[PreprocessedPulse]| -> anyhow::Result<Vec<u8>> { Ok(vec![1]) };
        assert!(classify_pulses(&pulses, &mut short, 2).is_err());

        let mut out_of_range =
            |b: &[PreprocessedPulse]| -> anyhow::Result<Vec<u8>> { Ok(vec![9; b.len()]) };
        assert!(classify_pulses(&pulses, &mut out_of_range, 2).is_err());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut classifier = |b: &[PreprocessedPulse]| -> anyhow::Result<Vec<u8>> { Ok(vec![1; b.len()]) };
        let err = classify_pulses(&[], &mut classifier, 0).unwrap_err();
        assert!(matches!(err, PulseError::InvalidConfiguration(_)));
    }
}
