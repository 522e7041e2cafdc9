use crate::classify::{classify_pulses, PulseClass, PulseClassifier};
use crate::config::PipelineConfig;
use crate::detectors::{PulseSegmenter, PulseTimes};
use crate::error::Result;
use crate::filter::lowpass;
use crate::metrics::{extract_features, PulseFeatureSet};
use crate::signal::{Recording, Samples};
use crate::timebase::convert_timebase;
use serde::Serialize;

/// One detected pulse with its features and, when a classifier ran, its
/// morphology class.
#[derive(Debug, Clone, Serialize)]
pub struct PulseRecord {
    pub index: usize,
    /// Sample index of the pulse onset.
    pub onset: usize,
    /// Sample index of the next onset (exclusive end).
    pub end: usize,
    /// Mean time of the pulse in seconds from the recording start.
    pub mean_time: f64,
    pub mean: f64,
    pub amplitude: f64,
    pub slope: f64,
    pub class: Option<PulseClass>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordingAnalysis {
    pub channel: String,
    pub fs: f64,
    pub sample_count: usize,
    pub missing_samples: usize,
    pub onsets: Vec<usize>,
    pub pulses: Vec<PulseRecord>,
}

impl RecordingAnalysis {
    pub fn pulse_count(&self) -> usize {
        self.pulses.len()
    }

    pub fn artifact_count(&self) -> usize {
        self.pulses
            .iter()
            .filter(|p| p.class.is_some_and(PulseClass::is_artifact))
            .count()
    }
}

/// Run timebase, lowpass, segmentation, features and (optionally)
/// classification over one channel of a recording.
pub fn analyze_recording(
    recording: &Recording,
    channel: &str,
    cfg: &PipelineConfig,
    classifier: Option<&mut dyn PulseClassifier>,
) -> Result<RecordingAnalysis> {
    cfg.validate()?;
    let raw = recording.channel(channel)?;
    let timebase = convert_timebase(&recording.timestamps, cfg.multi_day)?;
    let missing_samples = Samples::from_raw(raw).missing_count();

    let signal = if cfg.skip_filter {
        raw.to_vec()
    } else {
        lowpass(raw, timebase.fs, &cfg.lowpass())?
    };

    let segmenter = PulseSegmenter::new(cfg.segmenter());
    let seg = segmenter.split_pulses(&signal, &timebase.time, timebase.fs, cfg.time_mode)?;

    let features = match &seg.times {
        PulseTimes::Segments(times) => extract_features(&seg.pulses, times),
        // Slopes need per-sample times, so rebuild them from the onsets.
        PulseTimes::Means(_) => {
            let times: Vec<Vec<f64>> = seg
                .onsets
                .windows(2)
                .map(|w| timebase.time[w[0]..w[1]].to_vec())
                .collect();
            extract_features(&seg.pulses, &times)
        }
    };

    let classes = match classifier {
        Some(classifier) => classify_pulses(&seg.pulses, classifier, cfg.batch_size)?,
        None => vec![None; seg.len()],
    };

    let pulses = build_records(&seg.onsets, &seg.times, &features, &classes);
    log::info!(
        "{}: {} pulses at {} Hz ({} missing samples)",
        channel,
        pulses.len(),
        timebase.fs,
        missing_samples
    );
    Ok(RecordingAnalysis {
        channel: channel.to_string(),
        fs: timebase.fs,
        sample_count: raw.len(),
        missing_samples,
        onsets: seg.onsets,
        pulses,
    })
}

fn build_records(
    onsets: &[usize],
    times: &PulseTimes,
    features: &PulseFeatureSet,
    classes: &[Option<PulseClass>],
) -> Vec<PulseRecord> {
    onsets
        .windows(2)
        .enumerate()
        .map(|(index, w)| {
            let f = features.get(index);
            PulseRecord {
                index,
                onset: w[0],
                end: w[1],
                mean_time: times.mean_time(index).unwrap_or(f64::NAN),
                mean: f.map_or(f64::NAN, |f| f.mean),
                amplitude: f.map_or(f64::NAN, |f| f.amplitude),
                slope: f.map_or(f64::NAN, |f| f.slope),
                class: classes.get(index).copied().flatten(),
            }
        })
        .collect()
}
