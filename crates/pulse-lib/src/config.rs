use crate::classify::DEFAULT_BATCH_SIZE;
use crate::detectors::{SegmenterConfig, TimeMode};
use crate::error::{PulseError, Result};
use crate::filter::{LowpassSpec, DEFAULT_CUTOFF_HZ, DEFAULT_ORDER, DEFAULT_RIPPLE_DB};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Settings for one recording pass: timebase, lowpass, segmentation and
/// classification batching. Missing TOML keys fall back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub multi_day: bool,
    pub time_mode: TimeMode,
    /// Skip the lowpass stage and segment the raw channel.
    pub skip_filter: bool,
    pub cutoff_hz: f64,
    pub filter_order: usize,
    pub ripple_db: f64,
    pub prefilter_order: usize,
    pub prefilter_cutoff_hz: f64,
    /// Largest peak-detection scale, in seconds. Zero searches every scale.
    pub max_scale_s: f64,
    pub batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let segmenter = SegmenterConfig::default();
        Self {
            multi_day: true,
            time_mode: TimeMode::default(),
            skip_filter: false,
            cutoff_hz: DEFAULT_CUTOFF_HZ,
            filter_order: DEFAULT_ORDER,
            ripple_db: DEFAULT_RIPPLE_DB,
            prefilter_order: segmenter.prefilter_order,
            prefilter_cutoff_hz: segmenter.prefilter_cutoff_hz,
            max_scale_s: segmenter.max_scale_s,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: Self =
            toml::from_str(text).map_err(|e| PulseError::InvalidConfiguration(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PulseError::InvalidConfiguration(msg));
        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1".into());
        }
        if self.filter_order == 0 || self.prefilter_order == 0 {
            return invalid(format!(
                "filter orders must be positive (filter_order={}, prefilter_order={})",
                self.filter_order, self.prefilter_order
            ));
        }
        for (name, value) in [
            ("cutoff_hz", self.cutoff_hz),
            ("prefilter_cutoff_hz", self.prefilter_cutoff_hz),
            ("ripple_db", self.ripple_db),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return invalid(format!("{} must be positive, got {}", name, value));
            }
        }
        if !(self.max_scale_s.is_finite() && self.max_scale_s >= 0.0) {
            return invalid(format!("max_scale_s must not be negative, got {}", self.max_scale_s));
        }
        Ok(())
    }

    pub fn lowpass(&self) -> LowpassSpec {
        LowpassSpec {
            order: self.filter_order,
            cutoff_hz: self.cutoff_hz,
            ripple_db: self.ripple_db,
        }
    }

    pub fn segmenter(&self) -> SegmenterConfig {
        SegmenterConfig {
            prefilter_order: self.prefilter_order,
            prefilter_cutoff_hz: self.prefilter_cutoff_hz,
            ripple_db: self.ripple_db,
            max_scale_s: self.max_scale_s,
        }
    }
}
