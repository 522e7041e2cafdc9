//! Conversion of fractional-day timestamps to elapsed seconds.
//!
//! Timestamps follow the spreadsheet convention used by bedside monitoring
//! exports: the integer part counts days, the fractional part is the time of
//! day.

use crate::error::{PulseError, Result};
use serde::{Deserialize, Serialize};

pub const SECONDS_PER_DAY: f64 = 24.0 * 3600.0;

/// Zero-based time axis plus the sampling frequency estimated from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timebase {
    pub time: Vec<f64>,
    pub fs: f64,
}

impl Timebase {
    pub fn duration(&self) -> f64 {
        self.time.last().copied().unwrap_or(0.0)
    }
}

/// Convert `timestamps` to seconds since the first sample and estimate `fs`
/// from the first sampling interval.
///
/// With `multi_day == false` only the time-of-day part is used, so a
/// recording crossing midnight shows a negative jump at the rollover. Callers
/// that may span days should pass `multi_day == true`.
pub fn convert_timebase(timestamps: &[f64], multi_day: bool) -> Result<Timebase> {
    if timestamps.len() < 2 {
        return Err(PulseError::InsufficientData {
            what: "sampling frequency estimate",
            required: 2,
            actual: timestamps.len(),
        });
    }
    let first = timestamps[0];
    let time: Vec<f64> = if multi_day {
        timestamps
            .iter()
            .map(|&ts| {
                let elapsed = ts - first;
                let days = elapsed.floor();
                days * SECONDS_PER_DAY + (elapsed - days) * SECONDS_PER_DAY
            })
            .collect()
    } else {
        let t0 = time_of_day(first);
        timestamps.iter().map(|&ts| time_of_day(ts) - t0).collect()
    };

    let fs = (1.0 / (time[1] - time[0])).round();
    if !fs.is_finite() || fs <= 0.0 {
        return Err(PulseError::InvalidTimebase(format!(
            "first sampling interval {:.6} s gives sampling frequency {}",
            time[1] - time[0],
            fs
        )));
    }
    log::debug!(
        "timebase: {} samples, fs {} Hz, span {:.3} s",
        time.len(),
        fs,
        time.last().copied().unwrap_or(0.0)
    );
    Ok(Timebase { time, fs })
}

fn time_of_day(ts: f64) -> f64 {
    (ts - ts.floor()) * SECONDS_PER_DAY
}
