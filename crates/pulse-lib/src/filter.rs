//! Zero-phase Chebyshev type-I lowpass filtering.
//!
//! The filter is designed from the analog prototype through the bilinear
//! transform and kept as a cascade of second-order sections. Applying it
//! forward and backward cancels the phase response.

use crate::error::{PulseError, Result};
use crate::signal::Samples;
use num_complex::Complex64;
use sci_rs::signal::filter::{design::Sos, sosfiltfilt_dyn};
use std::f64::consts::PI;

pub const DEFAULT_CUTOFF_HZ: f64 = 10.0;
pub const DEFAULT_ORDER: usize = 8;
pub const DEFAULT_RIPPLE_DB: f64 = 1.0;

/// Lowpass design parameters.
#[derive(Debug, Clone, Copy)]
pub struct LowpassSpec {
    pub order: usize,
    pub cutoff_hz: f64,
    /// Passband ripple (dB).
    pub ripple_db: f64,
}

impl Default for LowpassSpec {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER,
            cutoff_hz: DEFAULT_CUTOFF_HZ,
            ripple_db: DEFAULT_RIPPLE_DB,
        }
    }
}

impl LowpassSpec {
    pub fn new(order: usize, cutoff_hz: f64) -> Self {
        Self {
            order,
            cutoff_hz,
            ..Self::default()
        }
    }
}

fn section_dc_gain(section: &Sos<f64>) -> f64 {
    section.b.iter().sum::<f64>() / section.a.iter().sum::<f64>()
}

/// Chebyshev type-I lowpass as cascaded second-order sections.
#[derive(Debug, Clone)]
pub struct ChebyshevLowpass {
    sections: Vec<Sos<f64>>,
    order: usize,
}

impl ChebyshevLowpass {
    pub fn design(spec: &LowpassSpec, fs: f64) -> Result<Self> {
        if spec.order == 0 {
            return Err(PulseError::InvalidFilterConfiguration(
                "filter order must be at least 1".into(),
            ));
        }
        if !fs.is_finite() || fs <= 0.0 {
            return Err(PulseError::InvalidFilterConfiguration(format!(
                "sampling frequency must be positive, got {}",
                fs
            )));
        }
        if !spec.ripple_db.is_finite() || spec.ripple_db <= 0.0 {
            return Err(PulseError::InvalidFilterConfiguration(format!(
                "passband ripple must be positive, got {} dB",
                spec.ripple_db
            )));
        }
        let wn = spec.cutoff_hz / (fs / 2.0);
        if !wn.is_finite() || wn <= 0.0 || wn >= 1.0 {
            return Err(PulseError::InvalidFilterConfiguration(format!(
                "cutoff {} Hz at fs {} Hz gives normalized cutoff {:.4}, expected 0 < Wn < 1",
                spec.cutoff_hz, fs, wn
            )));
        }

        let n = spec.order;
        let eps = (10f64.powf(spec.ripple_db / 10.0) - 1.0).sqrt();
        let mu = (1.0 / eps).asinh() / n as f64;
        // Bilinear transform with sample period 1/2 so the prewarped edge is tan().
        let warped = 2.0 * (PI * wn / 2.0).tan();

        let mut sections = Vec::with_capacity((n + 1) / 2);
        for m in 0..n / 2 {
            let theta = PI * (2 * m + 1) as f64 / (2 * n) as f64;
            let pole = Complex64::new(-mu.sinh() * theta.sin(), mu.cosh() * theta.cos()) * warped;
            let z = bilinear(pole);
            let a = [1.0, -2.0 * z.re, z.norm_sqr()];
            let g = (a[0] + a[1] + a[2]) / 4.0;
            sections.push(Sos::new([g, 2.0 * g, g], a));
        }
        if n % 2 == 1 {
            let pole = Complex64::new(-mu.sinh() * warped, 0.0);
            let z = bilinear(pole).re;
            let a = [1.0, -z, 0.0];
            let g = (a[0] + a[1]) / 2.0;
            sections.push(Sos::new([g, g, 0.0], a));
        }
        if n % 2 == 0 {
            // Even orders sit at the bottom of the ripple band at DC.
            let scale = 1.0 / (1.0 + eps * eps).sqrt();
            if let Some(first) = sections.first_mut() {
                for b in first.b.iter_mut() {
                    *b *= scale;
                }
            }
        }
        Ok(Self { sections, order: n })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn dc_gain(&self) -> f64 {
        self.sections.iter().map(section_dc_gain).product()
    }

    /// Magnitude response at normalized frequency `w` (radians per sample).
    pub fn magnitude(&self, w: f64) -> f64 {
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;
        self.sections
            .iter()
            .map(|s| {
                let num = s.b[0] + s.b[1] * z1 + s.b[2] * z2;
                let den = s.a[0] + s.a[1] * z1 + s.a[2] * z2;
                (num / den).norm()
            })
            .product()
    }

    /// Edge length used for odd-reflection padding: three times the
    /// number of taps of the cascade.
    pub fn pad_len(&self) -> usize {
        3 * (2 * self.sections.len() + 1)
    }

    /// Forward-backward filtering with odd-reflection padding and
    /// steady-state initial conditions. The input must be longer than
    /// [`ChebyshevLowpass::pad_len`]; an empty input stays empty.
    pub fn filtfilt(&self, data: &[f64]) -> Result<Vec<f64>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let pad = self.pad_len();
        if data.len() <= pad {
            return Err(PulseError::InsufficientData {
                what: "zero-phase filtering",
                required: pad + 1,
                actual: data.len(),
            });
        }
        Ok(sosfiltfilt_dyn(data.iter(), &self.sections))
    }
}

fn bilinear(pole: Complex64) -> Complex64 {
    (2.0 + pole) / (2.0 - pole)
}

/// Repair missing samples and apply a zero-phase lowpass described by `spec`.
pub fn lowpass(signal: &[f64], fs: f64, spec: &LowpassSpec) -> Result<Vec<f64>> {
    let filter = ChebyshevLowpass::design(spec, fs)?;
    let repaired = Samples::from_raw(signal).repaired();
    filter.filtfilt(&repaired)
}

/// Standalone signal conditioner: order-8 Chebyshev-I lowpass at `cutoff_hz`.
pub fn filter_signal(signal: &[f64], fs: f64, cutoff_hz: f64) -> Result<Vec<f64>> {
    lowpass(signal, fs, &LowpassSpec::new(DEFAULT_ORDER, cutoff_hz))
}
