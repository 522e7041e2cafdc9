pub mod classify;
pub mod config;
pub mod detectors;
pub mod error;
pub mod filter;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod signal;
pub mod timebase;

pub use classify::{classify_pulses, preprocess_for_classification, PulseClass, PulseClassifier};
pub use config::PipelineConfig;
pub use detectors::*;
pub use error::{PulseError, Result};
pub use filter::{filter_signal, ChebyshevLowpass, LowpassSpec};
pub use metrics::*;
pub use pipeline::{analyze_recording, PulseRecord, RecordingAnalysis};
pub use signal::*;
pub use timebase::{convert_timebase, Timebase};
