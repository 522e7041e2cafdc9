pub mod onset;

pub use onset::{
    detect_peaks, segment, PulseSegmenter, PulseTimes, SegmenterConfig, Segmentation, TimeMode,
};
