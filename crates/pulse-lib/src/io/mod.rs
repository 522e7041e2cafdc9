pub mod recording;
pub mod text;

pub use recording::{read_recording, read_recording_csv, DEFAULT_TIME_COLUMN};
pub use text::{format_sample_series, parse_sample_series, read_sample_series};
