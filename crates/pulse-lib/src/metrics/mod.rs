pub mod features;

pub use features::{extract_features, PulseFeatureSet, PulseFeatures};
