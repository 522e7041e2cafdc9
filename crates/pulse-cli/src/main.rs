use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pulse_lib::{
    classify::{CommandClassifier, PulseClassifier},
    config::PipelineConfig,
    detectors::{PulseSegmenter, PulseTimes, TimeMode},
    filter::{lowpass, LowpassSpec},
    io::{recording as recording_io, text as text_io},
    metrics::extract_features,
    pipeline::analyze_recording,
    signal::Recording,
    timebase::{convert_timebase, Timebase},
};
use serde::Serialize;
use std::{
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "pulse",
    version,
    about = "Pulse waveform segmentation, features and classification"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RecordingArgs {
    /// CSV recording with a header row
    #[arg(long)]
    input: PathBuf,
    /// Name of the timestamp column (serial day numbers)
    #[arg(long, default_value = recording_io::DEFAULT_TIME_COLUMN)]
    time_column: String,
    /// Treat timestamps as time of day within a single day
    #[arg(long)]
    single_day: bool,
}

impl RecordingArgs {
    fn load(&self) -> Result<(Recording, Timebase)> {
        let recording = recording_io::read_recording_csv(&self.input, &self.time_column)?;
        let timebase = convert_timebase(&recording.timestamps, !self.single_day)
            .with_context(|| format!("building timebase for {}", self.input.display()))?;
        Ok((recording, timebase))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Report sampling frequency and duration of a CSV recording
    Timebase {
        #[command(flatten)]
        recording: RecordingArgs,
    },
    /// Zero-phase Chebyshev lowpass of newline-delimited samples from stdin or --input
    Filter {
        #[arg(long)]
        fs: f64,
        #[arg(long, default_value_t = 10.0)]
        cutoff_hz: f64,
        #[arg(long, default_value_t = 8)]
        order: usize,
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Detect pulse onsets in one channel
    Segment {
        #[command(flatten)]
        recording: RecordingArgs,
        #[arg(long)]
        channel: String,
        /// Report one mean time per pulse instead of per-sample times
        #[arg(long)]
        mean_time: bool,
    },
    /// Per-pulse mean, amplitude and slope of one channel
    Features {
        #[command(flatten)]
        recording: RecordingArgs,
        #[arg(long)]
        channel: String,
    },
    /// Full pipeline: timebase, lowpass, segmentation, features, classification
    Analyze {
        #[command(flatten)]
        recording: RecordingArgs,
        #[arg(long)]
        channel: String,
        /// TOML pipeline configuration; flags override its values
        #[arg(long)]
        config: Option<PathBuf>,
        /// Executable that labels batches of preprocessed pulses
        #[arg(long)]
        classifier_cmd: Option<PathBuf>,
        #[arg(long = "classifier-arg", allow_hyphen_values = true)]
        classifier_args: Vec<String>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        no_filter: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Timebase { recording } => cmd_timebase(&recording)?,
        Commands::Filter {
            fs,
            cutoff_hz,
            order,
            input,
        } => cmd_filter(fs, cutoff_hz, order, input.as_deref())?,
        Commands::Segment {
            recording,
            channel,
            mean_time,
        } => cmd_segment(&recording, &channel, mean_time)?,
        Commands::Features { recording, channel } => cmd_features(&recording, &channel)?,
        Commands::Analyze {
            recording,
            channel,
            config,
            classifier_cmd,
            classifier_args,
            batch_size,
            no_filter,
        } => cmd_analyze(
            &recording,
            &channel,
            config.as_deref(),
            classifier_cmd,
            classifier_args,
            batch_size,
            no_filter,
        )?,
    }
    Ok(())
}

fn read_samples(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => text_io::read_sample_series(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text_io::parse_sample_series(&buf)
        }
    }
}

#[derive(Serialize)]
struct TimebaseSummary {
    fs: f64,
    samples: usize,
    duration_s: f64,
    channels: Vec<String>,
}

fn cmd_timebase(args: &RecordingArgs) -> Result<()> {
    let (recording, timebase) = args.load()?;
    let summary = TimebaseSummary {
        fs: timebase.fs,
        samples: timebase.time.len(),
        duration_s: timebase.duration(),
        channels: recording.channel_names().map(str::to_string).collect(),
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn cmd_filter(fs: f64, cutoff_hz: f64, order: usize, input: Option<&Path>) -> Result<()> {
    let samples = read_samples(input)?;
    let filtered = lowpass(&samples, fs, &LowpassSpec::new(order, cutoff_hz))?;
    let mut stdout = io::stdout().lock();
    stdout.write_all(text_io::format_sample_series(&filtered).as_bytes())?;
    Ok(())
}

#[derive(Serialize)]
struct SegmentSummary {
    fs: f64,
    pulse_count: usize,
    onsets: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mean_times: Option<Vec<f64>>,
}

fn cmd_segment(args: &RecordingArgs, channel: &str, mean_time: bool) -> Result<()> {
    let (recording, timebase) = args.load()?;
    let mode = if mean_time {
        TimeMode::Mean
    } else {
        TimeMode::Segments
    };
    let seg = PulseSegmenter::default().split_pulses(
        recording.channel(channel)?,
        &timebase.time,
        timebase.fs,
        mode,
    )?;
    let mean_times = match seg.times {
        PulseTimes::Means(means) => Some(means),
        PulseTimes::Segments(_) => None,
    };
    let summary = SegmentSummary {
        fs: timebase.fs,
        pulse_count: seg.pulses.len(),
        onsets: seg.onsets,
        mean_times,
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn cmd_features(args: &RecordingArgs, channel: &str) -> Result<()> {
    let (recording, timebase) = args.load()?;
    let seg = PulseSegmenter::default().split_pulses(
        recording.channel(channel)?,
        &timebase.time,
        timebase.fs,
        TimeMode::Segments,
    )?;
    let PulseTimes::Segments(times) = &seg.times else {
        anyhow::bail!("segmenter returned mean times for a per-sample request");
    };
    let features = extract_features(&seg.pulses, times);
    println!("{}", serde_json::to_string(&features)?);
    Ok(())
}

fn cmd_analyze(
    args: &RecordingArgs,
    channel: &str,
    config: Option<&Path>,
    classifier_cmd: Option<PathBuf>,
    classifier_args: Vec<String>,
    batch_size: Option<usize>,
    no_filter: bool,
) -> Result<()> {
    let mut cfg = match config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(batch_size) = batch_size {
        cfg.batch_size = batch_size;
    }
    if no_filter {
        cfg.skip_filter = true;
    }
    if args.single_day {
        cfg.multi_day = false;
    }

    let recording = recording_io::read_recording_csv(&args.input, &args.time_column)?;
    let mut command =
        classifier_cmd.map(|program| CommandClassifier::new(program).args(classifier_args));
    let classifier = command.as_mut().map(|c| c as &mut dyn PulseClassifier);
    let analysis = analyze_recording(&recording, channel, &cfg, classifier)
        .with_context(|| format!("analyzing channel {} of {}", channel, args.input.display()))?;
    println!("{}", serde_json::to_string(&analysis)?);
    Ok(())
}
