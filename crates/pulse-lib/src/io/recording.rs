use crate::signal::Recording;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Default name of the timestamp column in monitor exports.
pub const DEFAULT_TIME_COLUMN: &str = "DateTime";

/// Load a recording from a CSV file with a header row.
///
/// `time_column` holds serial day numbers (days plus fraction of a day).
/// Every other column becomes a channel; empty or non-numeric cells are
/// stored as NaN and treated as missing downstream.
pub fn read_recording_csv(path: &Path, time_column: &str) -> Result<Recording> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_recording(file, time_column).with_context(|| format!("reading {}", path.display()))
}

/// Same as [`read_recording_csv`] for any reader.
pub fn read_recording<R: Read>(input: R, time_column: &str) -> Result<Recording> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(input);
    let headers = reader.headers().context("reading header")?.clone();
    let ts_idx = locate_column(&headers, time_column)?;

    let names: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != ts_idx)
        .map(|(idx, name)| (idx, name.to_string()))
        .collect();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    let mut timestamps = Vec::new();

    for (row, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("reading record {}", row + 1))?;
        let ts = record
            .get(ts_idx)
            .ok_or_else(|| anyhow::anyhow!("row {} has no timestamp", row + 1))?;
        let ts: f64 = ts
            .parse()
            .with_context(|| format!("row {}: timestamp {:?} is not numeric", row + 1, ts))?;
        timestamps.push(ts);
        for ((idx, _), column) in names.iter().zip(columns.iter_mut()) {
            column.push(parse_cell(record.get(*idx)));
        }
    }

    let channels: BTreeMap<String, Vec<f64>> = names
        .into_iter()
        .map(|(_, name)| name)
        .zip(columns)
        .collect();
    log::debug!(
        "loaded {} rows, channels: {:?}",
        timestamps.len(),
        channels.keys().collect::<Vec<_>>()
    );
    Ok(Recording {
        timestamps,
        channels,
    })
}

fn parse_cell(cell: Option<&str>) -> f64 {
    cell.and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(f64::NAN)
}

fn locate_column(headers: &StringRecord, requested: &str) -> Result<usize> {
    headers
        .iter()
        .position(|name| name.eq_ignore_ascii_case(requested))
        .ok_or_else(|| anyhow::anyhow!("missing timestamp column ({})", requested))
}
