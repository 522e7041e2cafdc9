use anyhow::{Context, Result};
use std::path::Path;

fn is_missing_token(token: &str) -> bool {
    token.is_empty()
        || token.eq_ignore_ascii_case("nan")
        || token.eq_ignore_ascii_case("na")
        || token.eq_ignore_ascii_case("null")
}

/// Parse a newline-delimited sample series. `nan`, `NA`, `null` and blank
/// lines are missing samples (NaN); lines starting with `#` are skipped.
pub fn parse_sample_series(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    // Trailing blank lines are not samples.
    for (idx, line) in text.trim_end().lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            continue;
        }
        if is_missing_token(trimmed) {
            out.push(f64::NAN);
            continue;
        }
        let val: f64 = trimmed
            .parse()
            .with_context(|| format!("line {} is not f64: {}", idx + 1, trimmed))?;
        out.push(val);
    }
    if out.iter().all(|v| v.is_nan()) {
        anyhow::bail!("no numeric samples found");
    }
    Ok(out)
}

/// Read a sample series from disk.
pub fn read_sample_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_sample_series(&text)
}

/// Render samples one per line; missing samples are written as `nan`.
pub fn format_sample_series(samples: &[f64]) -> String {
    let mut out = String::with_capacity(samples.len() * 12);
    for v in samples {
        if v.is_finite() {
            out.push_str(&v.to_string());
        } else {
            out.push_str("nan");
        }
        out.push('\n');
    }
    out
}
