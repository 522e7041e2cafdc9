use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::error::Error;
use std::path::PathBuf;

#[test]
fn timebase_reports_sampling_frequency() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.args([
        "timebase",
        "--input",
        &sample_path("test_data/abp_sample.csv"),
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let summary: Value = serde_json::from_slice(&output)?;

    assert_eq!(summary.get("fs").and_then(Value::as_f64), Some(100.0));
    assert_eq!(summary.get("samples").and_then(Value::as_u64), Some(1000));
    let duration = summary
        .get("duration_s")
        .and_then(Value::as_f64)
        .unwrap_or_default();
    assert!((duration - 9.99).abs() < 1e-3, "duration {}", duration);
    assert_eq!(summary["channels"], serde_json::json!(["abp", "icp"]));
    Ok(())
}

#[test]
fn timebase_rejects_missing_time_column() {
    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.args([
        "timebase",
        "--input",
        &sample_path("test_data/abp_sample.csv"),
        "--time-column",
        "Timestamp",
    ]);
    let output = cmd.assert().failure().get_output().stderr.clone();
    assert!(String::from_utf8_lossy(&output).contains("Timestamp"));
}

fn sample_path(relative: &str) -> String {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .join(relative);
    root.to_string_lossy().to_string()
}
