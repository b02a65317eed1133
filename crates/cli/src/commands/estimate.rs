//! `estimate` command implementation.

use anyhow::{Context, Result};
use ingestion::read_signal_csv;
use serde::Serialize;
use sync_engine::{compare_recordings, EstimatorConfig, SignalDelayEstimator};
use tracing::info;

use crate::cli::EstimateArgs;
use crate::error::CliError;

/// Estimation result for JSON output
#[derive(Debug, Serialize)]
struct EstimateReport {
    samples: usize,
    delay_seconds: f64,
    step_seconds: f64,
    lag_steps: i64,
    mean_diff_seconds: f64,
    offset_ns: i64,
    sync_accuracy_ns: i64,
}

/// Execute the `estimate` command
pub fn run_estimate(args: &EstimateArgs) -> Result<()> {
    let report = estimate(args)?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialize estimate")?;
        println!("{json}");
    } else {
        println!("Samples compared: {}", report.samples);
        println!(
            "Delay: {:.6} s ({} steps of {:.6} s)",
            report.delay_seconds, report.lag_steps, report.step_seconds
        );
        println!("Mean timestamp difference: {:.6} s", report.mean_diff_seconds);
        println!(
            "Offset: {} ns (±{} ns)",
            report.offset_ns, report.sync_accuracy_ns
        );
    }
    Ok(())
}

fn estimate(args: &EstimateArgs) -> Result<EstimateReport> {
    let client = read_signal_csv(&args.client)
        .with_context(|| format!("Failed to read {}", args.client.display()))?;
    let leader = read_signal_csv(&args.leader)
        .with_context(|| format!("Failed to read {}", args.leader.display()))?;
    info!(
        client = client.len(),
        leader = leader.len(),
        "Recordings loaded"
    );

    let estimator = SignalDelayEstimator::new(EstimatorConfig {
        resample: !args.no_resample,
        resample_rate_hz: args.rate_hz,
        max_lag_seconds: args.max_lag,
    });
    let (client_len, leader_len) = (client.len(), leader.len());
    let comparison =
        compare_recordings(&estimator, client, leader).ok_or(CliError::NoEstimate {
            client: client_len,
            leader: leader_len,
        })?;
    let result = comparison.to_result();

    Ok(EstimateReport {
        samples: comparison.samples,
        delay_seconds: comparison.estimate.delay_seconds,
        step_seconds: comparison.estimate.step_seconds,
        lag_steps: comparison.estimate.lag_steps,
        mean_diff_seconds: comparison.mean_diff_seconds,
        offset_ns: result.offset_ns,
        sync_accuracy_ns: result.sync_accuracy_ns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use contracts::SignalSeries;
    use ingestion::write_signal_csv;

    fn write_trace(path: &Path, start: f64, lag: f64) {
        let mut series = SignalSeries::new();
        for n in 0..300 {
            let x = n as f64 - lag;
            let bump = |c: f64, w: f64| (-((x - c) / w).powi(2)).exp();
            series.push(
                start + n as f64 * 0.01,
                [bump(100.0, 8.0), -bump(150.0, 12.0), 0.5 * bump(190.0, 6.0)],
            );
        }
        write_signal_csv(path, &series).unwrap();
    }

    fn args(client: &Path, leader: &Path) -> EstimateArgs {
        EstimateArgs {
            client: client.to_path_buf(),
            leader: leader.to_path_buf(),
            no_resample: true,
            rate_hz: 1.0,
            max_lag: None,
            json: true,
        }
    }

    #[test]
    fn test_estimate_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let client = dir.path().join("client.csv");
        let leader = dir.path().join("leader.csv");
        write_trace(&client, 50.0, 0.0);
        write_trace(&leader, 51.0, 4.0);

        let report = estimate(&args(&client, &leader)).unwrap();
        assert_eq!(report.samples, 300);
        assert!((report.delay_seconds - 0.04).abs() < 1e-3);
        assert!((report.offset_ns + 1_040_000_000).abs() < 1_000_000);
    }

    #[test]
    fn test_empty_recording_has_no_estimate() {
        let dir = tempfile::tempdir().unwrap();
        let client = dir.path().join("client.csv");
        let leader = dir.path().join("leader.csv");
        std::fs::write(&client, "").unwrap();
        write_trace(&leader, 0.0, 0.0);

        let err = estimate(&args(&client, &leader)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::NoEstimate { client: 0, .. })
        ));
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.csv");
        assert!(estimate(&args(&missing, &missing)).is_err());
    }
}
