//! JSON run report
//!
//! Written by the coordinator after a successful run. Contains the
//! configuration, the final centroids, the per-round history, and a timing
//! summary.

use crate::cluster::{ClusterOutcome, RoundSummary};
use crate::config::Config;
use crate::stats::{RunStats, TimingSummary};
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        let micros = d.as_micros() as u64;
        let human = format_duration_human(d);
        Self { micros, human }
    }
}

/// Who ran, when, and where
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRunInfo {
    pub tool: String,
    pub version: String,
    /// RFC 3339 UTC time the report was written
    pub timestamp: String,
    pub hostname: Option<String>,
    /// "local" or "distributed"
    pub mode: String,
    /// Workers including the coordinator
    pub world_size: usize,
    /// Points each worker owned
    pub points_per_worker: usize,
}

/// One round of the history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRound {
    pub round: usize,
    pub assigned: u64,
    pub empty_clusters: usize,
    pub max_shift: f64,
    pub duration: JsonDuration,
}

impl From<&RoundSummary> for JsonRound {
    fn from(summary: &RoundSummary) -> Self {
        Self {
            round: summary.round,
            assigned: summary.assigned,
            empty_clusters: summary.empty_clusters,
            max_shift: summary.max_shift,
            duration: JsonDuration::from_duration(summary.duration),
        }
    }
}

/// Complete JSON report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub run: JsonRunInfo,
    pub config: Config,
    pub rounds: usize,
    pub elapsed: JsonDuration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_times: Option<TimingSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_shift: Option<f64>,
    pub rounds_with_empty_clusters: usize,
    /// Final centroids, one array of `dim` values per cluster
    pub centroids: Vec<Vec<f64>>,
    pub history: Vec<JsonRound>,
}

/// Build the report for a coordinator outcome
pub fn build_report(
    config: &Config,
    mode: &str,
    world_size: usize,
    points_per_worker: usize,
    outcome: &ClusterOutcome,
    stats: &RunStats,
) -> JsonReport {
    let hostname = hostname::get().ok().and_then(|h| h.into_string().ok());

    JsonReport {
        run: JsonRunInfo {
            tool: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            hostname,
            mode: mode.to_string(),
            world_size,
            points_per_worker,
        },
        config: config.clone(),
        rounds: outcome.rounds,
        elapsed: JsonDuration::from_duration(outcome.elapsed),
        round_times: stats.timing_summary(),
        final_shift: stats.final_shift(),
        rounds_with_empty_clusters: stats.rounds_with_empty_clusters(),
        centroids: outcome.centroids.centroids().map(|c| c.to_vec()).collect(),
        history: outcome.history.iter().map(JsonRound::from).collect(),
    }
}

/// Write the report to `path` as pretty-printed JSON
pub fn write_json_output(path: &Path, report: &JsonReport) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .with_context(|| format!("Failed to write JSON report to {}", path.display()))?;
    Ok(())
}

/// Format duration in human-readable format
fn format_duration_human(d: Duration) -> String {
    let micros = d.as_micros() as u64;

    if micros == 0 {
        return "0µs".to_string();
    }

    if micros < 1000 {
        format!("{}µs", micros)
    } else if micros < 1_000_000 {
        format!("{:.3}ms", micros as f64 / 1000.0)
    } else if micros < 60_000_000 {
        format!("{:.3}s", micros as f64 / 1_000_000.0)
    } else if micros < 3_600_000_000 {
        format!("{:.2}m", micros as f64 / 60_000_000.0)
    } else {
        format!("{:.2}h", micros as f64 / 3_600_000_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::CentroidSet;

    fn outcome() -> ClusterOutcome {
        ClusterOutcome {
            rank: 0,
            centroids: CentroidSet::from_values(2, 2, vec![0.1, 0.2, 0.8, 0.9]).unwrap(),
            rounds: 2,
            elapsed: Duration::from_millis(1500),
            history: vec![
                RoundSummary {
                    round: 0,
                    assigned: 40,
                    empty_clusters: 1,
                    max_shift: 0.25,
                    duration: Duration::from_millis(700),
                },
                RoundSummary {
                    round: 1,
                    assigned: 40,
                    empty_clusters: 0,
                    max_shift: 0.0,
                    duration: Duration::from_millis(800),
                },
            ],
        }
    }

    #[test]
    fn test_format_duration_human() {
        assert_eq!(format_duration_human(Duration::ZERO), "0µs");
        assert_eq!(format_duration_human(Duration::from_micros(250)), "250µs");
        assert_eq!(format_duration_human(Duration::from_micros(1500)), "1.500ms");
        assert_eq!(format_duration_human(Duration::from_millis(2500)), "2.500s");
        assert_eq!(format_duration_human(Duration::from_secs(90)), "1.50m");
    }

    #[test]
    fn test_build_report() {
        let outcome = outcome();
        let stats = RunStats::from_history(&outcome.history).unwrap();
        let report = build_report(&Config::default(), "local", 4, 10, &outcome, &stats);

        assert_eq!(report.run.tool, "dkmeans");
        assert_eq!(report.run.world_size, 4);
        assert_eq!(report.rounds, 2);
        assert_eq!(report.centroids, vec![vec![0.1, 0.2], vec![0.8, 0.9]]);
        assert_eq!(report.history.len(), 2);
        assert_eq!(report.rounds_with_empty_clusters, 1);
        assert_eq!(report.final_shift, Some(0.0));
        assert!(report.round_times.is_some());
        assert!(chrono::DateTime::parse_from_rfc3339(&report.run.timestamp).is_ok());
    }

    #[test]
    fn test_write_json_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        let outcome = outcome();
        let stats = RunStats::from_history(&outcome.history).unwrap();
        let report = build_report(&Config::default(), "distributed", 3, 333, &outcome, &stats);

        write_json_output(&path, &report).unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["run"]["mode"], "distributed");
        assert_eq!(value["config"]["clustering"]["k"], 20);
        assert_eq!(value["history"][0]["empty_clusters"], 1);
        assert_eq!(value["elapsed"]["micros"], 1_500_000);
    }
}
