//! Result output
//!
//! - `text`: console report printed by the coordinator
//! - `csv`: point and centroid files
//! - `json`: machine-readable run report

pub mod csv;
pub mod json;
pub mod text;

pub use text::print_results;

use crate::coordinator::RunReport;
use crate::stats::RunStats;
use crate::Result;
use anyhow::Context;

/// Print the results and write every configured output file
pub fn write_outputs(report: &RunReport, mode: &str) -> Result<()> {
    let stats = RunStats::from_history(&report.outcome.history).context("Failed to summarize rounds")?;
    let output = &report.config.output;

    print_results(&report.outcome, &stats, output.show_rounds);

    if let Some(ref path) = output.centroids_csv {
        csv::write_centroids(path, &report.outcome.centroids)?;
        println!("Centroids written to: {}", path.display());
    }

    if let Some(ref path) = output.json_output {
        let json = json::build_report(
            &report.config,
            mode,
            report.world_size,
            report.points_per_worker,
            &report.outcome,
            &stats,
        );
        json::write_json_output(path, &json)?;
        println!("JSON report written to: {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::coordinator::LocalCoordinator;

    #[test]
    fn test_write_outputs_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.clustering.total_points = 200;
        config.clustering.dim = 2;
        config.clustering.k = 3;
        config.clustering.max_rounds = 3;
        config.workers.count = 2;
        config.output.centroids_csv = Some(dir.path().join("centroids.csv"));
        config.output.json_output = Some(dir.path().join("report.json"));

        let report = LocalCoordinator::new(config).run().unwrap();
        write_outputs(&report, "local").unwrap();

        let (dim, values) = csv::read_points(&dir.path().join("centroids.csv")).unwrap();
        assert_eq!(dim, 2);
        assert_eq!(values.len(), 6);

        let text = std::fs::read_to_string(dir.path().join("report.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["run"]["mode"], "local");
        assert_eq!(json["rounds"], 3);
        assert_eq!(json["centroids"].as_array().unwrap().len(), 3);
    }
}
