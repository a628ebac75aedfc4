//! Human-readable text output

use crate::cluster::ClusterOutcome;
use crate::stats::RunStats;

/// Print the coordinator's results to the console
///
/// Displays:
/// - Final centroids, one line per cluster
/// - Rounds completed and elapsed time
/// - Round time percentiles
/// - Per-round history (if `show_rounds`)
pub fn print_results(outcome: &ClusterOutcome, stats: &RunStats, show_rounds: bool) {
    println!("═══════════════════════════════════════════════════════════");
    println!("                    CLUSTERING RESULTS");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    println!("Final Centroids:");
    for (cluster, centroid) in outcome.centroids.centroids().enumerate() {
        println!("  Centroid {}: {}", cluster, format_point(centroid));
    }
    println!();

    println!("Rounds: {}", outcome.rounds);
    println!("Elapsed Time: {:.3}s", outcome.elapsed.as_secs_f64());
    if outcome.rounds > 0 {
        println!(
            "Time per Round: {:.3}ms",
            outcome.elapsed.as_secs_f64() * 1000.0 / outcome.rounds as f64
        );
    }
    println!();

    if let Some(timing) = stats.timing_summary() {
        println!("Round Time:");
        println!("  Min:  {:.3}ms", timing.min_ms);
        println!("  Mean: {:.3}ms", timing.mean_ms);
        println!("  p50:  {:.3}ms", timing.p50_ms);
        println!("  p99:  {:.3}ms", timing.p99_ms);
        println!("  Max:  {:.3}ms", timing.max_ms);
        println!();
    }

    println!("Convergence:");
    match stats.final_shift() {
        Some(shift) => println!("  Final max shift: {:.6}", shift),
        None => println!("  Final max shift: n/a"),
    }
    match stats.last_moving_round() {
        Some(round) => println!("  Last round with movement: {}", round),
        None => println!("  Last round with movement: none"),
    }
    if stats.rounds_with_empty_clusters() > 0 {
        println!(
            "  Rounds with empty clusters: {} (max {} empty)",
            stats.rounds_with_empty_clusters(),
            stats.max_empty_clusters()
        );
    }

    if show_rounds && !outcome.history.is_empty() {
        println!();
        println!("Round History:");
        println!("  {:>6}  {:>12}  {:>6}  {:>12}  {:>10}", "round", "assigned", "empty", "max_shift", "time_ms");
        for summary in &outcome.history {
            println!(
                "  {:>6}  {:>12}  {:>6}  {:>12.6}  {:>10.3}",
                summary.round,
                summary.assigned,
                summary.empty_clusters,
                summary.max_shift,
                summary.duration.as_secs_f64() * 1000.0
            );
        }
    }

    println!();
    println!("═══════════════════════════════════════════════════════════");
}

/// Coordinates with six decimals, space separated
fn format_point(point: &[f64]) -> String {
    point
        .iter()
        .map(|v| format!("{:.6}", v))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_point() {
        assert_eq!(format_point(&[0.5, 1.0 / 3.0]), "0.500000 0.333333");
        assert_eq!(format_point(&[]), "");
    }
}
