//! Final-metrics extraction from the trainer's `results.csv`.
//!
//! The external trainer owns metric computation and writes one CSV row per
//! epoch into the experiment directory. Only the last row matters for the
//! registry; a missing or unreadable file is not an error.

use std::collections::HashMap;
use std::path::Path;

/// Parse the numeric columns of the final row of `results.csv`.
///
/// Returns `None` when the file is missing, unreadable, or has no data rows.
/// Non-numeric cells are skipped; the trainer pads columns with whitespace,
/// so headers and values are trimmed.
pub fn final_metrics(results_csv: &Path) -> Option<HashMap<String, f64>> {
    let content = match std::fs::read_to_string(results_csv) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(path = %results_csv.display(), error = %e, "no results.csv");
            return None;
        }
    };

    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let header: Vec<&str> = lines.next()?.split(',').map(str::trim).collect();
    let last: Vec<&str> = lines.last()?.split(',').map(str::trim).collect();

    let metrics: HashMap<String, f64> = header
        .iter()
        .zip(&last)
        .filter_map(|(name, value)| {
            value
                .parse::<f64>()
                .ok()
                .map(|v| ((*name).to_string(), v))
        })
        .collect();

    if metrics.is_empty() { None } else { Some(metrics) }
}
