use std::fmt::Write;

use crate::models::{BatchOutcome, DateAxis};

/// Render the run report: which participants succeeded, with their full
/// statistics, and which were skipped, with the specific reason.
pub fn build_report(source: &str, axis: &DateAxis, outcome: &BatchOutcome) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Garden LCA Weekly Report");
    match (axis.dates.first(), axis.dates.last()) {
        (Some(first), Some(last)) => {
            let _ = writeln!(
                output,
                "Generated from {} ({} observation weeks, {} to {})",
                source,
                axis.len(),
                first,
                last
            );
        }
        _ => {
            let _ = writeln!(output, "Generated from {} (no observation dates)", source);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Participants");

    if outcome.records.is_empty() {
        let _ = writeln!(output, "No participant records computed.");
    } else {
        for record in outcome.records.iter() {
            let _ = writeln!(output, "- {} ({})", record.participant, record.email);
            for (name, value) in record.stats.entries() {
                let _ = writeln!(output, "  - {}: {:.2}", name, value);
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Skipped Participants");

    if outcome.failures.is_empty() {
        let _ = writeln!(output, "None.");
    } else {
        for failure in outcome.failures.iter() {
            let _ = writeln!(output, "- {}: {}", failure.participant, failure.error);
        }
    }

    output
}
