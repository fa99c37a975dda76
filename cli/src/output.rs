//! Console output formatting

use crate::simulate::SimulationReport;
use colored::Colorize;
use quorum_domain::{
    Classification, ConfigIssue, SelectionResult, Severity, TopologyViolation, VoteIntentRecord,
};

/// Formats command results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Human-readable summary of a selection
    pub fn format_selection(result: &SelectionResult) -> String {
        let mut output = String::new();
        output.push_str(&Self::header("Quorum Selection"));
        output.push('\n');

        output.push_str(&format!(
            "{} {} (index {} of {})\n",
            "Selected:".cyan().bold(),
            result.selected.candidate_id.green().bold(),
            result.selection_index,
            result.sorted_candidate_ids.len()
        ));
        output.push_str(&format!(
            "{} {}\n",
            "Candidates:".cyan().bold(),
            result.sorted_candidate_ids.join(", ")
        ));

        output.push_str(&Self::section_header("Divergence"));
        output.push_str(&format!(
            "  disagreement score: {:.3}\n  source dispersion:  {:.3}\n",
            result.divergence.disagreement_score, result.divergence.source_dispersion
        ));

        output.push_str(&Self::section_header("Provider Mix"));
        for provider in &result.provider_mix {
            output.push_str(&format!("  {:<24} {}\n", provider.provider_id, provider.count));
        }

        output.push_str(&Self::footer());
        output
    }

    /// Result of a visibility check
    pub fn format_write_check(path: &str, result: &Result<Classification, TopologyViolation>) -> String {
        match result {
            Ok(classification) => format!(
                "{} {} is {}\n",
                "allowed:".green().bold(),
                path,
                classification.to_string().bold()
            ),
            Err(violation) => format!("{} {}\n", "rejected:".red().bold(), violation),
        }
    }

    /// Pending intents, one per line
    pub fn format_queue(records: &[VoteIntentRecord]) -> String {
        if records.is_empty() {
            return format!("{}\n", "Queue is empty".dimmed());
        }

        let mut output = format!(
            "{}\n",
            format!("{} pending intent(s)", records.len()).cyan().bold()
        );
        for record in records {
            output.push_str(&format!(
                "  {:<16} seq={:<6} {:<10} {:<8} w={:<6} {}\n",
                record.intent_id,
                record.seq,
                record.voter_id,
                record.agreement.to_string(),
                record.weight,
                record.point_key()
            ));
        }
        output
    }

    /// Outcome of a simulation run
    pub fn format_simulation(report: &SimulationReport) -> String {
        let mut output = String::new();
        output.push_str(&Self::header("Mesh Simulation"));
        output.push('\n');

        output.push_str(&format!(
            "{} {} intent(s) across {} peer(s)\n",
            "Script:".cyan().bold(),
            report.intents,
            report.peers
        ));
        output.push_str(&format!(
            "{} {} projected, {} failed attempt(s), {} rejected, {} still pending\n",
            "Replay:".cyan().bold(),
            report.replay.replayed,
            report.replay.failed,
            report.replay.rejected,
            report.pending
        ));
        output.push_str(&format!(
            "{} {} read(s), {} write(s), {} unacknowledged\n",
            "Mesh:".cyan().bold(),
            report.mesh.reads,
            report.mesh.writes,
            report.mesh.unacked_writes
        ));

        for point in &report.points {
            let aggregate = &point.aggregate;
            output.push_str(&Self::section_header(&format!("Point {}", aggregate.point_id)));
            output.push_str(&format!(
                "  agree {}  disagree {}  participants {}  weight {:.3}\n",
                aggregate.agree.to_string().green(),
                aggregate.disagree.to_string().red(),
                aggregate.participants,
                aggregate.weight
            ));
            match &point.snapshot {
                Some(snapshot) => output.push_str(&format!(
                    "  snapshot v{}  window {}..{}\n",
                    snapshot.version, snapshot.source_window.from_seq, snapshot.source_window.to_seq
                )),
                None => output.push_str(&format!("  {}\n", "no snapshot".dimmed())),
            }
        }

        output.push_str(&Self::footer());
        output
    }

    /// Configuration issues, errors first
    pub fn format_issues(issues: &[ConfigIssue]) -> String {
        let mut sorted: Vec<&ConfigIssue> = issues.iter().collect();
        sorted.sort_by_key(|issue| !issue.is_error());
        sorted
            .iter()
            .map(|issue| match issue.severity {
                Severity::Error => format!("{} {}\n", "error:".red().bold(), issue.message),
                Severity::Warning => format!("{} {}\n", "warning:".yellow().bold(), issue.message),
            })
            .collect()
    }

    /// Format any serializable value as JSON
    pub fn format_json<T: serde::Serialize>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}
