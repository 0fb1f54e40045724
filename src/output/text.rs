//! Human-readable text output formatter

use super::OutputFormatter;
use crate::engine::RunReport;
use crate::violation::{Severity, Violation};
use colored::*;

/// Text formatter with optional color support
pub struct TextFormatter {
    /// Enable colored output
    pub colored: bool,

    /// Show recommendations
    pub show_recommendations: bool,

    /// Show statistics
    pub show_stats: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            colored: true,
            show_recommendations: true,
            show_stats: true,
        }
    }
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable colors
    pub fn without_color(mut self) -> Self {
        self.colored = false;
        self
    }

    fn severity_str(&self, severity: Severity) -> ColoredString {
        let s = format!("{}", severity);
        if !self.colored {
            return s.normal();
        }
        match severity {
            Severity::Critical => s.red().bold(),
            Severity::High => s.red(),
            Severity::Medium => s.yellow(),
            Severity::Low => s.blue(),
        }
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, report: &RunReport) -> String {
        let mut output = String::new();
        let mut current_file: Option<&std::path::Path> = None;

        for violation in report.violations.iter() {
            if current_file != Some(violation.file.as_path()) {
                if current_file.is_some() {
                    output.push('\n');
                }
                let header = violation.file.display().to_string();
                if self.colored {
                    output.push_str(&format!("{}\n", header.underline()));
                } else {
                    output.push_str(&format!("{}\n", header));
                }
                current_file = Some(violation.file.as_path());
            }

            output.push_str(&self.format_violation(violation));
            output.push('\n');
        }

        if self.show_stats {
            if !report.violations.is_empty() {
                output.push('\n');
            }

            let mut counts = Vec::new();
            for severity in [
                Severity::Critical,
                Severity::High,
                Severity::Medium,
                Severity::Low,
            ] {
                let count = report.count(severity);
                if count > 0 {
                    counts.push(format!("{} {}", count, severity));
                }
            }

            output.push_str(&format!(
                "{} {} processed",
                report.files_processed,
                if report.files_processed == 1 {
                    "file"
                } else {
                    "files"
                }
            ));

            if counts.is_empty() {
                output.push_str(", no violations\n");
            } else {
                output.push_str(&format!(", {}\n", counts.join(", ")));
            }

            let automatable = report.violations.automatable().len();
            if automatable > 0 {
                output.push_str(&format!("{} auto-fix candidates\n", automatable));
            }
        }

        output
    }

    fn format_violation(&self, violation: &Violation) -> String {
        let location = if violation.line > 0 {
            format!("{}", violation.line)
        } else {
            "-".to_string()
        };

        let mut line = format!(
            "  {:>5}  {} [{}] {}",
            location,
            self.severity_str(violation.severity),
            violation.rule,
            violation.message
        );

        if self.show_recommendations && !violation.recommendation.is_empty() {
            line.push_str(&format!("\n      help: {}", violation.recommendation));
        }

        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn report_with(violations: Vec<Violation>) -> RunReport {
        let mut report = RunReport {
            files_processed: 1,
            ..RunReport::default()
        };
        for v in violations {
            report.violations.push(v);
        }
        report
    }

    #[test]
    fn test_plain_output_contains_rule_and_message() {
        let report = report_with(vec![Violation::new(
            "state-shape",
            Severity::High,
            "struct 'State' holds 16 stored properties (limit: 15)",
            PathBuf::from("App/State.swift"),
            3,
        )]);

        let output = TextFormatter::new().without_color().format(&report);
        assert!(output.contains("App/State.swift"));
        assert!(output.contains("[state-shape]"));
        assert!(output.contains("16 stored properties"));
    }

    #[test]
    fn test_clean_report_summary() {
        let report = report_with(vec![]);
        let output = TextFormatter::new().without_color().format(&report);
        assert!(output.contains("no violations"));
    }

    #[test]
    fn test_recommendation_shown() {
        let report = report_with(vec![Violation::new(
            "coupling",
            Severity::Medium,
            "too many imports",
            PathBuf::from("A.swift"),
            0,
        )
        .with_recommendation("Route shared dependencies through a facade module")]);

        let output = TextFormatter::new().without_color().format(&report);
        assert!(output.contains("help: Route shared dependencies"));
    }
}
