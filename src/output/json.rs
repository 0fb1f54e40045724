//! JSON output formatter

use super::OutputFormatter;
use crate::engine::RunReport;
use crate::violation::Violation;
use serde::Serialize;

/// JSON formatter for machine-readable output
#[derive(Default)]
pub struct JsonFormatter {
    /// Pretty print with indentation
    pub pretty: bool,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    violations: Vec<JsonViolation<'a>>,
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonViolation<'a> {
    rule: &'a str,
    severity: String,
    file: String,
    line: usize,
    message: &'a str,
    recommendation: &'a str,
    automation_confidence: f64,
    #[serde(skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    metadata: &'a std::collections::BTreeMap<String, String>,
}

#[derive(Serialize)]
struct JsonSummary {
    files_processed: usize,
    files_with_violations: usize,
    critical: usize,
    high: usize,
    medium: usize,
    low: usize,
    automatable: usize,
    duration_ms: u128,
}

impl<'a> JsonViolation<'a> {
    fn from(v: &'a Violation) -> Self {
        Self {
            rule: &v.rule,
            severity: v.severity.to_string(),
            file: v.file.display().to_string(),
            line: v.line,
            message: &v.message,
            recommendation: &v.recommendation,
            automation_confidence: v.automation_confidence(),
            metadata: &v.metadata,
        }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, report: &RunReport) -> String {
        use crate::violation::Severity;

        let output = JsonOutput {
            violations: report.violations.iter().map(JsonViolation::from).collect(),
            summary: JsonSummary {
                files_processed: report.files_processed,
                files_with_violations: report.files_with_violations,
                critical: report.count(Severity::Critical),
                high: report.count(Severity::High),
                medium: report.count(Severity::Medium),
                low: report.count(Severity::Low),
                automatable: report.violations.automatable().len(),
                duration_ms: report.duration.as_millis(),
            },
        };

        if self.pretty {
            serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
        } else {
            serde_json::to_string(&output).unwrap_or_else(|_| "{}".to_string())
        }
    }

    fn format_violation(&self, violation: &Violation) -> String {
        serde_json::to_string(&JsonViolation::from(violation)).unwrap_or_else(|_| "{}".to_string())
    }
}
