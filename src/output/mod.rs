//! Output formatters for validation reports

mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::engine::RunReport;
use crate::violation::Violation;

/// Output formatter trait
pub trait OutputFormatter: Send + Sync {
    /// Format the entire report
    fn format(&self, report: &RunReport) -> String;

    /// Format a single violation
    fn format_violation(&self, violation: &Violation) -> String;
}
