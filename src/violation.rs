//! Violation types for analysis results

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Confidence threshold above which a violation is considered auto-fixable
pub const AUTOMATION_THRESHOLD: f64 = 0.8;

/// Severity level for violations
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Minor deviation, cosmetic impact
    Low,
    /// Worth fixing, no immediate risk
    #[default]
    Medium,
    /// Violates a core convention
    High,
    /// Actively harmful structure
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" | "info" => Ok(Severity::Low),
            "medium" | "warning" => Ok(Severity::Medium),
            "high" | "error" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(()),
        }
    }
}

/// A single architectural finding. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Rule that produced this violation
    pub rule: String,
    /// Severity level
    pub severity: Severity,
    /// File the violation was found in
    pub file: PathBuf,
    /// Line number (1-based, 0 = whole file)
    pub line: usize,
    /// Human-readable message
    pub message: String,
    /// Suggested remediation
    pub recommendation: String,
    /// Extra key/value context
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Estimated likelihood in [0,1] that an automated fix is safe
    automation_confidence: f64,
}

impl Violation {
    /// Create a new violation
    pub fn new(rule: &str, severity: Severity, message: &str, file: PathBuf, line: usize) -> Self {
        Self {
            rule: rule.to_string(),
            severity,
            file,
            line,
            message: message.to_string(),
            recommendation: String::new(),
            metadata: BTreeMap::new(),
            automation_confidence: 0.0,
        }
    }

    /// Set the remediation text
    pub fn with_recommendation(mut self, recommendation: &str) -> Self {
        self.recommendation = recommendation.to_string();
        self
    }

    /// Set the automation confidence, clamped to [0,1]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.automation_confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Automation confidence in [0,1]
    pub fn automation_confidence(&self) -> f64 {
        self.automation_confidence
    }

    /// Whether this violation qualifies as an auto-fix candidate
    pub fn is_automatable(&self) -> bool {
        self.automation_confidence >= AUTOMATION_THRESHOLD
    }
}

/// Ordered sequence of violations; the value crossing every component boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViolationCollection {
    items: Vec<Violation>,
}

impl ViolationCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of violations
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append a violation
    pub fn push(&mut self, violation: Violation) {
        self.items.push(violation);
    }

    /// Append all violations from another collection, preserving order
    pub fn merge(&mut self, other: ViolationCollection) {
        self.items.extend(other.items);
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.items.iter()
    }

    /// Return a copy sorted by severity descending; ties keep insertion order
    pub fn sorted_by_severity(&self) -> Self {
        let mut items = self.items.clone();
        items.sort_by(|a, b| b.severity.cmp(&a.severity));
        Self { items }
    }

    /// Return a copy sorted by rule name; ties keep insertion order
    pub fn sorted_by_rule(&self) -> Self {
        let mut items = self.items.clone();
        items.sort_by(|a, b| a.rule.cmp(&b.rule));
        Self { items }
    }

    /// Return a copy sorted by file path; ties keep insertion order
    pub fn sorted_by_file(&self) -> Self {
        let mut items = self.items.clone();
        items.sort_by(|a, b| a.file.cmp(&b.file));
        Self { items }
    }

    /// Violations with the given severity
    pub fn by_severity(&self, severity: Severity) -> Vec<&Violation> {
        self.items.iter().filter(|v| v.severity == severity).collect()
    }

    /// Violations produced by the given rule
    pub fn by_rule(&self, rule: &str) -> Vec<&Violation> {
        self.items.iter().filter(|v| v.rule == rule).collect()
    }

    /// Violations found in the given file
    pub fn by_file(&self, file: &Path) -> Vec<&Violation> {
        self.items.iter().filter(|v| v.file == file).collect()
    }

    /// Count of violations with the given severity
    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.items.iter().filter(|v| v.severity == severity).count()
    }

    /// Violations whose confidence meets the automation threshold
    pub fn automatable(&self) -> Vec<&Violation> {
        self.items
            .iter()
            .filter(|v| v.automation_confidence >= AUTOMATION_THRESHOLD)
            .collect()
    }
}

impl IntoIterator for ViolationCollection {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a ViolationCollection {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<Violation> for ViolationCollection {
    fn from_iter<T: IntoIterator<Item = Violation>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_violation(rule: &str, severity: Severity, line: usize) -> Violation {
        Violation::new(rule, severity, "test message", PathBuf::from("Test.swift"), line)
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!("low".parse::<Severity>(), Ok(Severity::Low));
        assert_eq!("medium".parse::<Severity>(), Ok(Severity::Medium));
        assert_eq!("HIGH".parse::<Severity>(), Ok(Severity::High));
        assert_eq!("critical".parse::<Severity>(), Ok(Severity::Critical));
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_confidence_clamped() {
        let v = make_violation("r", Severity::Low, 1).with_confidence(1.7);
        assert_eq!(v.automation_confidence(), 1.0);

        let v = make_violation("r", Severity::Low, 1).with_confidence(-0.3);
        assert_eq!(v.automation_confidence(), 0.0);
    }

    #[test]
    fn test_automation_threshold_boundary() {
        let included = make_violation("r", Severity::Medium, 1).with_confidence(0.85);
        let excluded = make_violation("r", Severity::Medium, 2).with_confidence(0.79);

        let mut collection = ViolationCollection::new();
        collection.push(included);
        collection.push(excluded);

        let automatable = collection.automatable();
        assert_eq!(automatable.len(), 1);
        assert_eq!(automatable[0].line, 1);
    }

    #[test]
    fn test_sort_by_severity_stable() {
        let mut collection = ViolationCollection::new();
        collection.push(make_violation("a", Severity::Low, 1));
        collection.push(make_violation("b", Severity::Critical, 2));
        collection.push(make_violation("c", Severity::High, 3));
        collection.push(make_violation("d", Severity::Critical, 4));
        collection.push(make_violation("e", Severity::Medium, 5));

        let sorted = collection.sorted_by_severity();
        let order: Vec<(Severity, usize)> = sorted.iter().map(|v| (v.severity, v.line)).collect();

        assert_eq!(
            order,
            vec![
                (Severity::Critical, 2),
                (Severity::Critical, 4),
                (Severity::High, 3),
                (Severity::Medium, 5),
                (Severity::Low, 1),
            ]
        );
    }

    #[test]
    fn test_sort_by_rule_and_file() {
        let mut collection = ViolationCollection::new();
        let mut b = make_violation("zeta", Severity::Low, 1);
        b.file = PathBuf::from("B.swift");
        collection.push(b);
        let mut a = make_violation("alpha", Severity::Low, 2);
        a.file = PathBuf::from("A.swift");
        collection.push(a);

        let sorted_by_rule = collection.sorted_by_rule();
        let by_rule: Vec<&str> = sorted_by_rule
            .iter()
            .map(|v| v.rule.as_str())
            .collect();
        assert_eq!(by_rule, vec!["alpha", "zeta"]);

        let by_file: Vec<usize> = collection.sorted_by_file().iter().map(|v| v.line).collect();
        assert_eq!(by_file, vec![2, 1]);
    }

    #[test]
    fn test_filters() {
        let mut collection = ViolationCollection::new();
        collection.push(make_violation("state-shape", Severity::High, 1));
        collection.push(make_violation("coupling", Severity::Low, 2));

        assert_eq!(collection.by_rule("state-shape").len(), 1);
        assert_eq!(collection.by_severity(Severity::Low).len(), 1);
        assert_eq!(collection.by_file(Path::new("Test.swift")).len(), 2);
        assert_eq!(collection.by_file(Path::new("Other.swift")).len(), 0);
        assert_eq!(collection.count_by_severity(Severity::High), 1);
    }

    #[test]
    fn test_merge_preserves_order() {
        let mut a = ViolationCollection::new();
        a.push(make_violation("r1", Severity::Low, 1));

        let mut b = ViolationCollection::new();
        b.push(make_violation("r2", Severity::Low, 2));

        a.merge(b);
        let lines: Vec<usize> = a.iter().map(|v| v.line).collect();
        assert_eq!(lines, vec![1, 2]);
    }
}
