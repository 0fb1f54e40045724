//! Rule definition and the uniform validation contract

use crate::context::SourceContext;
use crate::violation::{Severity, Violation, ViolationCollection};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Rule category for grouping related rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    /// State and action shape conventions
    State,
    /// View layer complexity
    View,
    /// Module and type coupling
    Coupling,
    /// Naming and idiom conventions
    Style,
    /// Everything else
    #[default]
    General,
}

impl std::fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleCategory::State => write!(f, "state"),
            RuleCategory::View => write!(f, "view"),
            RuleCategory::Coupling => write!(f, "coupling"),
            RuleCategory::Style => write!(f, "style"),
            RuleCategory::General => write!(f, "general"),
        }
    }
}

impl std::str::FromStr for RuleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "state" => Ok(RuleCategory::State),
            "view" => Ok(RuleCategory::View),
            "coupling" => Ok(RuleCategory::Coupling),
            "style" => Ok(RuleCategory::Style),
            "general" => Ok(RuleCategory::General),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

/// Lifecycle state of a registered rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleState {
    /// Known but not yet compiled
    #[default]
    Unloaded,
    /// Compiled, not yet part of the active set
    Loaded,
    /// Participates in validation runs
    Active,
    /// Explicitly switched off; survives reloads
    Deactivated,
    /// Definition could not be compiled
    LoadFailed,
}

impl std::fmt::Display for RuleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleState::Unloaded => write!(f, "unloaded"),
            RuleState::Loaded => write!(f, "loaded"),
            RuleState::Active => write!(f, "active"),
            RuleState::Deactivated => write!(f, "deactivated"),
            RuleState::LoadFailed => write!(f, "load-failed"),
        }
    }
}

/// Where a rule's implementation comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleOrigin {
    /// Compiled into the binary
    Native,
    /// Loaded from a definition file
    Script(PathBuf),
}

impl std::fmt::Display for RuleOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleOrigin::Native => write!(f, "native"),
            RuleOrigin::Script(path) => write!(f, "script:{}", path.display()),
        }
    }
}

/// Metadata describing one registered rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDescriptor {
    /// Unique rule name (e.g. "state-shape")
    pub name: String,
    /// Category for grouping
    pub category: RuleCategory,
    /// Default severity of produced violations
    pub severity: Severity,
    /// Default automation confidence of produced violations
    pub confidence: f64,
    /// Rule version
    pub version: String,
    /// Implementation origin
    pub origin: RuleOrigin,
    /// Current lifecycle state
    pub state: RuleState,
}

impl RuleDescriptor {
    /// Create a descriptor with defaults
    pub fn new(name: &str, category: RuleCategory) -> Self {
        Self {
            name: name.to_string(),
            category,
            severity: Severity::Medium,
            confidence: 0.5,
            version: "1.0.0".to_string(),
            origin: RuleOrigin::Native,
            state: RuleState::Unloaded,
        }
    }

    /// Set the default severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Set the default confidence, clamped to [0,1]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Set the version
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Set the origin
    pub fn with_origin(mut self, origin: RuleOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Check if the rule participates in validation runs
    pub fn is_active(&self) -> bool {
        self.state == RuleState::Active
    }
}

/// Write-only sink handed to a rule invocation.
///
/// Each invocation owns a private sink; its contents are merged into the
/// aggregate only after the rule returns.
#[derive(Debug, Default)]
pub struct ViolationSink {
    collected: ViolationCollection,
}

impl ViolationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finding
    pub fn emit(&mut self, violation: Violation) {
        self.collected.push(violation);
    }

    /// Consume the sink, yielding everything emitted in order
    pub fn into_collection(self) -> ViolationCollection {
        self.collected
    }
}

/// Unit of analysis producing zero or more violations from one file.
///
/// Implementations must be stateless pure functions of the context:
/// identical input yields identical output regardless of scheduling.
pub trait Rule: Send + Sync {
    /// Metadata for this rule
    fn descriptor(&self) -> &RuleDescriptor;

    /// Unique rule name
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Run the rule against one file
    fn validate(&self, ctx: &SourceContext) -> ViolationCollection;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_builder() {
        let desc = RuleDescriptor::new("massive-state", RuleCategory::State)
            .with_severity(Severity::High)
            .with_confidence(0.9)
            .with_version("2.1.0");

        assert_eq!(desc.name, "massive-state");
        assert_eq!(desc.category, RuleCategory::State);
        assert_eq!(desc.severity, Severity::High);
        assert_eq!(desc.confidence, 0.9);
        assert_eq!(desc.version, "2.1.0");
        assert_eq!(desc.origin, RuleOrigin::Native);
    }

    #[test]
    fn test_descriptor_confidence_clamped() {
        let desc = RuleDescriptor::new("r", RuleCategory::General).with_confidence(3.0);
        assert_eq!(desc.confidence, 1.0);
    }

    #[test]
    fn test_category_round_trip() {
        for cat in [
            RuleCategory::State,
            RuleCategory::View,
            RuleCategory::Coupling,
            RuleCategory::Style,
            RuleCategory::General,
        ] {
            assert_eq!(cat.to_string().parse::<RuleCategory>(), Ok(cat));
        }
        assert!("bogus".parse::<RuleCategory>().is_err());
    }

    #[test]
    fn test_sink_preserves_order() {
        use std::path::PathBuf;

        let mut sink = ViolationSink::new();
        sink.emit(Violation::new(
            "r",
            Severity::Low,
            "first",
            PathBuf::from("a.swift"),
            1,
        ));
        sink.emit(Violation::new(
            "r",
            Severity::High,
            "second",
            PathBuf::from("a.swift"),
            2,
        ));

        let collected = sink.into_collection();
        let messages: Vec<&str> = collected.iter().map(|v| v.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
    }
}
