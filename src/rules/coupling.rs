//! Module coupling checks

use crate::context::SourceContext;
use crate::rule::{Rule, RuleCategory, RuleDescriptor, ViolationSink};
use crate::violation::{Severity, Violation, ViolationCollection};
use serde::{Deserialize, Serialize};

/// Thresholds for coupling checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CouplingConfig {
    /// Maximum imports per file
    pub max_imports: usize,

    /// Modules that must not be imported (e.g. UIKit inside a SwiftUI layer)
    pub forbidden_imports: Vec<String>,
}

impl Default for CouplingConfig {
    fn default() -> Self {
        Self {
            max_imports: 12,
            forbidden_imports: Vec::new(),
        }
    }
}

/// Flags files that reach into too many or forbidden modules
pub struct CouplingRule {
    config: CouplingConfig,
    descriptor: RuleDescriptor,
}

impl CouplingRule {
    pub fn new(config: CouplingConfig) -> Self {
        Self {
            config,
            descriptor: RuleDescriptor::new("coupling", RuleCategory::Coupling)
                .with_severity(Severity::Medium)
                .with_confidence(0.6),
        }
    }
}

impl Default for CouplingRule {
    fn default() -> Self {
        Self::new(CouplingConfig::default())
    }
}

impl Rule for CouplingRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn validate(&self, ctx: &SourceContext) -> ViolationCollection {
        let mut sink = ViolationSink::new();
        let file = ctx.path().to_path_buf();
        let imports = ctx.imports();

        if imports.len() > self.config.max_imports {
            sink.emit(
                Violation::new(
                    self.name(),
                    Severity::Medium,
                    &format!(
                        "file imports {} modules (limit: {})",
                        imports.len(),
                        self.config.max_imports
                    ),
                    file.clone(),
                    0,
                )
                .with_recommendation("Route shared dependencies through a facade module")
                .with_confidence(0.6),
            );
        }

        for import in imports {
            if self.config.forbidden_imports.contains(import) {
                sink.emit(
                    Violation::new(
                        self.name(),
                        Severity::High,
                        &format!("forbidden import '{}'", import),
                        file.clone(),
                        0,
                    )
                    .with_recommendation("Remove the import and depend on an abstraction")
                    .with_confidence(0.85)
                    .with_metadata("module", import),
                );
            }
        }

        sink.into_collection()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::StructuralParser;
    use std::path::Path;

    fn context(source: &str) -> SourceContext {
        SourceContext::parse(Path::new("Feature.swift"), source, &StructuralParser::new()).unwrap()
    }

    #[test]
    fn test_too_many_imports() {
        let rule = CouplingRule::new(CouplingConfig {
            max_imports: 2,
            ..CouplingConfig::default()
        });
        let ctx = context("import A\nimport B\nimport C\n");

        let violations = rule.validate(&ctx);
        assert_eq!(violations.len(), 1);
        assert!(violations.iter().next().unwrap().message.contains("3"));
    }

    #[test]
    fn test_forbidden_import_is_automatable() {
        let rule = CouplingRule::new(CouplingConfig {
            forbidden_imports: vec!["UIKit".to_string()],
            ..CouplingConfig::default()
        });
        let ctx = context("import SwiftUI\nimport UIKit\n");

        let violations = rule.validate(&ctx);
        assert_eq!(violations.len(), 1);

        let v = violations.iter().next().unwrap();
        assert_eq!(v.severity, Severity::High);
        assert!(v.is_automatable());
    }

    #[test]
    fn test_within_budget_is_clean() {
        let rule = CouplingRule::default();
        let ctx = context("import SwiftUI\n\nstruct S {\n}\n");
        assert!(rule.validate(&ctx).is_empty());
    }
}
