//! State and action shape conventions

use crate::context::SourceContext;
use crate::parser::DeclarationKind;
use crate::rule::{Rule, RuleCategory, RuleDescriptor, ViolationSink};
use crate::violation::{Severity, Violation, ViolationCollection};
use serde::{Deserialize, Serialize};

/// Thresholds for state/action shape checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateShapeConfig {
    /// Maximum stored properties allowed on a state struct
    pub max_state_properties: usize,

    /// Maximum cases allowed on an action enum
    pub max_action_cases: usize,

    /// Suffix identifying state structs
    pub state_suffix: String,

    /// Suffix identifying action enums
    pub action_suffix: String,
}

impl Default for StateShapeConfig {
    fn default() -> Self {
        Self {
            max_state_properties: 15,
            max_action_cases: 20,
            state_suffix: "State".to_string(),
            action_suffix: "Action".to_string(),
        }
    }
}

/// Flags state structs and action enums that have grown past their budgets
pub struct StateShapeRule {
    config: StateShapeConfig,
    descriptor: RuleDescriptor,
}

impl StateShapeRule {
    pub fn new(config: StateShapeConfig) -> Self {
        Self {
            config,
            descriptor: RuleDescriptor::new("state-shape", RuleCategory::State)
                .with_severity(Severity::High)
                .with_confidence(0.9),
        }
    }
}

impl Default for StateShapeRule {
    fn default() -> Self {
        Self::new(StateShapeConfig::default())
    }
}

impl Rule for StateShapeRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn validate(&self, ctx: &SourceContext) -> ViolationCollection {
        let mut sink = ViolationSink::new();
        let file = ctx.path().to_path_buf();

        for decl in ctx.declarations(Some(DeclarationKind::Struct)) {
            if !decl.name.ends_with(&self.config.state_suffix) {
                continue;
            }
            if decl.property_count > self.config.max_state_properties {
                sink.emit(
                    Violation::new(
                        self.name(),
                        Severity::High,
                        &format!(
                            "struct '{}' holds {} stored properties (limit: {})",
                            decl.name, decl.property_count, self.config.max_state_properties
                        ),
                        file.clone(),
                        decl.line,
                    )
                    .with_recommendation(
                        "Group related fields into nested sub-state structs",
                    )
                    .with_confidence(0.9)
                    .with_metadata("property_count", &decl.property_count.to_string())
                    .with_metadata("limit", &self.config.max_state_properties.to_string()),
                );
            }
        }

        for decl in ctx.declarations(Some(DeclarationKind::Enum)) {
            if !decl.name.ends_with(&self.config.action_suffix) {
                continue;
            }
            if decl.case_count > self.config.max_action_cases {
                sink.emit(
                    Violation::new(
                        self.name(),
                        Severity::Medium,
                        &format!(
                            "enum '{}' defines {} cases (limit: {})",
                            decl.name, decl.case_count, self.config.max_action_cases
                        ),
                        file.clone(),
                        decl.line,
                    )
                    .with_recommendation("Split into feature-scoped action enums")
                    .with_confidence(0.7)
                    .with_metadata("case_count", &decl.case_count.to_string()),
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
        SourceContext::parse(Path::new("App.swift"), source, &StructuralParser::new()).unwrap()
    }

    fn state_struct(property_count: usize) -> String {
        let props: String = (0..property_count)
            .map(|i| format!("    var field{}: Int\n", i))
            .collect();
        format!("struct State {{\n{}}}\n", props)
    }

    #[test]
    fn test_state_over_budget_yields_one_high_violation() {
        let rule = StateShapeRule::default();
        let ctx = context(&state_struct(16));

        let violations = rule.validate(&ctx);
        assert_eq!(violations.len(), 1);

        let v = violations.iter().next().unwrap();
        assert_eq!(v.severity, Severity::High);
        assert!(v.message.contains("16"), "message was: {}", v.message);
    }

    #[test]
    fn test_state_at_limit_is_clean() {
        let rule = StateShapeRule::default();
        let ctx = context(&state_struct(15));
        assert!(rule.validate(&ctx).is_empty());
    }

    #[test]
    fn test_non_state_struct_ignored() {
        let rule = StateShapeRule::default();
        let props: String = (0..30).map(|i| format!("    var f{}: Int\n", i)).collect();
        let ctx = context(&format!("struct Helpers {{\n{}}}\n", props));
        assert!(rule.validate(&ctx).is_empty());
    }

    #[test]
    fn test_action_enum_over_budget() {
        let rule = StateShapeRule::new(StateShapeConfig {
            max_action_cases: 3,
            ..StateShapeConfig::default()
        });
        let ctx = context(
            "enum AppAction {\n    case a\n    case b\n    case c\n    case d\n}\n",
        );

        let violations = rule.validate(&ctx);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations.iter().next().unwrap().severity, Severity::Medium);
    }
}
