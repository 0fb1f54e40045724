//! View layer complexity checks

use crate::context::SourceContext;
use crate::parser::DeclarationKind;
use crate::rule::{Rule, RuleCategory, RuleDescriptor, ViolationSink};
use crate::violation::{Severity, Violation, ViolationCollection};
use serde::{Deserialize, Serialize};

/// Thresholds for view complexity checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewComplexityConfig {
    /// Maximum stored properties allowed on a view struct
    pub max_view_properties: usize,

    /// Maximum methods allowed on a view struct
    pub max_view_methods: usize,

    /// Maximum lines for a file containing views
    pub max_file_lines: usize,

    /// Suffix identifying view structs
    pub view_suffix: String,
}

impl Default for ViewComplexityConfig {
    fn default() -> Self {
        Self {
            max_view_properties: 12,
            max_view_methods: 8,
            max_file_lines: 400,
            view_suffix: "View".to_string(),
        }
    }
}

/// Flags views carrying too much state or behavior
pub struct ViewComplexityRule {
    config: ViewComplexityConfig,
    descriptor: RuleDescriptor,
}

impl ViewComplexityRule {
    pub fn new(config: ViewComplexityConfig) -> Self {
        Self {
            config,
            descriptor: RuleDescriptor::new("view-complexity", RuleCategory::View)
                .with_severity(Severity::Medium)
                .with_confidence(0.5),
        }
    }
}

impl Default for ViewComplexityRule {
    fn default() -> Self {
        Self::new(ViewComplexityConfig::default())
    }
}

impl Rule for ViewComplexityRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn validate(&self, ctx: &SourceContext) -> ViolationCollection {
        let mut sink = ViolationSink::new();
        let file = ctx.path().to_path_buf();

        let views: Vec<_> = ctx
            .declarations(Some(DeclarationKind::Struct))
            .into_iter()
            .filter(|d| d.name.ends_with(&self.config.view_suffix))
            .collect();

        for decl in &views {
            if decl.property_count > self.config.max_view_properties {
                sink.emit(
                    Violation::new(
                        self.name(),
                        Severity::Medium,
                        &format!(
                            "view '{}' holds {} properties (limit: {})",
                            decl.name, decl.property_count, self.config.max_view_properties
                        ),
                        file.clone(),
                        decl.line,
                    )
                    .with_recommendation(
                        "Move state into a model object and pass it in",
                    )
                    .with_confidence(0.5),
                );
            }

            if decl.method_count > self.config.max_view_methods {
                sink.emit(
                    Violation::new(
                        self.name(),
                        Severity::Medium,
                        &format!(
                            "view '{}' defines {} methods (limit: {})",
                            decl.name, decl.method_count, self.config.max_view_methods
                        ),
                        file.clone(),
                        decl.line,
                    )
                    .with_recommendation("Extract helpers into extensions or child views")
                    .with_confidence(0.4),
                );
            }
        }

        // File-size check only applies to files that contain views at all.
        if let Some(first) = views.first() {
            let line_count = ctx.file_metadata().line_count;
            if line_count > self.config.max_file_lines {
                sink.emit(
                    Violation::new(
                        self.name(),
                        Severity::High,
                        &format!(
                            "file spans {} lines with view code (limit: {})",
                            line_count, self.config.max_file_lines
                        ),
                        file.clone(),
                        first.line,
                    )
                    .with_recommendation("Split child views into their own files")
                    .with_confidence(0.3),
                );
            }
        }

        sink.into_collection()
    }
}
