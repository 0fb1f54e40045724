//! Archon - Architecture Linter for Swift-style codebases
//!
//! Statically analyzes source files against architectural conventions
//! (state/action shape, view complexity, coupling) and reports violations
//! with severity and automated-fix confidence.
//!
//! # Architecture
//!
//! ```text
//! CLI/API -> Engine -> (Cache <-> Parser) -> SourceContext -> Rule -> ViolationCollection
//! ```
//!
//! Rules come in two shapes behind one trait: native rules compiled into
//! the binary with typed threshold configs, and script rules loaded from
//! one-rule definition files. Both see only the read-only query surface of
//! a [`SourceContext`](context::SourceContext) and emit into a private
//! violation sink, so one misbehaving rule can never poison a run.
//!
//! # Writing a script rule
//!
//! Drop a YAML file into a rule pack directory (e.g. `.archon/rules/`):
//!
//! ```yaml
//! rule: massive-view
//! category: view
//! severity: high
//! confidence: 0.6
//! target:
//!   kind: struct
//!   name: "*View"
//! condition: "propertyCount > 10 || methodCount > 8"
//! message: "view '{name}' is carrying too much ({propertyCount} properties)"
//! recommendation: "Split into child views"
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod discover;
pub mod engine;
pub mod output;
pub mod parser;
pub mod registry;
pub mod rule;
pub mod rules;
pub mod script;
pub mod violation;

// Re-export main types
pub use cache::{CacheStats, ParseCache};
pub use config::Config;
pub use context::{DeclarationInfo, FileMetadata, SourceContext};
pub use engine::{CancelToken, Engine, RuleTiming, RunReport};
pub use output::{JsonFormatter, OutputFormatter, TextFormatter};
pub use parser::{DeclarationKind, ParseError, SourceParser, StructuralParser, SyntaxTree};
pub use registry::{LoadFailure, RuleRegistry};
pub use rule::{Rule, RuleCategory, RuleDescriptor, RuleOrigin, RuleState, ViolationSink};
pub use script::{RuleLoadError, ScriptRule};
pub use violation::{Severity, Violation, ViolationCollection, AUTOMATION_THRESHOLD};
