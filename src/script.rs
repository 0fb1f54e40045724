//! Script rules loaded from definition files
//!
//! One definition file describes one rule: a target filter, a condition
//! expression, and a message template. The condition is compiled once at
//! load time; evaluation sees only the read-only query surface of a
//! [`SourceContext`] and a write-only [`ViolationSink`].
//!
//! Example (`massive-view.yaml`):
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

use crate::context::{DeclarationInfo, SourceContext};
use crate::parser::DeclarationKind;
use crate::rule::{Rule, RuleCategory, RuleDescriptor, RuleOrigin, RuleState, ViolationSink};
use crate::violation::{Severity, Violation, ViolationCollection};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Bridge schema version accepted by this build
const SUPPORTED_SCHEMA: &str = "1";

/// Error loading a rule definition
#[derive(Debug, Error)]
pub enum RuleLoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("invalid rule: {0}")]
    Invalid(String),
}

/// Definition file structure (one file = one rule)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScriptRuleFile {
    /// Bridge schema version this definition targets
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Rule name; falls back to the file stem
    #[serde(default)]
    pub rule: Option<String>,

    /// Category for grouping
    #[serde(default)]
    pub category: RuleCategory,

    /// Severity of produced violations
    #[serde(default)]
    pub severity: Severity,

    /// Automation confidence of produced violations
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    /// Rule version
    #[serde(default)]
    pub version: Option<String>,

    /// Which declarations the condition runs against
    #[serde(default)]
    pub target: Option<TargetDefinition>,

    /// Condition expression
    pub condition: String,

    /// Message template ({name}, {propertyCount}, ... placeholders)
    pub message: String,

    /// Suggested remediation
    #[serde(default)]
    pub recommendation: Option<String>,

    /// Extra key/value context attached to every violation
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn default_schema() -> String {
    SUPPORTED_SCHEMA.to_string()
}

fn default_confidence() -> f64 {
    0.5
}

/// Target specification in a definition file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TargetDefinition {
    /// Declaration kind (struct, class, enum, protocol, extension, function)
    #[serde(default)]
    pub kind: Option<String>,

    /// Declaration name pattern (supports `*` wildcards)
    #[serde(default)]
    pub name: Option<String>,
}

/// Declaration fields the condition language can reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Kind,
    Line,
    PropertyCount,
    MethodCount,
    CaseCount,
    LineCount,
}

impl Field {
    fn parse(ident: &str) -> Option<Self> {
        match ident {
            "name" => Some(Field::Name),
            "kind" => Some(Field::Kind),
            "line" => Some(Field::Line),
            "propertyCount" => Some(Field::PropertyCount),
            "methodCount" => Some(Field::MethodCount),
            "caseCount" => Some(Field::CaseCount),
            "lineCount" => Some(Field::LineCount),
            _ => None,
        }
    }

    /// Whether the field needs a declaration to evaluate
    fn is_declaration_scoped(&self) -> bool {
        !matches!(self, Field::LineCount)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

/// Compiled condition expression
#[derive(Debug)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        field: Field,
        op: CompareOp,
        value: f64,
    },
    TextEquals {
        field: Field,
        value: String,
        negated: bool,
    },
    TextMatches {
        field: Field,
        pattern: Regex,
    },
    SourceMatches(Regex),
}

impl Expr {
    /// Whether any part of the expression reads declaration fields
    fn is_declaration_scoped(&self) -> bool {
        match self {
            Expr::Or(a, b) | Expr::And(a, b) => {
                a.is_declaration_scoped() || b.is_declaration_scoped()
            }
            Expr::Not(inner) => inner.is_declaration_scoped(),
            Expr::Compare { field, .. }
            | Expr::TextEquals { field, .. }
            | Expr::TextMatches { field, .. } => field.is_declaration_scoped(),
            Expr::SourceMatches(_) => false,
        }
    }
}

/// A dynamically loaded rule
pub struct ScriptRule {
    descriptor: RuleDescriptor,
    target_kind: Option<DeclarationKind>,
    target_name: Option<Regex>,
    condition: Expr,
    /// True when the rule fires at most once per file instead of per declaration
    file_scoped: bool,
    message: String,
    recommendation: String,
    metadata: BTreeMap<String, String>,
}

impl ScriptRule {
    /// Load a rule from a YAML or JSON definition file
    pub fn load(path: &Path) -> Result<Self, RuleLoadError> {
        let content = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let definition: ScriptRuleFile = match ext {
            "yaml" | "yml" => {
                serde_yaml::from_str(&content).map_err(|e| RuleLoadError::Parse {
                    file: path.display().to_string(),
                    message: e.to_string(),
                })?
            }
            "json" => serde_json::from_str(&content).map_err(|e| RuleLoadError::Parse {
                file: path.display().to_string(),
                message: e.to_string(),
            })?,
            other => {
                return Err(RuleLoadError::Invalid(format!(
                    "unsupported definition format: {}",
                    other
                )))
            }
        };

        let fallback = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed");

        Self::from_definition(definition, fallback, RuleOrigin::Script(path.to_path_buf()))
    }

    /// Register a rule from an in-memory definition string.
    ///
    /// Behaves identically to a file-based definition; this is the seam a
    /// rule persistence store plugs into.
    pub fn from_source(fallback_name: &str, source: &str) -> Result<Self, RuleLoadError> {
        let definition: ScriptRuleFile =
            serde_yaml::from_str(source).map_err(|e| RuleLoadError::Parse {
                file: fallback_name.to_string(),
                message: e.to_string(),
            })?;
        let origin = RuleOrigin::Script(Path::new(fallback_name).to_path_buf());
        Self::from_definition(definition, fallback_name, origin)
    }

    fn from_definition(
        definition: ScriptRuleFile,
        fallback_name: &str,
        origin: RuleOrigin,
    ) -> Result<Self, RuleLoadError> {
        if definition.schema != SUPPORTED_SCHEMA {
            return Err(RuleLoadError::Invalid(format!(
                "unsupported schema version '{}' (expected '{}')",
                definition.schema, SUPPORTED_SCHEMA
            )));
        }

        let name = definition
            .rule
            .clone()
            .unwrap_or_else(|| fallback_name.to_string());
        if name.is_empty() {
            return Err(RuleLoadError::Invalid("rule name is empty".to_string()));
        }

        let condition = compile_condition(&definition.condition)
            .map_err(RuleLoadError::Invalid)?;

        let (target_kind, target_name) = match &definition.target {
            Some(target) => {
                let kind = target
                    .kind
                    .as_deref()
                    .map(|k| k.parse::<DeclarationKind>().map_err(RuleLoadError::Invalid))
                    .transpose()?;
                let name_re = target
                    .name
                    .as_deref()
                    .map(compile_wildcard)
                    .transpose()
                    .map_err(RuleLoadError::Invalid)?;
                (kind, name_re)
            }
            None => (None, None),
        };

        let file_scoped =
            !condition.is_declaration_scoped() && target_kind.is_none() && target_name.is_none();

        let mut descriptor = RuleDescriptor::new(&name, definition.category)
            .with_severity(definition.severity)
            .with_confidence(definition.confidence)
            .with_origin(origin);
        if let Some(version) = &definition.version {
            descriptor = descriptor.with_version(version);
        }
        descriptor.state = RuleState::Loaded;

        Ok(Self {
            descriptor,
            target_kind,
            target_name,
            condition,
            file_scoped,
            message: definition.message,
            recommendation: definition.recommendation.unwrap_or_default(),
            metadata: definition.metadata,
        })
    }

    fn matches_target(&self, decl: &DeclarationInfo) -> bool {
        if let Some(kind) = self.target_kind {
            if decl.kind != kind {
                return false;
            }
        }
        if let Some(re) = &self.target_name {
            if !re.is_match(&decl.name) {
                return false;
            }
        }
        true
    }

    fn emit(&self, sink: &mut ViolationSink, ctx: &SourceContext, decl: Option<&DeclarationInfo>) {
        let mut violation = Violation::new(
            self.name(),
            self.descriptor.severity,
            &format_message(&self.message, ctx, decl),
            ctx.path().to_path_buf(),
            decl.map_or(0, |d| d.line),
        )
        .with_recommendation(&self.recommendation)
        .with_confidence(self.descriptor.confidence);

        for (key, value) in &self.metadata {
            violation = violation.with_metadata(key, value);
        }

        sink.emit(violation);
    }
}

impl Rule for ScriptRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn validate(&self, ctx: &SourceContext) -> ViolationCollection {
        let mut sink = ViolationSink::new();

        if self.file_scoped {
            if evaluate(&self.condition, ctx, None) {
                self.emit(&mut sink, ctx, None);
            }
        } else {
            for decl in ctx.declarations(self.target_kind) {
                if !self.matches_target(&decl) {
                    continue;
                }
                if evaluate(&self.condition, ctx, Some(&decl)) {
                    self.emit(&mut sink, ctx, Some(&decl));
                }
            }
        }

        sink.into_collection()
    }
}

/// Compile a wildcard pattern (`*View`) into an anchored regex
fn compile_wildcard(pattern: &str) -> Result<Regex, String> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*").replace(r"\?", ".");
    Regex::new(&format!("^{}$", escaped))
        .map_err(|e| format!("invalid name pattern '{}': {}", pattern, e))
}

/// Compile a condition expression into an expression tree
fn compile_condition(condition: &str) -> Result<Expr, String> {
    let condition = condition.trim();
    if condition.is_empty() {
        return Err("condition is empty".to_string());
    }

    if let Some(idx) = find_logical_operator(condition, "||") {
        let left = compile_condition(&condition[..idx])?;
        let right = compile_condition(&condition[idx + 2..])?;
        return Ok(Expr::Or(Box::new(left), Box::new(right)));
    }

    if let Some(idx) = find_logical_operator(condition, "&&") {
        let left = compile_condition(&condition[..idx])?;
        let right = compile_condition(&condition[idx + 2..])?;
        return Ok(Expr::And(Box::new(left), Box::new(right)));
    }

    if let Some(rest) = condition.strip_prefix('!') {
        if !rest.starts_with('=') {
            return Ok(Expr::Not(Box::new(compile_condition(rest)?)));
        }
    }

    if condition.starts_with('(') && closing_paren(condition) == Some(condition.len() - 1) {
        return compile_condition(&condition[1..condition.len() - 1]);
    }

    compile_atom(condition)
}

/// Compile a single comparison
fn compile_atom(atom: &str) -> Result<Expr, String> {
    if let Some(idx) = atom.find("=~") {
        let lhs = atom[..idx].trim();
        let raw = atom[idx + 2..].trim().trim_matches('/');
        let pattern =
            Regex::new(raw).map_err(|e| format!("invalid regex in condition: {}", e))?;

        if lhs == "source" {
            return Ok(Expr::SourceMatches(pattern));
        }
        let field = Field::parse(lhs).ok_or_else(|| format!("unknown field '{}'", lhs))?;
        return Ok(Expr::TextMatches { field, pattern });
    }

    // Two-character operators first so ">=" is not read as ">".
    for (token, op) in [
        (">=", CompareOp::Ge),
        ("<=", CompareOp::Le),
        ("==", CompareOp::Eq),
        ("!=", CompareOp::Ne),
        (">", CompareOp::Gt),
        ("<", CompareOp::Lt),
    ] {
        if let Some(idx) = atom.find(token) {
            let lhs = atom[..idx].trim();
            let rhs = atom[idx + token.len()..].trim();
            let field = Field::parse(lhs).ok_or_else(|| format!("unknown field '{}'", lhs))?;

            if let Ok(value) = rhs.parse::<f64>() {
                return Ok(Expr::Compare { field, op, value });
            }

            let text = rhs.trim_matches('"').trim_matches('\'').to_string();
            return match op {
                CompareOp::Eq => Ok(Expr::TextEquals {
                    field,
                    value: text,
                    negated: false,
                }),
                CompareOp::Ne => Ok(Expr::TextEquals {
                    field,
                    value: text,
                    negated: true,
                }),
                _ => Err(format!(
                    "ordering comparison against non-numeric value '{}'",
                    rhs
                )),
            };
        }
    }

    Err(format!("unsupported condition: '{}'", atom))
}

/// Find an operator position outside any parentheses
fn find_logical_operator(s: &str, op: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let op_bytes = op.as_bytes();
    let mut depth = 0usize;

    for i in 0..bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if depth == 0 && bytes[i..].starts_with(op_bytes) && i > 0 {
            return Some(i);
        }
    }

    None
}

/// Index of the paren closing the one at position 0
fn closing_paren(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, ch) in s.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn field_number(field: Field, ctx: &SourceContext, decl: Option<&DeclarationInfo>) -> Option<f64> {
    match field {
        Field::Line => decl.map(|d| d.line as f64),
        Field::PropertyCount => decl.map(|d| d.property_count as f64),
        Field::MethodCount => decl.map(|d| d.method_count as f64),
        Field::CaseCount => decl.map(|d| d.case_count as f64),
        Field::LineCount => Some(ctx.file_metadata().line_count as f64),
        Field::Name | Field::Kind => None,
    }
}

fn field_text(field: Field, ctx: &SourceContext, decl: Option<&DeclarationInfo>) -> Option<String> {
    match field {
        Field::Name => decl.map(|d| d.name.clone()),
        Field::Kind => decl.map(|d| d.kind.to_string()),
        _ => field_number(field, ctx, decl).map(|n| (n as usize).to_string()),
    }
}

fn evaluate(expr: &Expr, ctx: &SourceContext, decl: Option<&DeclarationInfo>) -> bool {
    match expr {
        Expr::Or(a, b) => evaluate(a, ctx, decl) || evaluate(b, ctx, decl),
        Expr::And(a, b) => evaluate(a, ctx, decl) && evaluate(b, ctx, decl),
        Expr::Not(inner) => !evaluate(inner, ctx, decl),
        Expr::Compare { field, op, value } => match field_number(*field, ctx, decl) {
            Some(actual) => match op {
                CompareOp::Gt => actual > *value,
                CompareOp::Ge => actual >= *value,
                CompareOp::Lt => actual < *value,
                CompareOp::Le => actual <= *value,
                CompareOp::Eq => actual == *value,
                CompareOp::Ne => actual != *value,
            },
            None => false,
        },
        Expr::TextEquals {
            field,
            value,
            negated,
        } => match field_text(*field, ctx, decl) {
            Some(actual) => (actual == *value) != *negated,
            None => *negated,
        },
        Expr::TextMatches { field, pattern } => field_text(*field, ctx, decl)
            .is_some_and(|actual| pattern.is_match(&actual)),
        Expr::SourceMatches(pattern) => pattern.is_match(ctx.raw_source_text()),
    }
}

/// Fill message template placeholders from the evaluation scope
fn format_message(template: &str, ctx: &SourceContext, decl: Option<&DeclarationInfo>) -> String {
    let meta = ctx.file_metadata();
    let mut message = template
        .replace("{file}", &meta.name)
        .replace("{lineCount}", &meta.line_count.to_string());

    if let Some(d) = decl {
        message = message
            .replace("{name}", &d.name)
            .replace("{kind}", &d.kind.to_string())
            .replace("{line}", &d.line.to_string())
            .replace("{propertyCount}", &d.property_count.to_string())
            .replace("{methodCount}", &d.method_count.to_string())
            .replace("{caseCount}", &d.case_count.to_string());
    }

    message
}
