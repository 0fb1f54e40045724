//! Structural source parsing
//!
//! The engine only depends on the narrow [`SourceParser`] capability; the
//! built-in [`StructuralParser`] is a line-oriented scanner for Swift-style
//! source. It extracts declarations and member counts without attempting
//! semantic analysis.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error during parsing
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unbalanced braces, body opened near line {line} never closes")]
    UnbalancedBraces { line: usize },

    #[error("unexpected closing brace at line {line}")]
    UnexpectedClose { line: usize },

    #[error("invalid source: {0}")]
    Invalid(String),
}

/// Kind of a source declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Struct,
    Class,
    Enum,
    Protocol,
    Extension,
    Function,
}

impl std::fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeclarationKind::Struct => write!(f, "struct"),
            DeclarationKind::Class => write!(f, "class"),
            DeclarationKind::Enum => write!(f, "enum"),
            DeclarationKind::Protocol => write!(f, "protocol"),
            DeclarationKind::Extension => write!(f, "extension"),
            DeclarationKind::Function => write!(f, "function"),
        }
    }
}

impl std::str::FromStr for DeclarationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "struct" => Ok(DeclarationKind::Struct),
            "class" => Ok(DeclarationKind::Class),
            "enum" => Ok(DeclarationKind::Enum),
            "protocol" => Ok(DeclarationKind::Protocol),
            "extension" => Ok(DeclarationKind::Extension),
            "function" | "func" => Ok(DeclarationKind::Function),
            _ => Err(format!("Unknown declaration kind: {}", s)),
        }
    }
}

/// A declaration found in source
#[derive(Debug, Clone)]
pub struct Declaration {
    /// Kind of declaration
    pub kind: DeclarationKind,
    /// Declared name
    pub name: String,
    /// Line the declaration starts on (1-based)
    pub line: usize,
    /// Stored property names (member level only)
    pub properties: Vec<String>,
    /// Method names (member level only)
    pub methods: Vec<String>,
    /// Enum case names
    pub cases: Vec<String>,
}

impl Declaration {
    fn new(kind: DeclarationKind, name: &str, line: usize) -> Self {
        Self {
            kind,
            name: name.to_string(),
            line,
            properties: Vec::new(),
            methods: Vec::new(),
            cases: Vec::new(),
        }
    }
}

/// Parsed representation of one source file
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    declarations: Vec<Declaration>,
    imports: Vec<String>,
    source: String,
    line_count: usize,
}

impl SyntaxTree {
    /// Declarations in source order
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// Imported module names in source order
    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    /// The raw source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of lines in the source
    pub fn line_count(&self) -> usize {
        self.line_count
    }
}

/// The narrow parsing capability the engine depends on
pub trait SourceParser: Send + Sync {
    fn parse(&self, source: &str) -> Result<SyntaxTree, ParseError>;
}

static DECL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:^|\s)(struct|class|enum|protocol|extension)\s+([A-Za-z_][A-Za-z0-9_]*)",
    )
    .unwrap()
});

static FUNC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)func\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());

static PROPERTY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\s)(?:let|var)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});

static CASE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*case\s+(.+)$").unwrap());

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*import\s+([A-Za-z_][A-Za-z0-9_.]*)").unwrap()
});

static CASE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// Line-oriented structural scanner for Swift-style source
#[derive(Debug, Default)]
pub struct StructuralParser;

impl StructuralParser {
    pub fn new() -> Self {
        Self
    }
}

/// A declaration currently open during the scan
struct OpenDeclaration {
    index: usize,
    /// Depth of the declaration body; members sit exactly at this depth
    body_depth: usize,
}

impl SourceParser for StructuralParser {
    fn parse(&self, source: &str) -> Result<SyntaxTree, ParseError> {
        let mut declarations: Vec<Declaration> = Vec::new();
        let mut imports: Vec<String> = Vec::new();
        let mut stack: Vec<OpenDeclaration> = Vec::new();
        let mut depth: usize = 0;
        let mut last_open_line = 0;
        let mut line_count = 0;

        for (i, raw_line) in source.lines().enumerate() {
            let line_num = i + 1;
            line_count = line_num;
            let line = strip_noise(raw_line);
            let trimmed = line.trim();

            if let Some(cap) = IMPORT_RE.captures(trimmed) {
                if depth == 0 {
                    imports.push(cap[1].to_string());
                }
            }

            // Member-level scan happens at the depth of the innermost open body,
            // before this line's own braces are applied.
            let member = stack.last().map(|open| (open.index, open.body_depth));

            if let Some(cap) = DECL_RE.captures(&line) {
                let kind: DeclarationKind = cap[1].parse().map_err(ParseError::Invalid)?;
                declarations.push(Declaration::new(kind, &cap[2], line_num));
                if line.contains('{') {
                    stack.push(OpenDeclaration {
                        index: declarations.len() - 1,
                        body_depth: depth + 1,
                    });
                }
            } else if let Some((index, body_depth)) = member {
                if depth == body_depth {
                    let decl = &mut declarations[index];

                    if let Some(cap) = FUNC_RE.captures(&line) {
                        decl.methods.push(cap[1].to_string());
                    } else if decl.kind == DeclarationKind::Enum {
                        if let Some(cap) = CASE_RE.captures(&line) {
                            for part in split_cases(&cap[1]) {
                                if let Some(name) = CASE_NAME_RE.captures(part.trim()) {
                                    decl.cases.push(name[1].to_string());
                                }
                            }
                        }
                    } else if let Some(cap) = PROPERTY_RE.captures(&line) {
                        decl.properties.push(cap[1].to_string());
                    }
                }
            } else if depth == 0 {
                if let Some(cap) = FUNC_RE.captures(&line) {
                    declarations.push(Declaration::new(
                        DeclarationKind::Function,
                        &cap[1],
                        line_num,
                    ));
                }
            }

            for ch in line.chars() {
                match ch {
                    '{' => {
                        depth += 1;
                        last_open_line = line_num;
                    }
                    '}' => {
                        if depth == 0 {
                            return Err(ParseError::UnexpectedClose { line: line_num });
                        }
                        depth -= 1;
                        while stack.last().is_some_and(|open| depth < open.body_depth) {
                            stack.pop();
                        }
                    }
                    _ => {}
                }
            }
        }

        if depth != 0 {
            return Err(ParseError::UnbalancedBraces {
                line: last_open_line,
            });
        }

        Ok(SyntaxTree {
            declarations,
            imports,
            source: source.to_string(),
            line_count,
        })
    }
}

/// Split an enum case list on commas outside parentheses, so associated
/// values like `pair(Int, Int)` stay in one piece.
fn split_cases(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Drop line comments and string literal contents so braces inside them
/// do not skew depth tracking.
fn strip_noise(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    let mut in_string = false;

    while let Some(ch) = chars.next() {
        if in_string {
            match ch {
                '\\' => {
                    chars.next();
                }
                '"' => {
                    in_string = false;
                    out.push('"');
                }
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                out.push('"');
            }
            '/' if chars.peek() == Some(&'/') => break,
            _ => out.push(ch),
        }
    }

    out
}
