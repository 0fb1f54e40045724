//! Read-only query surface over one parsed file
//!
//! Rules never touch parser internals; everything they can see goes through
//! [`SourceContext`].

use crate::parser::{DeclarationKind, ParseError, SourceParser, SyntaxTree};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Derived descriptor for one declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationInfo {
    /// Declared name
    pub name: String,
    /// Kind of declaration
    pub kind: DeclarationKind,
    /// Line the declaration starts on (1-based)
    pub line: usize,
    /// Number of stored properties
    pub property_count: usize,
    /// Number of methods
    pub method_count: usize,
    /// Number of enum cases
    pub case_count: usize,
}

/// Basic facts about the analyzed file
#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// File name without directory
    pub name: String,
    /// Full path
    pub path: PathBuf,
    /// Number of source lines
    pub line_count: usize,
}

/// One parsed file behind a stable, read-only query surface.
///
/// Immutable once constructed; declaration descriptors are derived lazily
/// and cached for the lifetime of the context.
pub struct SourceContext {
    path: PathBuf,
    tree: Arc<SyntaxTree>,
    declarations: OnceCell<Vec<DeclarationInfo>>,
}

impl SourceContext {
    /// Wrap an already-parsed tree
    pub fn new(path: &Path, tree: Arc<SyntaxTree>) -> Self {
        Self {
            path: path.to_path_buf(),
            tree,
            declarations: OnceCell::new(),
        }
    }

    /// Parse source text and construct a context.
    ///
    /// The only fallible step in a context's lifecycle.
    pub fn parse(
        path: &Path,
        source: &str,
        parser: &dyn SourceParser,
    ) -> Result<Self, ParseError> {
        let tree = parser.parse(source)?;
        Ok(Self::new(path, Arc::new(tree)))
    }

    fn derived(&self) -> &[DeclarationInfo] {
        self.declarations.get_or_init(|| {
            self.tree
                .declarations()
                .iter()
                .map(|d| DeclarationInfo {
                    name: d.name.clone(),
                    kind: d.kind,
                    line: d.line,
                    property_count: d.properties.len(),
                    method_count: d.methods.len(),
                    case_count: d.cases.len(),
                })
                .collect()
        })
    }

    /// Declarations in source order, optionally filtered by kind.
    ///
    /// Never fails; returns an empty list when nothing matches.
    pub fn declarations(&self, kind: Option<DeclarationKind>) -> Vec<DeclarationInfo> {
        self.derived()
            .iter()
            .filter(|d| kind.is_none_or(|k| d.kind == k))
            .cloned()
            .collect()
    }

    /// The raw source text, for inherently textual checks
    pub fn raw_source_text(&self) -> &str {
        self.tree.source()
    }

    /// Imported module names in source order
    pub fn imports(&self) -> &[String] {
        self.tree.imports()
    }

    /// Basic file facts
    pub fn file_metadata(&self) -> FileMetadata {
        FileMetadata {
            name: self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            path: self.path.clone(),
            line_count: self.tree.line_count(),
        }
    }

    /// Path of the analyzed file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored property count for a named declaration (0 if absent)
    pub fn property_count(&self, decl_name: &str) -> usize {
        self.derived()
            .iter()
            .find(|d| d.name == decl_name)
            .map_or(0, |d| d.property_count)
    }

    /// Method count for a named declaration (0 if absent)
    pub fn method_count(&self, decl_name: &str) -> usize {
        self.derived()
            .iter()
            .find(|d| d.name == decl_name)
            .map_or(0, |d| d.method_count)
    }

    /// Enum case count for a named declaration (0 if absent)
    pub fn case_count(&self, decl_name: &str) -> usize {
        self.derived()
            .iter()
            .find(|d| d.name == decl_name)
            .map_or(0, |d| d.case_count)
    }
}
