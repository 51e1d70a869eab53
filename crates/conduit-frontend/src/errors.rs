//! Error types for lexing, parsing and validation.
//!
//! Two disjoint families: a single positioned [`SyntaxError`] that aborts a
//! parse, and an ordered [`ValidationErrors`] aggregate collected by one
//! validation run.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

/// 1-based source position plus byte offset.
///
/// Positions compare equal unconditionally so that derived equality on AST
/// nodes is structural. Use [`Position::same_location`] to compare locations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Position {
    pub filename: Arc<str>,
    pub line: u32,
    pub column: u32,
    pub offset: usize,
}

impl Position {
    pub fn new(filename: Arc<str>, line: u32, column: u32, offset: usize) -> Self {
        Self {
            filename,
            line,
            column,
            offset,
        }
    }

    /// False only for the zero position.
    pub fn is_valid(&self) -> bool {
        self.line > 0
    }

    /// Location equality (filename, line, column, offset).
    pub fn same_location(&self, other: &Position) -> bool {
        self.filename == other.filename
            && self.line == other.line
            && self.column == other.column
            && self.offset == other.offset
    }
}

impl PartialEq for Position {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for Position {}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "<unknown>");
        }
        if self.filename.is_empty() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "{}:{}:{}", self.filename, self.line, self.column)
        }
    }
}

/// Which front-end stage rejected the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyntaxErrorKind {
    /// The mode lexer could not tokenize the input.
    Lexical,
    /// A grammar rejected the token stream.
    Grammar,
}

/// A single positioned lexical or syntax error. Parsing aborts on the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{position}: {message}")]
pub struct SyntaxError {
    pub position: Position,
    pub kind: SyntaxErrorKind,
    pub message: String,
}

impl SyntaxError {
    pub fn lexical(position: Position, message: impl Into<String>) -> Self {
        Self {
            position,
            kind: SyntaxErrorKind::Lexical,
            message: message.into(),
        }
    }

    pub fn grammar(position: Position, message: impl Into<String>) -> Self {
        Self {
            position,
            kind: SyntaxErrorKind::Grammar,
            message: message.into(),
        }
    }
}

/// Category of a semantic diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCategory {
    Scope,
    TypeCheck,
    Function,
    Semantic,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Scope => "scope",
            Self::TypeCheck => "type-check",
            Self::Function => "function",
            Self::Semantic => "semantic",
        };
        f.write_str(s)
    }
}

/// One semantic diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{position}: [{category}] {message}")]
pub struct ValidationError {
    pub position: Position,
    pub message: String,
    pub category: ErrorCategory,
}

impl ValidationError {
    pub fn new(position: Position, category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
            category,
        }
    }
}

/// Every semantic error found in one validation run, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    /// True if any error message contains `needle`.
    pub fn contains_message(&self, needle: &str) -> bool {
        self.0.iter().any(|e| e.message.contains(needle))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0.len();
        write!(
            f,
            "{} validation error{}",
            n,
            if n == 1 { "" } else { "s" }
        )?;
        for err in &self.0 {
            write!(f, "\n  {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Errors that can occur while reading, parsing or validating a compile unit.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FrontendError {
    /// Lexical or grammar error; no partial AST exists.
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    /// Aggregated semantic errors.
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    /// The source file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FrontendError {
    /// Returns the syntax error if this is a parse-time failure.
    pub fn syntax_error(&self) -> Option<&SyntaxError> {
        match self {
            Self::Syntax(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the aggregated diagnostics if this is a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errs) => Some(errs),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: u32, column: u32) -> Position {
        Position::new(Arc::from("app.cdt"), line, column, 0)
    }

    #[test]
    fn zero_position_is_invalid() {
        assert!(!Position::default().is_valid());
        assert!(pos(1, 1).is_valid());
    }

    #[test]
    fn positions_are_never_load_bearing_for_equality() {
        assert_eq!(pos(1, 1), pos(9, 4));
        assert!(!pos(1, 1).same_location(&pos(9, 4)));
    }

    #[test]
    fn syntax_error_displays_file_line_column() {
        let err = SyntaxError::grammar(pos(3, 7), "expected expression");
        assert_eq!(err.to_string(), "app.cdt:3:7: expected expression");
    }

    #[test]
    fn validation_errors_display_lists_every_error() {
        let errs = ValidationErrors(vec![
            ValidationError::new(pos(1, 1), ErrorCategory::Scope, "undefined variable 'x'"),
            ValidationError::new(pos(2, 5), ErrorCategory::Semantic, "duplicate endpoint GET /a"),
        ]);
        let text = errs.to_string();
        assert!(text.starts_with("2 validation errors"));
        assert!(text.contains("app.cdt:1:1: [scope] undefined variable 'x'"));
        assert!(text.contains("app.cdt:2:5: [semantic] duplicate endpoint GET /a"));
    }

    #[test]
    fn frontend_error_accessors() {
        let err: FrontendError = SyntaxError::lexical(pos(1, 2), "unterminated string literal").into();
        assert!(err.syntax_error().is_some());
        assert!(err.validation_errors().is_none());
        assert!(err.to_string().contains("unterminated string literal"));
    }
}
