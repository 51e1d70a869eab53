//! # Conduit Frontend
//!
//! Lexer, grammars, AST and semantic validation for the Conduit service DSL.
//!
//! ## Pipeline
//!
//! - [`lexer`]: mode lexer that splits a compile unit into main text and
//!   endpoint/workflow regions
//! - [`grammar`]: the three pest grammars
//! - [`convert`]: lowering from pest pairs to the [`ast`]
//! - [`tree`]: walk, print, equality and deep clone over any node
//! - [`validate`]: accumulating semantic passes
//!
//! Parsing fails fast with one [`errors::SyntaxError`]; validation reports
//! every problem it finds as [`errors::ValidationErrors`].

pub mod ast;
pub mod convert;
pub mod errors;
pub mod grammar;
pub mod lexer;
pub mod parser;
pub mod tree;
pub mod validate;

// Re-export commonly used types
pub use ast::*;
pub use errors::FrontendError;
pub use parser::{parse_file, parse_program, parse_source};
pub use tree::{clone_node, equal, print, walk, Node, NodeRef, Visit};
pub use validate::{validate_program, Registry, Validator};

/// Parses and validates `source` with an empty registry.
///
/// # Example
///
/// ```rust
/// use conduit_frontend::parse_and_validate;
///
/// let program = parse_and_validate("var n = len(\"abc\")").unwrap();
/// assert_eq!(program.statements.len(), 1);
///
/// let err = parse_and_validate("n = 1").unwrap_err();
/// assert!(err.validation_errors().is_some());
/// ```
pub fn parse_and_validate(source: &str) -> Result<Program, FrontendError> {
    let program = parse_program(source)?;
    validate_program(&program)?;
    Ok(program)
}
