//! # Conduit Parser
//!
//! Entry points that turn source text into a [`Program`] without semantic
//! validation.
//!
//! ## Pipeline
//!
//! 1. The mode lexer ([`crate::lexer`]) splits the compile unit into main
//!    text plus endpoint and workflow/job regions.
//! 2. Main text is parsed by the main grammar, each region by its own grammar.
//! 3. The converters lower every parse tree into AST statements, with
//!    positions reported against the full source.
//! 4. Main and workflow/job statements are merged in source order and the
//!    endpoint declarations are appended after them, in source order.
//!
//! ## Error Handling
//!
//! Parsing is all-or-nothing: the first lexical or grammar error anywhere
//! aborts the compile unit and is returned as [`FrontendError::Syntax`].

use std::path::Path;

use pest::Parser;
use tracing::debug;

use crate::ast::{Program, Stmt};
use crate::convert::{self, Ctx};
use crate::errors::FrontendError;
use crate::grammar::endpoint::{EndpointParser, Rule as EndpointRule};
use crate::grammar::main::{MainParser, Rule as MainRule};
use crate::grammar::workflow::{Rule as WorkflowRule, WorkflowParser};
use crate::lexer::{self, RegionKind, SourceMap};

/// Parses an anonymous compile unit.
///
/// # Example
///
/// ```rust
/// use conduit_frontend::parser::parse_program;
///
/// let program = parse_program("var greeting = \"hi\"").unwrap();
/// assert_eq!(program.statements.len(), 1);
/// ```
pub fn parse_program(source: &str) -> Result<Program, FrontendError> {
    parse_source("", source)
}

/// Parses `source`, tagging every position with `filename`.
pub fn parse_source(filename: &str, source: &str) -> Result<Program, FrontendError> {
    let map = SourceMap::new(filename, source);
    let lexed = lexer::lex(&map)?;

    let ctx = Ctx::new(&map, 0);
    let mut statements = match MainParser::parse(MainRule::program, &lexed.main)
        .map_err(|e| ctx.syntax_error(e))?
        .next()
    {
        Some(pair) => convert::main::build_program(ctx, pair)?,
        None => Vec::new(),
    };
    debug!(file = filename, statements = statements.len(), "parsed main text");

    let mut endpoints = Vec::new();
    for region in &lexed.regions {
        let text = &source[region.start..region.end];
        let ctx = Ctx::new(&map, region.start);
        match region.kind {
            RegionKind::Endpoint => {
                let pair = EndpointParser::parse(EndpointRule::endpoint_file, text)
                    .map_err(|e| ctx.syntax_error(e))?
                    .next();
                if let Some(pair) = pair {
                    endpoints.push(Stmt::Endpoint(convert::endpoint::build_endpoint_file(ctx, pair)?));
                }
            }
            RegionKind::Workflow => {
                let pair = WorkflowParser::parse(WorkflowRule::workflow_file, text)
                    .map_err(|e| ctx.syntax_error(e))?
                    .next();
                if let Some(pair) = pair {
                    statements.push(convert::workflow::build_flow_file(ctx, pair)?);
                }
            }
        }
    }
    debug!(
        file = filename,
        endpoints = endpoints.len(),
        regions = lexed.regions.len(),
        "parsed regions"
    );

    // Stable: main statements precede workflow statements at equal offsets.
    statements.sort_by_key(|s| s.pos().offset);
    statements.extend(endpoints);

    Ok(Program {
        pos: map.position(0),
        statements,
    })
}

/// Reads and parses a `.cdt` file.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Program, FrontendError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| FrontendError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_source(&path.display().to_string(), &source)
}
