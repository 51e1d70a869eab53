//! # IR → AST Conversion
//!
//! Lowers pest parse trees into [`crate::ast`] nodes with one `build_*`
//! function per production. Conversion is pure: unquoting, numeric parsing
//! and enum mapping happen here, semantic checks do not.
//!
//! ## Positions
//!
//! Every grammar parses a slice of the compile unit. [`Ctx`] carries the
//! slice's base offset so node positions are reported against the full
//! source.

pub mod endpoint;
pub mod main;
pub mod workflow;

use pest::error::InputLocation;
use pest::iterators::Pair;
use pest::{RuleType, Span};

use crate::ast::Position;
use crate::errors::{FrontendError, SyntaxError};
use crate::lexer::SourceMap;

/// Conversion context for one grammar input.
#[derive(Clone, Copy)]
pub struct Ctx<'m, 'a> {
    map: &'m SourceMap<'a>,
    base: usize,
}

impl<'m, 'a> Ctx<'m, 'a> {
    pub fn new(map: &'m SourceMap<'a>, base: usize) -> Self {
        Self { map, base }
    }

    pub fn pos(&self, span: Span<'_>) -> Position {
        self.map.position(self.base + span.start())
    }

    /// A grammar-level error anchored at `span`.
    pub fn error(&self, span: Span<'_>, message: impl Into<String>) -> FrontendError {
        FrontendError::Syntax(SyntaxError::grammar(self.pos(span), message))
    }

    /// Converts a pest failure into a positioned syntax error.
    pub fn syntax_error<R: RuleType>(&self, err: pest::error::Error<R>) -> SyntaxError {
        let offset = match err.location {
            InputLocation::Pos(p) => p,
            InputLocation::Span((start, _)) => start,
        };
        SyntaxError::grammar(
            self.map.position(self.base + offset),
            err.variant.message().into_owned(),
        )
    }
}

/// Decodes the body of a string literal (without its quotes).
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Value of a `string` pair: quotes stripped, escapes decoded.
pub fn string_value<R: RuleType>(pair: Pair<'_, R>) -> String {
    let text = pair.as_str();
    let body = text
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(text);
    unescape(body)
}

pub fn parse_number<R: RuleType>(ctx: Ctx<'_, '_>, pair: &Pair<'_, R>) -> Result<f64, FrontendError> {
    pair.as_str()
        .parse::<f64>()
        .map_err(|e| ctx.error(pair.as_span(), format!("invalid number '{}': {}", pair.as_str(), e)))
}

/// Parses an integer literal; a fractional part is an error.
pub fn parse_int<R: RuleType>(
    ctx: Ctx<'_, '_>,
    pair: &Pair<'_, R>,
    what: &str,
) -> Result<i64, FrontendError> {
    let value = parse_number(ctx, pair)?;
    if value.fract() != 0.0 || !value.is_finite() {
        return Err(ctx.error(pair.as_span(), format!("{} must be an integer", what)));
    }
    Ok(value as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescape_decodes_common_escapes() {
        assert_eq!(unescape(r#"a\"b\\c\nd"#), "a\"b\\c\nd");
        assert_eq!(unescape(r"tab\there"), "tab\there");
    }

    #[test]
    fn unknown_escapes_are_kept_verbatim() {
        assert_eq!(unescape(r"\d+"), r"\d+");
        assert_eq!(unescape("trailing\\"), "trailing\\");
    }
}
