//! # Mode Lexer
//!
//! Stateful scanner that runs before the grammars. It keeps a stack of lexer
//! states and splits a compile unit into the regions each grammar owns:
//!
//! - `Main` text is handed to the main grammar with every foreign region
//!   blanked to spaces, so byte offsets (and therefore positions) survive.
//! - `endpoint` declarations (with any `@annotation`s directly in front of
//!   them) push the `Endpoint` state and become endpoint-grammar regions.
//! - `workflow` / `job` declarations push the `Workflow` state.
//! - `exec {` pushes the `Shell` state at any depth. Shell text is captured
//!   up to the matching `}`; quotes inside it are not interpreted.
//!
//! Strings and comments get their own states so braces inside them never
//! affect depth. Anything left open at end of input is a lexical error.

use std::sync::Arc;

use tracing::debug;

use crate::errors::{Position, SyntaxError};

/// Maps byte offsets of one compile unit to 1-based line/column positions.
#[derive(Debug, Clone)]
pub struct SourceMap<'a> {
    filename: Arc<str>,
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> SourceMap<'a> {
    pub fn new(filename: &str, source: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            filename: Arc::from(filename),
            source,
            line_starts,
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn filename(&self) -> &Arc<str> {
        &self.filename
    }

    /// Position of a byte offset. Columns count characters, not bytes.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.source.len());
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = self.line_starts[line_idx];
        let column = self
            .source
            .get(line_start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(offset - line_start);
        Position::new(
            self.filename.clone(),
            (line_idx + 1) as u32,
            (column + 1) as u32,
            offset,
        )
    }
}

/// Named lexer states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexState {
    Main,
    Annotation,
    Str,
    LineComment,
    BlockComment,
    Shell,
    Endpoint,
    Workflow,
}

/// Which sub-grammar owns a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Endpoint,
    Workflow,
}

/// Byte range `[start, end)` of the source owned by a sub-grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub kind: RegionKind,
    pub start: usize,
    pub end: usize,
}

/// Output of the mode lexer.
#[derive(Debug, Clone)]
pub struct Lexed {
    /// The source with every region replaced by spaces (newlines kept).
    pub main: String,
    /// Regions in source order.
    pub regions: Vec<Region>,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    state: LexState,
    start: usize,
    depth: u32,
    opened: bool,
}

impl Frame {
    fn new(state: LexState, start: usize) -> Self {
        Self {
            state,
            start,
            depth: 0,
            opened: false,
        }
    }
}

/// Splits `map.source()` into main text and sub-grammar regions.
pub fn lex(map: &SourceMap<'_>) -> Result<Lexed, SyntaxError> {
    let mut lexer = ModeLexer {
        map,
        bytes: map.source().as_bytes(),
        pos: 0,
        stack: vec![Frame::new(LexState::Main, 0)],
        pending_annotation: None,
        regions: Vec::new(),
    };
    lexer.run()?;
    let main = blank_regions(map.source(), &lexer.regions);
    debug!(
        regions = lexer.regions.len(),
        bytes = map.source().len(),
        "lexed compile unit"
    );
    Ok(Lexed {
        main,
        regions: lexer.regions,
    })
}

struct ModeLexer<'m, 'a> {
    map: &'m SourceMap<'a>,
    bytes: &'a [u8],
    pos: usize,
    stack: Vec<Frame>,
    pending_annotation: Option<usize>,
    regions: Vec<Region>,
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

impl<'m, 'a> ModeLexer<'m, 'a> {
    fn run(&mut self) -> Result<(), SyntaxError> {
        while let Some(frame) = self.stack.last().copied() {
            if self.pos >= self.bytes.len() {
                return self.finish(frame);
            }
            match frame.state {
                LexState::Main | LexState::Endpoint | LexState::Workflow => self.step_code(frame)?,
                LexState::Annotation => self.step_annotation(),
                LexState::Str => self.step_string(),
                LexState::LineComment => self.step_line_comment(),
                LexState::BlockComment => self.step_block_comment(),
                LexState::Shell => self.step_shell(),
            }
        }
        Ok(())
    }

    fn finish(&mut self, frame: Frame) -> Result<(), SyntaxError> {
        let what = match frame.state {
            LexState::Main | LexState::LineComment => {
                self.stack.pop();
                return if self.stack.is_empty() {
                    Ok(())
                } else {
                    let next = self.stack.last().copied().unwrap_or(frame);
                    self.finish(next)
                };
            }
            LexState::Annotation => "unterminated annotation arguments",
            LexState::Str => "unterminated string literal",
            LexState::BlockComment => "unterminated block comment",
            LexState::Shell => "unterminated exec block",
            LexState::Endpoint => "unterminated endpoint block",
            LexState::Workflow => "unterminated workflow block",
        };
        Err(SyntaxError::lexical(self.map.position(frame.start), what))
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn push(&mut self, state: LexState, start: usize) {
        self.stack.push(Frame::new(state, start));
    }

    fn top(&mut self) -> &mut Frame {
        // The stack always holds at least the frame being stepped.
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    /// Shared scanning for `Main`, `Endpoint` and `Workflow`.
    fn step_code(&mut self, frame: Frame) -> Result<(), SyntaxError> {
        let b = self.bytes[self.pos];
        let at_top = frame.state == LexState::Main && frame.depth == 0;
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
            b'/' if self.peek(1) == Some(b'/') => {
                self.push(LexState::LineComment, self.pos);
                self.pos += 2;
            }
            b'/' if self.peek(1) == Some(b'*') => {
                self.push(LexState::BlockComment, self.pos);
                self.pos += 2;
            }
            b'"' => {
                if at_top {
                    self.pending_annotation = None;
                }
                self.push(LexState::Str, self.pos);
                self.pos += 1;
            }
            b'{' => {
                if at_top {
                    self.pending_annotation = None;
                }
                let top = self.top();
                top.depth += 1;
                top.opened = true;
                self.pos += 1;
            }
            b'}' => {
                let top = self.top();
                top.depth = top.depth.saturating_sub(1);
                let closes_region = top.opened && top.depth == 0 && top.state != LexState::Main;
                self.pos += 1;
                if closes_region {
                    self.close_region(frame);
                }
            }
            b'@' if at_top => {
                self.pending_annotation.get_or_insert(self.pos);
                self.pos += 1;
                self.skip_word();
                let after = self.skip_inline_space(self.pos);
                if self.bytes.get(after) == Some(&b'(') {
                    self.pos = after + 1;
                    self.push(LexState::Annotation, after);
                }
            }
            b if is_word_byte(b) => self.word(frame)?,
            b if b.is_ascii_control() => {
                return Err(SyntaxError::lexical(
                    self.map.position(self.pos),
                    format!("unexpected character U+{:04X}", b),
                ));
            }
            _ => {
                if at_top {
                    self.pending_annotation = None;
                }
                self.pos += 1;
            }
        }
        Ok(())
    }

    fn word(&mut self, frame: Frame) -> Result<(), SyntaxError> {
        let start = self.pos;
        self.skip_word();
        let word = &self.bytes[start..self.pos];

        if frame.state == LexState::Main && word == b"exec" {
            let after = self.skip_inline_space(self.pos);
            if self.bytes.get(after) == Some(&b'{') {
                self.pending_annotation = None;
                self.pos = after + 1;
                let mut shell = Frame::new(LexState::Shell, start);
                shell.depth = 1;
                self.stack.push(shell);
                return Ok(());
            }
        }

        if frame.state != LexState::Main || frame.depth != 0 {
            return Ok(());
        }
        let state = match word {
            b"endpoint" => LexState::Endpoint,
            b"workflow" | b"job" => LexState::Workflow,
            _ => {
                self.pending_annotation = None;
                return Ok(());
            }
        };
        let declares = match state {
            LexState::Endpoint => self.followed_by_method_and_path(self.pos),
            _ => self.followed_by_name_and_brace(self.pos),
        };
        if !declares || self.continues_expression(start) || self.follows_binding_word(start) {
            self.pending_annotation = None;
            return Ok(());
        }
        let region_start = match state {
            LexState::Endpoint => self.pending_annotation.take().unwrap_or(start),
            _ => {
                self.pending_annotation = None;
                start
            }
        };
        self.push(state, region_start);
        Ok(())
    }

    fn close_region(&mut self, frame: Frame) {
        self.stack.pop();
        let kind = match frame.state {
            LexState::Endpoint => RegionKind::Endpoint,
            _ => RegionKind::Workflow,
        };
        self.regions.push(Region {
            kind,
            start: frame.start,
            end: self.pos,
        });
    }

    fn step_annotation(&mut self) {
        match self.bytes[self.pos] {
            b'"' => self.push(LexState::Str, self.pos),
            b')' => {
                self.stack.pop();
            }
            _ => {}
        }
        self.pos += 1;
    }

    fn step_string(&mut self) {
        match self.bytes[self.pos] {
            b'\\' => self.pos += 2,
            b'"' => {
                self.stack.pop();
                self.pos += 1;
            }
            _ => self.pos += 1,
        }
    }

    fn step_line_comment(&mut self) {
        if self.bytes[self.pos] == b'\n' {
            self.stack.pop();
        }
        self.pos += 1;
    }

    fn step_block_comment(&mut self) {
        if self.bytes[self.pos] == b'*' && self.peek(1) == Some(b'/') {
            self.stack.pop();
            self.pos += 2;
        } else {
            self.pos += 1;
        }
    }

    fn step_shell(&mut self) {
        match self.bytes[self.pos] {
            b'{' => self.top().depth += 1,
            b'}' => {
                let top = self.top();
                top.depth -= 1;
                if top.depth == 0 {
                    self.stack.pop();
                }
            }
            _ => {}
        }
        self.pos += 1;
    }

    fn skip_word(&mut self) {
        while self.pos < self.bytes.len() && is_word_byte(self.bytes[self.pos]) {
            self.pos += 1;
        }
    }

    fn skip_inline_space(&self, mut at: usize) -> usize {
        while at < self.bytes.len() && matches!(self.bytes[at], b' ' | b'\t' | b'\r' | b'\n') {
            at += 1;
        }
        at
    }

    fn followed_by_word(&self, at: usize) -> bool {
        let at = self.skip_inline_space(at);
        matches!(self.bytes.get(at), Some(b) if b.is_ascii_alphabetic() || *b == b'_')
    }

    /// `<METHOD> "` follows, as in `endpoint GET "/users"`.
    fn followed_by_method_and_path(&self, at: usize) -> bool {
        let mut at = self.skip_inline_space(at);
        let method_start = at;
        while at < self.bytes.len() && self.bytes[at].is_ascii_alphabetic() {
            at += 1;
        }
        at > method_start && self.bytes.get(self.skip_inline_space(at)) == Some(&b'"')
    }

    /// `<name> {` follows, as in `workflow onboard {`.
    fn followed_by_name_and_brace(&self, at: usize) -> bool {
        if !self.followed_by_word(at) {
            return false;
        }
        let mut at = self.skip_inline_space(at);
        while at < self.bytes.len() && is_word_byte(self.bytes[at]) {
            at += 1;
        }
        self.bytes.get(self.skip_inline_space(at)) == Some(&b'{')
    }

    /// True when the word at `start` sits after an operator or separator,
    /// e.g. the target in `on user.created -> workflow onboard`.
    fn continues_expression(&self, start: usize) -> bool {
        let prev = self.bytes[..start]
            .iter()
            .rev()
            .find(|b| !matches!(b, b' ' | b'\t' | b'\r' | b'\n'));
        matches!(
            prev,
            Some(b'>' | b'<' | b'=' | b'-' | b'+' | b'*' | b'%' | b'!' | b'&' | b'|' | b'.' | b',' | b'(' | b'[' | b':')
        )
    }

    /// True when the word at `start` is bound by a preceding keyword, as in
    /// `var endpoint` or `for job in jobs`.
    fn follows_binding_word(&self, start: usize) -> bool {
        let mut end = start;
        while end > 0 && matches!(self.bytes[end - 1], b' ' | b'\t' | b'\r' | b'\n') {
            end -= 1;
        }
        let mut begin = end;
        while begin > 0 && is_word_byte(self.bytes[begin - 1]) {
            begin -= 1;
        }
        matches!(&self.bytes[begin..end], b"var" | b"for" | b"in" | b"return" | b"function")
    }
}

/// Replaces every region with spaces, keeping newlines and byte offsets.
fn blank_regions(source: &str, regions: &[Region]) -> String {
    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for region in regions {
        out.push_str(&source[last..region.start]);
        for c in source[region.start..region.end].chars() {
            if c == '\n' {
                out.push('\n');
            } else {
                for _ in 0..c.len_utf8() {
                    out.push(' ');
                }
            }
        }
        last = region.end;
    }
    out.push_str(&source[last..]);
    out
}
