//! Segmentation parser: splits a buffer into narration and structured spans.
//!
//! The segmenter walks the buffer with an integer cursor. At every position
//! it asks whether a structured candidate could start here (fenced block,
//! brace/bracket value, or a YAML-style key line); if so it attempts each
//! recognized form from the same checkpoint, keeps the cheapest attempt that
//! parses consistently, and otherwise falls back to accumulating narration
//! one character at a time. Backtracking is checkpoint/restore of the cursor;
//! alternatives derive new [`ParsePath`] values instead of mutating state.

use crate::lexer::{Lexer, TokenKind};

/// One block of the segmented buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A run of plain narration, trimmed.
    Text {
        /// The narration text.
        text: String,
    },
    /// A span suspected of encoding structured data, kept verbatim.
    Structured {
        /// The exact source substring (fence markers excluded for fenced
        /// spans).
        raw: String,
    },
}

/// A candidate decomposition of the buffer into segments.
///
/// Paths are immutable: trying an alternative derives a new path and
/// discards the loser, so backtracking never has to undo anything.
#[derive(Debug, Clone, Default)]
pub struct ParsePath {
    /// Segments recognized so far, in narrative order.
    pub segments: Vec<Segment>,
    /// Cumulative repair cost of the tokens absorbed into structured spans.
    pub score: u32,
    /// Repair notes reported by the lexer for absorbed tokens.
    pub repairs: Vec<&'static str>,
    /// Byte offset reached in the buffer.
    pub cursor: usize,
}

impl ParsePath {
    fn with_text(&self, text: String, cursor: usize) -> Self {
        let mut next = self.clone();
        next.segments.push(Segment::Text { text });
        next.cursor = cursor;
        next
    }

    fn with_structured(&self, attempt: Attempt) -> Self {
        let mut next = self.clone();
        next.segments.push(Segment::Structured { raw: attempt.raw });
        next.score += attempt.cost;
        next.repairs.extend(attempt.notes);
        next.cursor = attempt.end;
        next
    }
}

/// A successful structured-candidate parse from one checkpoint.
#[derive(Debug, Clone)]
struct Attempt {
    raw: String,
    end: usize,
    cost: u32,
    notes: Vec<&'static str>,
}

/// Splits `input` into an ordered sequence of narration and structured
/// spans.
///
/// Empty (after trimming) narration runs are dropped, and adjacent text
/// segments do not occur by construction.
///
/// # Examples
///
/// ```
/// use untangle::segment::{segment, Segment};
///
/// let segments = segment("see below:\n{\"a\": 1}");
/// assert_eq!(segments.len(), 2);
/// assert!(matches!(&segments[1], Segment::Structured { raw } if raw == "{\"a\": 1}"));
/// ```
pub fn segment(input: &str) -> Vec<Segment> {
    Segmenter::new(input).run().segments
}

pub(crate) struct Segmenter<'a> {
    lexer: Lexer<'a>,
    input: &'a str,
}

impl<'a> Segmenter<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self {
            lexer: Lexer::new(input),
            input,
        }
    }

    pub(crate) fn run(&self) -> ParsePath {
        let mut path = ParsePath::default();
        let mut text = String::new();
        let mut cursor = 0;

        while cursor < self.input.len() {
            if self.looks_like_object_start(cursor) {
                if let Some(attempt) = self.best_attempt(cursor) {
                    path = self.flush_text(path, &mut text, cursor);
                    cursor = attempt.end;
                    path = path.with_structured(attempt);
                    continue;
                }
            }
            // Plain narration; advance one character.
            let Some(ch) = self.input[cursor..].chars().next() else {
                break;
            };
            text.push(ch);
            cursor += ch.len_utf8();
        }

        self.flush_text(path, &mut text, cursor)
    }

    fn flush_text(&self, path: ParsePath, text: &mut String, cursor: usize) -> ParsePath {
        let trimmed = text.trim();
        let next = if trimmed.is_empty() {
            let mut unchanged = path;
            unchanged.cursor = cursor;
            unchanged
        } else {
            path.with_text(trimmed.to_string(), cursor)
        };
        text.clear();
        next
    }

    /// True when the best lexer candidate at `pos` opens a fence, brace, or
    /// bracket, or when a YAML-style key line begins here.
    fn looks_like_object_start(&self, pos: usize) -> bool {
        match self.lexer.consume_best(pos) {
            Some((tok, _)) => {
                matches!(
                    tok.kind,
                    TokenKind::FenceJson
                        | TokenKind::FenceYaml
                        | TokenKind::BraceOpen
                        | TokenKind::BracketOpen
                ) || self.yaml_key_at(pos)
            }
            None => false,
        }
    }

    /// A YAML key pattern: line start, a bare word or quoted string, then a
    /// colon with only horizontal whitespace in between.
    fn yaml_key_at(&self, pos: usize) -> bool {
        if !self.lexer.at_line_start(pos) {
            return false;
        }
        let Some((tok, mut p)) = self.lexer.consume_best(pos) else {
            return false;
        };
        if !matches!(tok.kind, TokenKind::BareWord | TokenKind::Str) {
            return false;
        }
        let bytes = self.input.as_bytes();
        while p < bytes.len() && matches!(bytes[p], b' ' | b'\t') {
            p += 1;
        }
        bytes.get(p) == Some(&b':')
    }

    /// Attempts every recognized structured form from the same checkpoint
    /// and keeps the lowest-scoring success. Ties go to the earlier form in
    /// the priority order (fenced JSON, fenced YAML, brace/bracket, YAML
    /// run).
    fn best_attempt(&self, pos: usize) -> Option<Attempt> {
        let attempts = [
            self.attempt_fenced(pos, TokenKind::FenceJson),
            self.attempt_fenced(pos, TokenKind::FenceYaml),
            self.attempt_braced(pos),
            self.attempt_yaml(pos),
        ];
        let mut best: Option<Attempt> = None;
        for attempt in attempts.into_iter().flatten() {
            if best.as_ref().map_or(true, |b| attempt.cost < b.cost) {
                best = Some(attempt);
            }
        }
        best
    }

    /// Captures a fenced body verbatim up to the closing fence or end of
    /// input.
    fn attempt_fenced(&self, pos: usize, want: TokenKind) -> Option<Attempt> {
        let (tok, after_tag) = self.lexer.consume_best(pos)?;
        if tok.kind != want {
            return None;
        }
        // The body starts on the line after the fence header.
        let body = match self.input[after_tag..].find('\n') {
            Some(i) => after_tag + i + 1,
            None => self.input.len(),
        };
        let (raw, end) = match self.input[body..].find("```") {
            Some(i) => (&self.input[body..body + i], body + i + 3),
            None => (&self.input[body..], self.input.len()),
        };
        Some(Attempt {
            raw: raw.to_string(),
            end,
            cost: 0,
            notes: Vec::new(),
        })
    }

    /// Consumes a brace/bracket-delimited span, tracking nesting depth.
    /// Fails (returns `None`) when the span never closes, in which case the
    /// caller treats the opener as narration.
    fn attempt_braced(&self, pos: usize) -> Option<Attempt> {
        let (tok, _) = self.lexer.consume_best(pos)?;
        if !matches!(tok.kind, TokenKind::BraceOpen | TokenKind::BracketOpen) {
            return None;
        }
        let mut notes = Vec::new();
        let (cost, end) = self.scan_balanced(pos, &mut notes)?;
        Some(Attempt {
            raw: self.input[pos..end].to_string(),
            end,
            cost,
            notes,
        })
    }

    fn scan_balanced(&self, pos: usize, notes: &mut Vec<&'static str>) -> Option<(u32, usize)> {
        let (opener, mut p) = self.lexer.consume_best(pos)?;
        let mut cost = opener.cost;
        let mut depth = 1u32;
        while depth > 0 {
            let (tok, next) = self.lexer.consume_best(p)?;
            match tok.kind {
                TokenKind::BraceOpen | TokenKind::BracketOpen => depth += 1,
                TokenKind::BraceClose | TokenKind::BracketClose => depth -= 1,
                _ => {}
            }
            cost += tok.cost;
            if let Some(note) = tok.note {
                notes.push(note);
            }
            p = next;
        }
        Some((cost, p))
    }

    /// Consumes a run of YAML-looking lines starting at a confirmed key
    /// pattern.
    fn attempt_yaml(&self, pos: usize) -> Option<Attempt> {
        if !self.yaml_key_at(pos) {
            return None;
        }
        let mut p = pos;
        let mut end = pos;
        let mut cost = 0u32;
        let mut notes = Vec::new();

        while let Some((tok, next)) = self.lexer.consume_best(p) {
            match tok.kind {
                TokenKind::Newline => {
                    // Continue only if the next non-blank line is another
                    // list item or key line; otherwise the run ends before
                    // this newline.
                    if self.yaml_continues_at(next) {
                        p = next;
                    } else {
                        break;
                    }
                }
                TokenKind::Dash
                | TokenKind::BareWord
                | TokenKind::Str
                | TokenKind::Number
                | TokenKind::Bool
                | TokenKind::Null
                | TokenKind::Colon
                | TokenKind::Whitespace => {
                    cost += tok.cost;
                    if let Some(note) = tok.note {
                        notes.push(note);
                    }
                    p = next;
                    end = next;
                }
                TokenKind::BraceOpen => {
                    // Inline JSON value; absorb the balanced span whole.
                    match self.scan_balanced(p, &mut notes) {
                        Some((inner_cost, after)) => {
                            cost += inner_cost;
                            p = after;
                            end = after;
                        }
                        None => break,
                    }
                }
                _ => break,
            }
        }

        if end == pos {
            return None;
        }
        Some(Attempt {
            raw: self.input[pos..end].to_string(),
            end,
            cost,
            notes,
        })
    }

    fn yaml_continues_at(&self, pos: usize) -> bool {
        if pos >= self.input.len() {
            return false;
        }
        if self.yaml_key_at(pos) {
            return true;
        }
        matches!(
            self.lexer.consume_best(pos),
            Some((tok, _)) if tok.kind == TokenKind::Dash
        )
    }
}
