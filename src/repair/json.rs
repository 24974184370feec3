//! JSON-leaning reconstructor.
//!
//! Re-lexes one candidate span and rewrites it into strict JSON by
//! recursive descent over OBJECT / ARRAY / KEY / VALUE positions. The
//! grammar position disambiguates what the fuzzy tokens mean: a bare word
//! before a colon is a key to quote, a bare word after one is a scalar to
//! quote, a missing comma between two recognized pairs is inserted, an
//! unterminated container is closed at end of input. The rewritten text is
//! validated by decoding it; an undecodable rewrite reports failure rather
//! than returning garbage.

use serde_json::Value;

use crate::{
    error::{ParseError, Result},
    lexer::{Lexer, TokenCandidate, TokenKind, COST_SMART_QUOTED},
    repair::{Repair, RepairMode, RepairResult},
};

/// Containers deeper than this fail reconstruction instead of risking the
/// stack.
const MAX_NESTING_DEPTH: usize = 128;

/// Rewrites one candidate span in JSON mode.
pub(crate) fn reconstruct(raw: &str) -> RepairResult {
    let mut reconstructor = JsonReconstructor::new(raw);
    match reconstructor.run() {
        Ok(object) => RepairResult::succeeded(
            RepairMode::JsonIsh,
            object,
            reconstructor.out,
            reconstructor.repairs,
            reconstructor.warnings,
        ),
        Err(err) => {
            let mut warnings = reconstructor.warnings;
            warnings.push(err.to_string());
            RepairResult::failed(RepairMode::JsonIsh, warnings)
        }
    }
}

pub(crate) struct JsonReconstructor<'a> {
    lexer: Lexer<'a>,
    pos: usize,
    depth: usize,
    out: String,
    repairs: Vec<Repair>,
    warnings: Vec<String>,
}

impl<'a> JsonReconstructor<'a> {
    pub(crate) fn new(raw: &'a str) -> Self {
        Self {
            lexer: Lexer::new(raw),
            pos: 0,
            depth: 0,
            out: String::with_capacity(raw.len() + 16),
            repairs: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn run(&mut self) -> Result<Value> {
        self.skip_trivia();
        match self.peek_kind() {
            Some(TokenKind::BraceOpen) => self.object()?,
            Some(TokenKind::BracketOpen) => self.array()?,
            _ => {
                return Err(ParseError::Unrecognized(
                    "span does not begin with an object or array",
                ))
            }
        }
        self.skip_trivia();
        if self.pos < self.lexer.input().len() {
            self.warnings
                .push("ignored trailing content after the reconstructed value".into());
        }
        Ok(serde_json::from_str(&self.out)?)
    }

    fn log(&mut self, repair: Repair) {
        self.repairs.push(repair);
    }

    fn peek(&self) -> Option<TokenCandidate> {
        self.lexer.consume_best(self.pos).map(|(tok, _)| tok)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|tok| tok.kind)
    }

    fn advance(&mut self) -> Option<TokenCandidate> {
        let (tok, next) = self.lexer.consume_best(self.pos)?;
        self.pos = next;
        Some(tok)
    }

    /// Skips whitespace, newlines, and inline `#` comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(tok) if matches!(tok.kind, TokenKind::Whitespace | TokenKind::Newline) => {
                    self.advance();
                }
                Some(tok) if tok.kind == TokenKind::Text && tok.value == "#" => {
                    self.log(Repair::RemovedInlineComment);
                    self.consume_comment();
                }
                _ => break,
            }
        }
    }

    /// Skips horizontal whitespace only.
    fn skip_hspace(&mut self) {
        while matches!(self.peek_kind(), Some(TokenKind::Whitespace)) {
            self.advance();
        }
    }

    /// Consumes a `#` comment up to the end of its line, but never past a
    /// closing brace or bracket.
    fn consume_comment(&mut self) {
        self.advance(); // the '#'
        loop {
            match self.peek_kind() {
                None
                | Some(TokenKind::Newline)
                | Some(TokenKind::BraceClose)
                | Some(TokenKind::BracketClose) => break,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn skip_unexpected(&mut self) {
        if let Some(tok) = self.advance() {
            self.warnings
                .push(format!("skipped unexpected token {:?}", tok.value));
        }
    }

    fn object(&mut self) -> Result<()> {
        self.enter()?;
        self.advance(); // '{'
        self.out.push('{');
        let mut wrote_pair = false;
        loop {
            self.skip_trivia();
            let mut saw_comma = false;
            while matches!(self.peek_kind(), Some(TokenKind::Comma)) {
                self.advance();
                saw_comma = true;
                self.skip_trivia();
            }
            match self.peek_kind() {
                None => {
                    if saw_comma {
                        self.log(Repair::RemovedTrailingComma);
                    }
                    self.log(Repair::ClosedUnterminatedBrace);
                    self.out.push('}');
                    break;
                }
                Some(TokenKind::BraceClose) => {
                    if saw_comma {
                        self.log(Repair::RemovedTrailingComma);
                    }
                    self.advance();
                    self.out.push('}');
                    break;
                }
                Some(kind) if can_start_key(kind) => {}
                Some(_) => {
                    self.skip_unexpected();
                    continue;
                }
            }
            if wrote_pair {
                if !saw_comma {
                    self.log(Repair::InsertedComma);
                }
                self.out.push(',');
            }
            self.key_value()?;
            wrote_pair = true;
        }
        self.leave();
        Ok(())
    }

    fn key_value(&mut self) -> Result<()> {
        let key = match self.peek() {
            Some(tok) if tok.kind == TokenKind::Str => {
                if let Some(repair) = string_repair(&tok) {
                    self.log(repair);
                }
                self.advance();
                tok.value
            }
            Some(tok) if tok.kind == TokenKind::BareWord => self.bare_key(tok.value),
            Some(tok) if tok.kind == TokenKind::Number => {
                self.advance();
                self.log(Repair::QuotedBareKey);
                tok.value
            }
            _ => unreachable!("caller checked can_start_key"),
        };
        push_json_string(&mut self.out, &key);

        self.skip_hspace();
        if matches!(self.peek_kind(), Some(TokenKind::Colon)) {
            self.advance();
            self.out.push(':');
            self.value()?;
        } else {
            // No colon after the key: a stray narrative line inside braces
            // becomes a null-valued key.
            self.log(Repair::AddedNullValue);
            self.out.push_str(":null");
        }
        Ok(())
    }

    /// Reads a bare key, extending over further bare words and single
    /// spaces until a colon, newline, comma, or closer.
    fn bare_key(&mut self, first: String) -> String {
        self.advance();
        self.log(Repair::QuotedBareKey);
        let mut words = vec![first];
        loop {
            let checkpoint = self.pos;
            self.skip_hspace();
            match self.peek() {
                Some(tok)
                    if matches!(
                        tok.kind,
                        TokenKind::BareWord
                            | TokenKind::Number
                            | TokenKind::Bool
                            | TokenKind::Null
                    ) =>
                {
                    self.advance();
                    words.push(tok.value);
                }
                _ => {
                    self.pos = checkpoint;
                    break;
                }
            }
        }
        words.join(" ")
    }

    fn value(&mut self) -> Result<()> {
        self.skip_trivia();
        let Some(tok) = self.peek() else {
            self.warnings.push("missing value at end of input".into());
            self.out.push_str("null");
            return Ok(());
        };
        match tok.kind {
            TokenKind::Str => {
                if let Some(repair) = string_repair(&tok) {
                    self.log(repair);
                }
                self.advance();
                push_json_string(&mut self.out, &tok.value);
            }
            TokenKind::Number => {
                self.advance();
                // Guard against literals serde_json rejects (e.g. `01`).
                if serde_json::from_str::<serde_json::Number>(&tok.value).is_ok() {
                    self.out.push_str(&tok.value);
                } else {
                    self.log(Repair::QuotedTextScalar);
                    push_json_string(&mut self.out, &tok.value);
                }
            }
            TokenKind::Bool | TokenKind::Null => {
                self.advance();
                self.out.push_str(&tok.value);
            }
            TokenKind::BraceOpen => self.object()?,
            TokenKind::BracketOpen => self.array()?,
            TokenKind::BareWord | TokenKind::Text | TokenKind::Dash | TokenKind::Colon => {
                self.unquoted_scalar();
            }
            _ => {
                // Comma, closer, or fence in value position: nothing usable.
                self.warnings.push("missing value before separator".into());
                self.out.push_str("null");
            }
        }
        Ok(())
    }

    /// Accumulates an unquoted scalar until a structural boundary, newline,
    /// or comment marker, then quotes it as one string.
    fn unquoted_scalar(&mut self) {
        let started_bare = matches!(self.peek_kind(), Some(TokenKind::BareWord));
        let mut acc = String::new();
        loop {
            let Some(tok) = self.peek() else { break };
            match tok.kind {
                TokenKind::Comma
                | TokenKind::BraceClose
                | TokenKind::BracketClose
                | TokenKind::Newline
                | TokenKind::BraceOpen
                | TokenKind::BracketOpen
                | TokenKind::FenceJson
                | TokenKind::FenceYaml
                | TokenKind::FenceEnd => break,
                TokenKind::Text if tok.value == "#" => {
                    self.log(Repair::RemovedInlineComment);
                    self.consume_comment();
                    break;
                }
                TokenKind::Whitespace => {
                    acc.push(' ');
                    self.advance();
                }
                _ => {
                    acc.push_str(&tok.value);
                    self.advance();
                }
            }
        }
        self.log(if started_bare {
            Repair::QuotedBareScalar
        } else {
            Repair::QuotedTextScalar
        });
        push_json_string(&mut self.out, acc.trim());
    }

    fn array(&mut self) -> Result<()> {
        self.enter()?;
        self.advance(); // '['
        self.out.push('[');
        let mut wrote_element = false;
        loop {
            self.skip_trivia();
            let mut saw_comma = false;
            while matches!(self.peek_kind(), Some(TokenKind::Comma)) {
                self.advance();
                saw_comma = true;
                self.skip_trivia();
            }
            match self.peek_kind() {
                None => {
                    if saw_comma {
                        self.log(Repair::RemovedTrailingComma);
                    }
                    self.log(Repair::ClosedUnterminatedBracket);
                    self.out.push(']');
                    break;
                }
                Some(TokenKind::BracketClose) => {
                    if saw_comma {
                        self.log(Repair::RemovedTrailingComma);
                    }
                    self.advance();
                    self.out.push(']');
                    break;
                }
                Some(kind) if can_start_value(kind) => {}
                Some(_) => {
                    self.skip_unexpected();
                    continue;
                }
            }
            if wrote_element {
                if !saw_comma {
                    self.log(Repair::InsertedComma);
                }
                self.out.push(',');
            }
            self.value()?;
            wrote_element = true;
        }
        self.leave();
        Ok(())
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(ParseError::Unrecognized("nesting too deep"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }
}

fn can_start_key(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Str | TokenKind::BareWord | TokenKind::Number
    )
}

fn can_start_value(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Str
            | TokenKind::Number
            | TokenKind::Bool
            | TokenKind::Null
            | TokenKind::BraceOpen
            | TokenKind::BracketOpen
            | TokenKind::BareWord
            | TokenKind::Text
            | TokenKind::Dash
            | TokenKind::Colon
    )
}

fn string_repair(tok: &TokenCandidate) -> Option<Repair> {
    match tok.cost {
        0 => None,
        COST_SMART_QUOTED => Some(Repair::NormalizedSmartQuotes),
        _ => Some(Repair::NormalizedSingleQuotes),
    }
}

/// Appends `s` as a strict JSON string literal.
fn push_json_string(out: &mut String, s: &str) {
    use std::fmt::Write;

    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ok(raw: &str) -> RepairResult {
        let result = reconstruct(raw);
        assert!(result.success, "expected success for {raw:?}: {result:?}");
        result
    }

    #[test]
    fn test_valid_json_is_untouched() {
        let result = ok(r#"{"name": "Alice", "age": 30}"#);
        assert_eq!(result.score, 0);
        assert!(result.repairs.is_empty());
        assert_eq!(result.object, Some(json!({"name": "Alice", "age": 30})));
    }

    #[test]
    fn test_valid_nested_json_score_zero() {
        let result = ok(r#"{"a": [1, 2, {"b": null}], "c": {"d": true}}"#);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_string_escapes_round_trip() {
        let result = ok(r#"{"a": "line\nbreak \"quoted\""}"#);
        assert_eq!(result.object, Some(json!({"a": "line\nbreak \"quoted\""})));
    }

    #[test]
    fn test_missing_commas_and_bare_keys() {
        let result = ok("{a:1 b:2}");
        assert_eq!(result.repaired_text.as_deref(), Some(r#"{"a":1,"b":2}"#));
        assert!(result.repairs.contains(&Repair::InsertedComma));
        assert!(result.repairs.contains(&Repair::QuotedBareKey));
    }

    #[test]
    fn test_multiword_bare_key() {
        let result = ok("{btw I love YAML: yes}");
        assert_eq!(result.object, Some(json!({"btw I love YAML": "yes"})));
    }

    #[test]
    fn test_bare_line_becomes_null_key() {
        let result = ok("{ name: Keith\n btw I love YAML\n role: CTO }");
        assert_eq!(
            result.object,
            Some(json!({"name": "Keith", "btw I love YAML": null, "role": "CTO"}))
        );
        assert!(result.repairs.contains(&Repair::AddedNullValue));
    }

    #[test]
    fn test_unterminated_object_is_closed() {
        let result = ok(r#"{"a": 1"#);
        assert_eq!(result.object, Some(json!({"a": 1})));
        assert!(result.repairs.contains(&Repair::ClosedUnterminatedBrace));
        assert_eq!(Repair::ClosedUnterminatedBrace.cost(), 3);
    }

    #[test]
    fn test_unterminated_array_is_closed() {
        let result = ok("[1, 2");
        assert_eq!(result.object, Some(json!([1, 2])));
        assert!(result.repairs.contains(&Repair::ClosedUnterminatedBracket));
    }

    #[test]
    fn test_trailing_comma_removed() {
        let result = ok(r#"{"a": 1,}"#);
        assert_eq!(result.object, Some(json!({"a": 1})));
        assert!(result.repairs.contains(&Repair::RemovedTrailingComma));
    }

    #[test]
    fn test_single_quoted_strings() {
        let result = ok("{'name': 'Frank'}");
        assert_eq!(result.object, Some(json!({"name": "Frank"})));
        assert!(result.repairs.contains(&Repair::NormalizedSingleQuotes));
    }

    #[test]
    fn test_smart_quoted_value() {
        let result = ok("{\"a\": \u{201C}hi\u{201D}}");
        assert_eq!(result.object, Some(json!({"a": "hi"})));
        assert!(result.repairs.contains(&Repair::NormalizedSmartQuotes));
    }

    #[test]
    fn test_inline_comment_dropped() {
        let result = ok("{a: fast # really fast\n b: 2}");
        assert_eq!(result.object, Some(json!({"a": "fast", "b": 2})));
        assert!(result.repairs.contains(&Repair::RemovedInlineComment));
    }

    #[test]
    fn test_unquoted_scalar_with_punctuation() {
        let result = ok("{url: https://example.com/x, tag: a-b}");
        assert_eq!(
            result.object,
            Some(json!({"url": "https://example.com/x", "tag": "a-b"}))
        );
    }

    #[test]
    fn test_unquoted_unicode_scalar() {
        let result = ok("{mood: 🦀 happy}");
        assert_eq!(result.object, Some(json!({"mood": "🦀 happy"})));
        assert!(result.repairs.contains(&Repair::QuotedTextScalar));
    }

    #[test]
    fn test_array_elements_repaired() {
        let result = ok("[one two\nthree]");
        assert_eq!(result.object, Some(json!(["one two", "three"])));
    }

    #[test]
    fn test_missing_value_before_close() {
        let result = ok("{a: }");
        assert_eq!(result.object, Some(json!({"a": null})));
    }

    #[test]
    fn test_non_container_span_fails() {
        let result = reconstruct("name: Alice");
        assert!(!result.success);
        assert!(result.object.is_none());
    }

    #[test]
    fn test_plain_text_fails() {
        let result = reconstruct("hello there");
        assert!(!result.success);
    }

    #[test]
    fn test_keywords_pass_through() {
        let result = ok(r#"{"a": true, "b": false, "c": null}"#);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_negative_and_float_numbers() {
        let result = ok(r#"{"a": -1, "b": 2.5}"#);
        assert_eq!(result.object, Some(json!({"a": -1, "b": 2.5})));
    }

    #[test]
    fn test_double_commas_are_collapsed() {
        let result = ok(r#"{"a": 1,, "b": 2}"#);
        assert_eq!(result.object, Some(json!({"a": 1, "b": 2})));
    }
}
