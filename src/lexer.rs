//! Fuzzy lexer that yields weighted token interpretations.
//!
//! At every cursor position the lexer offers a small lattice of candidate
//! tokens, each tagged with a repair cost (0 = the bytes already are what the
//! token claims). Callers that just want to move forward use
//! [`Lexer::consume_best`], which picks the cheapest interpretation; the
//! segmentation parser additionally inspects the full candidate list to
//! decide where structured spans begin.
//!
//! The lexer never fails: a one-character `Text` fallback guarantees progress
//! on any byte, so every loop built on top of it terminates in O(input)
//! steps.

/// Cost of accepting a single-quoted string in a delimiter context.
pub const COST_SINGLE_QUOTED: u32 = 1;
/// Cost of pairing Unicode smart quotes as string delimiters.
pub const COST_SMART_QUOTED: u32 = 2;
/// Cost of reading a bare word where strict JSON would require quotes.
pub const COST_BARE_WORD: u32 = 2;

/// Token kinds produced by the lattice lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// A quoted string (double, single, or smart quotes), decoded.
    Str,
    /// A numeric literal, kept verbatim.
    Number,
    /// `true` or `false`.
    Bool,
    /// `null`.
    Null,
    /// An unquoted identifier-like word.
    BareWord,
    /// `{`
    BraceOpen,
    /// `}`
    BraceClose,
    /// `[`
    BracketOpen,
    /// `]`
    BracketClose,
    /// `:`
    Colon,
    /// `,`
    Comma,
    /// `-` not followed by a digit.
    Dash,
    /// A run of spaces and tabs.
    Whitespace,
    /// A whitespace run containing at least one newline.
    Newline,
    /// A single uninterpreted character.
    Text,
    /// ```` ```json ```` fence marker.
    FenceJson,
    /// ```` ```yaml ```` fence marker.
    FenceYaml,
    /// A fence marker with no recognized language tag (including closers).
    FenceEnd,
}

/// One interpretation of the bytes at a cursor position.
///
/// Candidates are produced fresh on each query and never mutated. `end` is
/// the byte offset of the cursor after consuming this candidate; `cost` is
/// the repair price of accepting this interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCandidate {
    /// What the bytes were interpreted as.
    pub kind: TokenKind,
    /// Decoded content for strings, literal text otherwise.
    pub value: String,
    /// Byte offset immediately after the token.
    pub end: usize,
    /// Non-negative repair cost; 0 means no repair needed.
    pub cost: u32,
    /// Human-readable description of the repair, if any.
    pub note: Option<&'static str>,
}

impl TokenCandidate {
    fn exact(kind: TokenKind, value: impl Into<String>, end: usize) -> Self {
        Self {
            kind,
            value: value.into(),
            end,
            cost: 0,
            note: None,
        }
    }

    fn repaired(
        kind: TokenKind,
        value: impl Into<String>,
        end: usize,
        cost: u32,
        note: &'static str,
    ) -> Self {
        Self {
            kind,
            value: value.into(),
            end,
            cost,
            note: Some(note),
        }
    }
}

/// Lattice lexer over an immutable input buffer.
///
/// The lexer holds no cursor of its own; callers thread byte offsets through
/// it, which makes checkpoint/restore backtracking a matter of saving an
/// integer.
///
/// # Examples
///
/// ```
/// use untangle::lexer::{Lexer, TokenKind};
///
/// let lexer = Lexer::new(r#"{"a": 1}"#);
/// let (tok, next) = lexer.consume_best(0).unwrap();
/// assert_eq!(tok.kind, TokenKind::BraceOpen);
/// assert_eq!(next, 1);
/// ```
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    input: &'a str,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer over the given buffer.
    #[inline]
    pub fn new(input: &'a str) -> Self {
        Self { input }
    }

    /// Returns the underlying buffer.
    #[inline]
    pub fn input(&self) -> &'a str {
        self.input
    }

    /// Returns all plausible interpretations at `pos`, cheapest first.
    ///
    /// Ties are broken by rule priority (fences before strings before
    /// literals before punctuation). The list is empty only at end of
    /// input: the single-character `Text` fallback fires whenever no other
    /// rule matches.
    pub fn candidates_at(&self, pos: usize) -> Vec<TokenCandidate> {
        if pos >= self.input.len() {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        if let Some(c) = self.fence_candidate(pos) {
            candidates.push(c);
        }
        if let Some(c) = self.double_quoted_candidate(pos) {
            candidates.push(c);
        }
        if let Some(c) = self.single_quoted_candidate(pos) {
            candidates.push(c);
        }
        if let Some(c) = self.smart_quoted_candidate(pos) {
            candidates.push(c);
        }
        if let Some(c) = self.number_candidate(pos) {
            candidates.push(c);
        }
        if let Some(c) = self.word_candidate(pos) {
            candidates.push(c);
        }
        if let Some(c) = self.punct_candidate(pos) {
            candidates.push(c);
        }
        if let Some(c) = self.whitespace_candidate(pos) {
            candidates.push(c);
        }

        if candidates.is_empty() {
            // Fallback: one raw character, so progress is always possible.
            let ch = self.char_at(pos).unwrap_or('\u{FFFD}');
            candidates.push(TokenCandidate::exact(
                TokenKind::Text,
                ch.to_string(),
                pos + ch.len_utf8(),
            ));
        }

        // Stable sort keeps the priority order within equal costs.
        candidates.sort_by_key(|c| c.cost);
        candidates
    }

    /// Picks the lowest-cost candidate at `pos` and returns it with the new
    /// cursor position. Returns `None` at end of input.
    pub fn consume_best(&self, pos: usize) -> Option<(TokenCandidate, usize)> {
        self.candidates_at(pos).into_iter().next().map(|c| {
            let end = c.end;
            (c, end)
        })
    }

    /// True when only horizontal whitespace separates `pos` from the start
    /// of its line (or from the start of the buffer).
    pub fn at_line_start(&self, pos: usize) -> bool {
        for ch in self.input[..pos.min(self.input.len())].chars().rev() {
            match ch {
                '\n' => return true,
                ' ' | '\t' => continue,
                _ => return false,
            }
        }
        true
    }

    /// The last non-whitespace character before `pos`, if any.
    fn prev_significant(&self, pos: usize) -> Option<char> {
        self.input[..pos.min(self.input.len())]
            .chars()
            .rev()
            .find(|c| !c.is_whitespace())
    }

    #[inline]
    fn char_at(&self, pos: usize) -> Option<char> {
        self.input[pos..].chars().next()
    }

    fn fence_candidate(&self, pos: usize) -> Option<TokenCandidate> {
        let rest = &self.input[pos..];
        if !rest.starts_with("```") {
            return None;
        }
        let tag_start = pos + 3;
        let tag_len = self.input[tag_start..]
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(self.input.len() - tag_start);
        let tag = &self.input[tag_start..tag_start + tag_len];
        let kind = match tag {
            "json" => TokenKind::FenceJson,
            "yaml" => TokenKind::FenceYaml,
            _ => TokenKind::FenceEnd,
        };
        Some(TokenCandidate::exact(kind, tag, tag_start + tag_len))
    }

    fn double_quoted_candidate(&self, pos: usize) -> Option<TokenCandidate> {
        if self.char_at(pos) != Some('"') {
            return None;
        }
        let (decoded, end) = self.read_quoted(pos, '"')?;
        Some(TokenCandidate::exact(TokenKind::Str, decoded, end))
    }

    fn single_quoted_candidate(&self, pos: usize) -> Option<TokenCandidate> {
        if self.char_at(pos) != Some('\'') {
            return None;
        }
        // Only a delimiter when the grammar could expect a value or key
        // here; protects apostrophes in narration.
        match self.prev_significant(pos) {
            None | Some(':') | Some(',') | Some('[') | Some('{') => {}
            _ => return None,
        }
        let (decoded, end) = self.read_quoted(pos, '\'')?;
        Some(TokenCandidate::repaired(
            TokenKind::Str,
            decoded,
            end,
            COST_SINGLE_QUOTED,
            "converted single-quoted string",
        ))
    }

    fn smart_quoted_candidate(&self, pos: usize) -> Option<TokenCandidate> {
        if self.char_at(pos) != Some('\u{201C}') {
            return None;
        }
        let (decoded, end) = self.read_quoted(pos, '\u{201D}')?;
        Some(TokenCandidate::repaired(
            TokenKind::Str,
            decoded,
            end,
            COST_SMART_QUOTED,
            "normalized smart quotes",
        ))
    }

    /// Decodes a quoted run starting at `pos` (which holds the opening
    /// delimiter). Returns `None` when the closing delimiter is missing, so
    /// an unterminated quote falls through to the `Text` fallback.
    fn read_quoted(&self, pos: usize, close: char) -> Option<(String, usize)> {
        let open = self.char_at(pos)?;
        let body = pos + open.len_utf8();
        let mut decoded = String::new();
        let mut chars = self.input[body..].char_indices();
        while let Some((i, ch)) = chars.next() {
            if ch == close {
                return Some((decoded, body + i + close.len_utf8()));
            }
            if ch != '\\' {
                decoded.push(ch);
                continue;
            }
            match chars.next() {
                Some((_, 'n')) => decoded.push('\n'),
                Some((_, 't')) => decoded.push('\t'),
                Some((_, 'r')) => decoded.push('\r'),
                Some((_, '\\')) => decoded.push('\\'),
                Some((_, 'u')) => {
                    // \uXXXX; malformed sequences keep the literal "u".
                    let mut code = 0u32;
                    let mut ok = 0;
                    let mut probe = chars.clone();
                    for _ in 0..4 {
                        match probe.next().and_then(|(_, h)| h.to_digit(16)) {
                            Some(d) => {
                                code = code * 16 + d;
                                ok += 1;
                            }
                            None => break,
                        }
                    }
                    if ok == 4 {
                        chars = probe;
                        decoded.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                    } else {
                        decoded.push('u');
                    }
                }
                Some((_, other)) => decoded.push(other),
                None => return None,
            }
        }
        None
    }

    fn number_candidate(&self, pos: usize) -> Option<TokenCandidate> {
        let rest = &self.input[pos..];
        let bytes = rest.as_bytes();
        let mut i = 0;
        if bytes.first() == Some(&b'-') {
            i += 1;
        }
        let digits_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == digits_start {
            return None;
        }
        if i < bytes.len() && bytes[i] == b'.' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > i + 1 {
                i = j;
            }
        }
        if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
            let mut j = i + 1;
            if j < bytes.len() && matches!(bytes[j], b'+' | b'-') {
                j += 1;
            }
            let exponent_digits = j;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > exponent_digits {
                i = j;
            }
        }
        Some(TokenCandidate::exact(TokenKind::Number, &rest[..i], pos + i))
    }

    fn word_candidate(&self, pos: usize) -> Option<TokenCandidate> {
        let rest = &self.input[pos..];
        let first = rest.chars().next()?;
        if !(first.is_ascii_alphabetic() || first == '_' || first == '$') {
            return None;
        }
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '-')))
            .unwrap_or(rest.len());
        let word = &rest[..end];
        // Keyword literals win over bare words and are never shadowed.
        let candidate = match word {
            "true" | "false" => TokenCandidate::exact(TokenKind::Bool, word, pos + end),
            "null" => TokenCandidate::exact(TokenKind::Null, word, pos + end),
            _ => TokenCandidate::repaired(
                TokenKind::BareWord,
                word,
                pos + end,
                COST_BARE_WORD,
                "needs quoting",
            ),
        };
        Some(candidate)
    }

    fn punct_candidate(&self, pos: usize) -> Option<TokenCandidate> {
        let ch = self.char_at(pos)?;
        let kind = match ch {
            '{' => TokenKind::BraceOpen,
            '}' => TokenKind::BraceClose,
            '[' => TokenKind::BracketOpen,
            ']' => TokenKind::BracketClose,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '-' => {
                // A dash directly before a digit is a negative number, not
                // punctuation; the number rule already claimed it.
                if self
                    .char_at(pos + 1)
                    .is_some_and(|next| next.is_ascii_digit())
                {
                    return None;
                }
                TokenKind::Dash
            }
            _ => return None,
        };
        Some(TokenCandidate::exact(kind, ch.to_string(), pos + 1))
    }

    fn whitespace_candidate(&self, pos: usize) -> Option<TokenCandidate> {
        let rest = &self.input[pos..];
        let first = rest.chars().next()?;
        if !matches!(first, ' ' | '\t' | '\n') {
            return None;
        }
        let end = rest
            .find(|c: char| !matches!(c, ' ' | '\t' | '\n'))
            .unwrap_or(rest.len());
        let run = &rest[..end];
        if run.contains('\n') {
            Some(TokenCandidate::exact(TokenKind::Newline, run, pos + end))
        } else {
            // Consecutive horizontal whitespace collapses to one space.
            Some(TokenCandidate::exact(TokenKind::Whitespace, " ", pos + end))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn best_kind(input: &str, pos: usize) -> TokenKind {
        let lexer = Lexer::new(input);
        lexer.consume_best(pos).unwrap().0.kind
    }

    #[test]
    fn test_end_of_input_has_no_candidates() {
        let lexer = Lexer::new("x");
        assert!(lexer.candidates_at(1).is_empty());
        assert!(lexer.consume_best(1).is_none());
    }

    #[test]
    fn test_fence_classification() {
        assert_eq!(best_kind("```json\n{}", 0), TokenKind::FenceJson);
        assert_eq!(best_kind("```yaml\na: 1", 0), TokenKind::FenceYaml);
        assert_eq!(best_kind("```python\nprint()", 0), TokenKind::FenceEnd);
        assert_eq!(best_kind("```\n", 0), TokenKind::FenceEnd);
    }

    #[test]
    fn test_fence_consumes_tag() {
        let lexer = Lexer::new("```json\n");
        let (tok, next) = lexer.consume_best(0).unwrap();
        assert_eq!(tok.value, "json");
        assert_eq!(next, 7);
    }

    #[test]
    fn test_double_quoted_string_decodes_escapes() {
        let lexer = Lexer::new(r#""a\nb\"c""#);
        let (tok, _) = lexer.consume_best(0).unwrap();
        assert_eq!(tok.kind, TokenKind::Str);
        assert_eq!(tok.value, "a\nb\"c");
        assert_eq!(tok.cost, 0);
    }

    #[test]
    fn test_unicode_escape() {
        let lexer = Lexer::new("\"\\u0041\"");
        let (tok, _) = lexer.consume_best(0).unwrap();
        assert_eq!(tok.value, "A");
    }

    #[test]
    fn test_unterminated_double_quote_falls_back_to_text() {
        let lexer = Lexer::new("\"oops");
        let (tok, next) = lexer.consume_best(0).unwrap();
        assert_eq!(tok.kind, TokenKind::Text);
        assert_eq!(next, 1);
    }

    #[test]
    fn test_single_quote_accepted_after_delimiter() {
        let lexer = Lexer::new("{'name': 1}");
        let (tok, _) = lexer.consume_best(1).unwrap();
        assert_eq!(tok.kind, TokenKind::Str);
        assert_eq!(tok.value, "name");
        assert_eq!(tok.cost, COST_SINGLE_QUOTED);
    }

    #[test]
    fn test_single_quote_accepted_at_buffer_start() {
        let lexer = Lexer::new("'hello'");
        let (tok, _) = lexer.consume_best(0).unwrap();
        assert_eq!(tok.kind, TokenKind::Str);
    }

    #[test]
    fn test_apostrophe_in_narration_is_text() {
        // Previous significant char is a letter, so the quote rule refuses.
        let lexer = Lexer::new("I'll do it");
        let (tok, next) = lexer.consume_best(1).unwrap();
        assert_eq!(tok.kind, TokenKind::Text);
        assert_eq!(tok.value, "'");
        assert_eq!(next, 2);
    }

    #[test]
    fn test_smart_quotes_cost_two() {
        let lexer = Lexer::new("\u{201C}hi\u{201D}");
        let (tok, _) = lexer.consume_best(0).unwrap();
        assert_eq!(tok.kind, TokenKind::Str);
        assert_eq!(tok.value, "hi");
        assert_eq!(tok.cost, COST_SMART_QUOTED);
        assert!(tok.note.is_some());
    }

    #[test]
    fn test_number_forms() {
        for (input, literal) in [
            ("42", "42"),
            ("-7", "-7"),
            ("3.25", "3.25"),
            ("-0.5", "-0.5"),
            ("1e5", "1e5"),
            ("2.5e-3", "2.5e-3"),
        ] {
            let lexer = Lexer::new(input);
            let (tok, _) = lexer.consume_best(0).unwrap();
            assert_eq!(tok.kind, TokenKind::Number);
            assert_eq!(tok.value, literal);
        }
    }

    #[test]
    fn test_number_stops_at_bare_dot() {
        let lexer = Lexer::new("1.x");
        let (tok, next) = lexer.consume_best(0).unwrap();
        assert_eq!(tok.value, "1");
        assert_eq!(next, 1);
    }

    #[test]
    fn test_keywords_not_shadowed_by_bare_words() {
        assert_eq!(best_kind("true", 0), TokenKind::Bool);
        assert_eq!(best_kind("false", 0), TokenKind::Bool);
        assert_eq!(best_kind("null", 0), TokenKind::Null);
        assert_eq!(best_kind("nullable", 0), TokenKind::BareWord);
        assert_eq!(best_kind("truthy", 0), TokenKind::BareWord);
    }

    #[test]
    fn test_bare_word_cost_and_note() {
        let lexer = Lexer::new("hello-world rest");
        let (tok, _) = lexer.consume_best(0).unwrap();
        assert_eq!(tok.kind, TokenKind::BareWord);
        assert_eq!(tok.value, "hello-world");
        assert_eq!(tok.cost, COST_BARE_WORD);
        assert_eq!(tok.note, Some("needs quoting"));
    }

    #[test]
    fn test_dash_is_punct_only_before_non_digit() {
        assert_eq!(best_kind("- item", 0), TokenKind::Dash);
        assert_eq!(best_kind("-12", 0), TokenKind::Number);
    }

    #[test]
    fn test_whitespace_and_newline_runs() {
        let lexer = Lexer::new("  \t x");
        let (tok, next) = lexer.consume_best(0).unwrap();
        assert_eq!(tok.kind, TokenKind::Whitespace);
        assert_eq!(tok.value, " ");
        assert_eq!(next, 4);

        let lexer = Lexer::new(" \n\n x");
        let (tok, next) = lexer.consume_best(0).unwrap();
        assert_eq!(tok.kind, TokenKind::Newline);
        assert_eq!(next, 4);
    }

    #[test]
    fn test_fallback_guarantees_progress() {
        let lexer = Lexer::new("#%🦀");
        let mut pos = 0;
        let mut kinds = Vec::new();
        while let Some((tok, next)) = lexer.consume_best(pos) {
            assert!(next > pos);
            kinds.push(tok.kind);
            pos = next;
        }
        assert_eq!(kinds, vec![TokenKind::Text, TokenKind::Text, TokenKind::Text]);
    }

    #[test]
    fn test_candidates_sorted_by_cost() {
        let lexer = Lexer::new("word");
        let candidates = lexer.candidates_at(0);
        for pair in candidates.windows(2) {
            assert!(pair[0].cost <= pair[1].cost);
        }
    }

    #[test]
    fn test_at_line_start() {
        let lexer = Lexer::new("a\n  b: 1");
        assert!(lexer.at_line_start(0));
        assert!(!lexer.at_line_start(1));
        assert!(lexer.at_line_start(2));
        assert!(lexer.at_line_start(4)); // only indentation before `b`
        assert!(!lexer.at_line_start(5));
    }
}
