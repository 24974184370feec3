//! # untangle
//!
//! A forgiving parser that splits messy LLM output into narration and
//! structured spans, repairing each span into strict JSON.
//!
//! Model responses rarely contain clean JSON: the object is wrapped in
//! prose, fenced as markdown, written half as YAML, missing commas and
//! quotes, or interrupted by a stray sentence in the middle of a brace
//! block. This library handles all of that without ever rejecting outright
//! when a plausible interpretation exists:
//!
//! - narration and structured spans are separated, in order
//! - fenced ```` ```json ````/```` ```yaml ```` blocks, brace/bracket
//!   values, and YAML-style `key:` runs are recognized as candidates
//! - each candidate is rewritten into strict JSON, with every repair
//!   logged and priced
//! - unsalvageable spans are dropped; the surrounding narration survives
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use untangle::parse_to_json;
//!
//! let reply = "Sure! Here is the record:\n{name: Ada, age: 36}\nAnything else?";
//! assert_eq!(parse_to_json(reply), json!({"name": "Ada", "age": 36}));
//! ```
//!
//! ## Block-level access
//!
//! For the full sequence of narration and object blocks, with repair logs
//! and scores per span:
//!
//! ```rust
//! use untangle::{parse, RawBlock};
//!
//! let blocks = parse("thinking...\n{\"done\": true}");
//! assert_eq!(blocks.len(), 2);
//! let object = blocks[1].as_object().unwrap();
//! assert_eq!(object.score, 0);
//! ```

pub mod block;
pub mod error;
pub mod lexer;
pub mod repair;
pub mod segment;

use std::borrow::Cow;

use serde_json::Value;

pub use block::{ObjectBlock, RawBlock, TextBlock};
pub use repair::{repair, Repair, RepairMode, RepairResult};
pub use segment::{segment, Segment};

/// Configuration threaded through the pipeline entry points.
///
/// There is deliberately no global switch: tracing is decided per call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Emit `log::debug!` records for segmentation and repair decisions.
    pub trace: bool,
}

/// Parses a response into an ordered sequence of [`RawBlock`]s.
///
/// Line endings are normalized (CRLF/CR become LF) before segmentation.
/// Structured spans that cannot be repaired in either mode are dropped,
/// and the narration around them is merged so adjacent text blocks never
/// occur.
///
/// # Examples
///
/// ```
/// use untangle::parse;
///
/// let blocks = parse("no structure here");
/// assert_eq!(blocks.len(), 1);
/// assert!(blocks[0].as_text().is_some());
/// ```
pub fn parse(input: &str) -> Vec<RawBlock> {
    parse_with_options(input, &ParseOptions::default())
}

/// Parses a response with explicit [`ParseOptions`].
pub fn parse_with_options(input: &str, options: &ParseOptions) -> Vec<RawBlock> {
    let normalized = normalize_newlines(input);
    let mut blocks: Vec<RawBlock> = Vec::new();

    for seg in segment::segment(&normalized) {
        match seg {
            Segment::Text { text } => push_text(&mut blocks, text),
            Segment::Structured { raw } => {
                let result = repair::repair(&raw);
                if options.trace {
                    log::debug!(
                        "span of {} bytes: mode {:?}, score {}, {} repair(s)",
                        raw.len(),
                        result.mode,
                        result.score,
                        result.repairs.len()
                    );
                }
                match (result.success, result.object, result.repaired_text) {
                    (true, Some(object), Some(repaired_text)) => {
                        blocks.push(RawBlock::Object(ObjectBlock {
                            object,
                            raw,
                            repaired_text,
                            warnings: result.warnings,
                            repairs: result.repairs,
                            score: result.score,
                            mode: result.mode,
                        }));
                    }
                    _ => {
                        // Unsalvageable span; surrounding narration is
                        // merged by push_text.
                        if options.trace {
                            log::debug!("dropping unsalvageable span of {} bytes", raw.len());
                        }
                    }
                }
            }
        }
    }

    blocks
}

/// Parses a response and projects the object blocks to a single value.
///
/// The projection is a fixed contract: `Null` when no structured span
/// survived, the object itself when exactly one did, and an ordered array
/// when several did.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use untangle::parse_to_json;
///
/// assert_eq!(parse_to_json("nothing structured"), json!(null));
/// assert_eq!(
///     parse_to_json(r#"{"a":1}{"b":2}"#),
///     json!([{"a": 1}, {"b": 2}])
/// );
/// ```
pub fn parse_to_json(input: &str) -> Value {
    let mut objects: Vec<Value> = parse(input)
        .into_iter()
        .filter_map(|block| match block {
            RawBlock::Object(object) => Some(object.object),
            RawBlock::Text(_) => None,
        })
        .collect();
    match objects.len() {
        0 => Value::Null,
        1 => objects.remove(0),
        _ => Value::Array(objects),
    }
}

/// Normalizes CRLF/CR line endings to LF before the core ever sees them.
fn normalize_newlines(input: &str) -> Cow<'_, str> {
    if !input.contains('\r') {
        return Cow::Borrowed(input);
    }
    Cow::Owned(input.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Appends narration, merging with a preceding text block so text runs
/// stay maximal even when a failed span between them was dropped.
fn push_text(blocks: &mut Vec<RawBlock>, text: String) {
    if let Some(RawBlock::Text(prev)) = blocks.last_mut() {
        prev.text.push('\n');
        prev.text.push_str(&text);
    } else {
        blocks.push(RawBlock::Text(TextBlock { text }));
    }
}
