//! Grammar-directed repair of structured candidate spans.
//!
//! The orchestrator tries the JSON-leaning reconstructor first; if its
//! output fails strict validation it falls back to the YAML-leaning one.
//! Whatever succeeds is returned together with the full repair log and its
//! cumulative cost, so callers can inspect exactly what was done to the
//! input.

mod json;
mod yaml;

use serde::Serialize;
use serde_json::Value;

/// Score carried by a failed reconstruction; never beats a success.
pub const FAILURE_SCORE: u32 = u32::MAX;

/// Which reconstructor produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairMode {
    /// The JSON-leaning reconstructor.
    JsonIsh,
    /// The YAML-leaning reconstructor.
    YamlIsh,
}

/// One repair performed while rewriting a span.
///
/// Every score increment corresponds to exactly one logged repair, which
/// keeps the cumulative cost explainable after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Repair {
    /// Added a comma between two recognized items.
    InsertedComma,
    /// Dropped a comma directly before a closer.
    RemovedTrailingComma,
    /// Synthesized a `}` at end of input.
    ClosedUnterminatedBrace,
    /// Synthesized a `]` at end of input.
    ClosedUnterminatedBracket,
    /// Quoted an unquoted (possibly multiword) object key.
    QuotedBareKey,
    /// A key had no colon; bound it to `null`.
    AddedNullValue,
    /// Quoted an unquoted scalar that started with a bare word.
    QuotedBareScalar,
    /// Quoted an unquoted scalar that started with free text.
    QuotedTextScalar,
    /// Dropped an inline `#` comment.
    RemovedInlineComment,
    /// Accepted a single-quoted string as a string.
    NormalizedSingleQuotes,
    /// Accepted smart-quoted text as a string.
    NormalizedSmartQuotes,
    /// Fixed penalty for reading the span as YAML at all.
    YamlInterpretation,
    /// Bound a YAML key to an inline value.
    BoundYamlKey,
    /// A YAML key with no value opened a nested mapping.
    OpenedNestedMapping,
    /// Appended a dash item to the list at the current key.
    AppendedListItem,
    /// A dash item arrived at a key holding a scalar; wrapped it.
    CoercedScalarToList,
    /// An inline `{...}` inside a YAML value was repaired as JSON.
    RepairedInlineJson,
}

impl Repair {
    /// Returns the cost this repair contributes to the span score.
    ///
    /// Cheap repairs (1) are near-certain to be what the author meant;
    /// expensive ones (3+) are disfavored when decompositions compete.
    pub const fn cost(&self) -> u32 {
        match self {
            Self::InsertedComma => 1,
            Self::RemovedTrailingComma => 1,
            Self::ClosedUnterminatedBrace => 3,
            Self::ClosedUnterminatedBracket => 3,
            Self::QuotedBareKey => 2,
            Self::AddedNullValue => 3,
            Self::QuotedBareScalar => 2,
            Self::QuotedTextScalar => 1,
            Self::RemovedInlineComment => 1,
            Self::NormalizedSingleQuotes => 1,
            Self::NormalizedSmartQuotes => 2,
            Self::YamlInterpretation => 5,
            Self::BoundYamlKey => 1,
            Self::OpenedNestedMapping => 1,
            Self::AppendedListItem => 1,
            Self::CoercedScalarToList => 1,
            Self::RepairedInlineJson => 2,
        }
    }

    /// Returns a human-readable description of this repair.
    pub const fn description(self) -> &'static str {
        match self {
            Self::InsertedComma => "added missing comma",
            Self::RemovedTrailingComma => "removed trailing comma",
            Self::ClosedUnterminatedBrace => "closed unterminated object",
            Self::ClosedUnterminatedBracket => "closed unterminated array",
            Self::QuotedBareKey => "quoted bare key",
            Self::AddedNullValue => "added missing colon and null value",
            Self::QuotedBareScalar => "quoted unquoted scalar",
            Self::QuotedTextScalar => "quoted free-text scalar",
            Self::RemovedInlineComment => "removed inline comment",
            Self::NormalizedSingleQuotes => "converted single quotes to double quotes",
            Self::NormalizedSmartQuotes => "normalized smart quotes",
            Self::YamlInterpretation => "interpreted span as YAML",
            Self::BoundYamlKey => "bound key to value",
            Self::OpenedNestedMapping => "opened nested mapping",
            Self::AppendedListItem => "appended list item",
            Self::CoercedScalarToList => "coerced scalar into a one-element list",
            Self::RepairedInlineJson => "repaired inline JSON value",
        }
    }
}

/// Outcome of reconstructing one candidate span.
#[derive(Debug, Clone)]
pub struct RepairResult {
    /// Whether a decodable rewrite was produced.
    pub success: bool,
    /// The decoded value, when successful.
    pub object: Option<Value>,
    /// The strict JSON text that decoded to `object`.
    pub repaired_text: Option<String>,
    /// Non-fatal observations (skipped tokens, dropped fragments).
    pub warnings: Vec<String>,
    /// Ordered log of performed repairs.
    pub repairs: Vec<Repair>,
    /// Cumulative repair cost; [`FAILURE_SCORE`] when failed.
    pub score: u32,
    /// Which reconstructor produced this result.
    pub mode: RepairMode,
}

impl RepairResult {
    pub(crate) fn succeeded(
        mode: RepairMode,
        object: Value,
        repaired_text: String,
        repairs: Vec<Repair>,
        warnings: Vec<String>,
    ) -> Self {
        let score = repairs.iter().map(|r| r.cost()).sum();
        Self {
            success: true,
            object: Some(object),
            repaired_text: Some(repaired_text),
            warnings,
            repairs,
            score,
            mode,
        }
    }

    pub(crate) fn failed(mode: RepairMode, warnings: Vec<String>) -> Self {
        Self {
            success: false,
            object: None,
            repaired_text: None,
            warnings,
            repairs: Vec::new(),
            score: FAILURE_SCORE,
            mode,
        }
    }
}

/// Repairs one structured-candidate span into strict JSON.
///
/// Runs the JSON-leaning reconstructor first; when its output fails strict
/// validation, retries with the YAML-leaning reconstructor. A failed result
/// (both modes undecodable) carries [`FAILURE_SCORE`] and a diagnostic
/// warning; it is the caller's decision to drop such spans.
///
/// # Examples
///
/// ```
/// use untangle::repair::{repair, RepairMode};
///
/// let result = repair("{a:1 b:2}");
/// assert!(result.success);
/// assert_eq!(result.mode, RepairMode::JsonIsh);
/// assert_eq!(result.repaired_text.as_deref(), Some(r#"{"a":1,"b":2}"#));
/// ```
pub fn repair(raw: &str) -> RepairResult {
    let json = json::reconstruct(raw);
    if json.success {
        return json;
    }
    let yaml = yaml::reconstruct(raw);
    if yaml.success {
        return yaml;
    }

    let mut warnings = json.warnings;
    warnings.extend(yaml.warnings);
    warnings.push("neither JSON- nor YAML-mode reconstruction produced a decodable value".into());
    RepairResult::failed(RepairMode::YamlIsh, warnings)
}
