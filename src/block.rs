//! Final output blocks produced by the pipeline driver.

use serde_json::{json, Value};

use crate::repair::{Repair, RepairMode};

/// One block of the parsed output, in narrative order.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBlock {
    /// A run of narration.
    Text(TextBlock),
    /// A repaired structured span.
    Object(ObjectBlock),
}

impl RawBlock {
    /// Returns the text block, if this is one.
    #[inline]
    pub fn as_text(&self) -> Option<&TextBlock> {
        match self {
            Self::Text(block) => Some(block),
            Self::Object(_) => None,
        }
    }

    /// Returns the object block, if this is one.
    #[inline]
    pub fn as_object(&self) -> Option<&ObjectBlock> {
        match self {
            Self::Object(block) => Some(block),
            Self::Text(_) => None,
        }
    }
}

/// A maximal run of narration text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    /// The narration, trimmed.
    pub text: String,
}

/// A structured span that survived repair, with its full diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectBlock {
    /// The decoded JSON value.
    pub object: Value,
    /// The original span exactly as it appeared in the input.
    pub raw: String,
    /// The strict JSON text that decoded to `object`.
    pub repaired_text: String,
    /// Non-fatal observations made during reconstruction.
    pub warnings: Vec<String>,
    /// Ordered log of repairs performed on this span.
    pub repairs: Vec<Repair>,
    /// Cumulative repair cost (0 = the span was already valid).
    pub score: u32,
    /// Which reconstructor won for this span.
    pub mode: RepairMode,
}

impl ObjectBlock {
    /// Returns a JSON summary of how this block was repaired.
    ///
    /// Useful for building debugging tools on top of the default
    /// projections, which discard the diagnostics.
    ///
    /// # Examples
    ///
    /// ```
    /// use untangle::parse;
    ///
    /// let blocks = parse("{a:1 b:2}");
    /// let explanation = blocks[0].as_object().unwrap().explanation_json();
    /// assert!(explanation["repairs"].is_array());
    /// assert!(explanation["score"].is_number());
    /// ```
    pub fn explanation_json(&self) -> Value {
        let repairs: Vec<Value> = self
            .repairs
            .iter()
            .map(|r| {
                json!({
                    "kind": r,
                    "description": r.description(),
                    "cost": r.cost(),
                })
            })
            .collect();
        json!({
            "mode": self.mode,
            "score": self.score,
            "repairs": repairs,
            "warnings": self.warnings,
            "raw": self.raw,
            "repaired_text": self.repaired_text,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> ObjectBlock {
        ObjectBlock {
            object: json!({"a": 1}),
            raw: "{a: 1}".into(),
            repaired_text: r#"{"a":1}"#.into(),
            warnings: Vec::new(),
            repairs: vec![Repair::QuotedBareKey],
            score: Repair::QuotedBareKey.cost(),
            mode: RepairMode::JsonIsh,
        }
    }

    #[test]
    fn test_accessors() {
        let text = RawBlock::Text(TextBlock { text: "hi".into() });
        assert!(text.as_text().is_some());
        assert!(text.as_object().is_none());

        let object = RawBlock::Object(sample());
        assert!(object.as_object().is_some());
        assert!(object.as_text().is_none());
    }

    #[test]
    fn test_explanation_json_shape() {
        let explanation = sample().explanation_json();
        assert_eq!(explanation["mode"], json!("json_ish"));
        assert_eq!(explanation["score"], json!(2));
        assert_eq!(explanation["repairs"][0]["description"], json!("quoted bare key"));
        assert_eq!(explanation["repairs"][0]["cost"], json!(2));
    }
}
