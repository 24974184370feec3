//! YAML-leaning reconstructor.
//!
//! Line-oriented rewrite for indentation/dash/key-colon structures. The
//! reconstructor accumulates a mapping, tracking the most recent key that
//! is still waiting for content (`current_key`) and a stack of nested
//! mapping contexts. Indentation is consulted only to pop back out of a
//! nested mapping; list items attach to the current key no matter how
//! raggedly they are indented. Inline `{...}` values delegate to the JSON
//! reconstructor over the sub-span.
//!
//! A fixed base penalty keeps YAML interpretations from beating JSON ones
//! when both succeed on the same span.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::{
    error::{ParseError, Result},
    repair::{json, Repair, RepairMode, RepairResult},
};

/// Matches a `KEY:` or `KEY: VALUE` line after trimming. Keys may be bare,
/// double-quoted, or single-quoted.
static KEY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>[^:#]+?))\s*:(?P<rest>.*)$"#)
        .expect("key-line regex is valid")
});

/// Rewrites one candidate span in YAML mode.
pub(crate) fn reconstruct(raw: &str) -> RepairResult {
    let mut reconstructor = YamlReconstructor::new(raw);
    match reconstructor.run() {
        Ok(object) => match serde_json::to_string(&object) {
            Ok(text) => RepairResult::succeeded(
                RepairMode::YamlIsh,
                object,
                text,
                reconstructor.repairs,
                reconstructor.warnings,
            ),
            Err(err) => {
                let mut warnings = reconstructor.warnings;
                warnings.push(err.to_string());
                RepairResult::failed(RepairMode::YamlIsh, warnings)
            }
        },
        Err(err) => {
            let mut warnings = reconstructor.warnings;
            warnings.push(err.to_string());
            RepairResult::failed(RepairMode::YamlIsh, warnings)
        }
    }
}

/// A nested mapping opened by a `KEY:` line, folded into its parent when a
/// dedented line (or end of input) closes it.
#[derive(Debug)]
struct Frame {
    key: String,
    open_indent: usize,
    map: Map<String, Value>,
}

struct YamlReconstructor<'a> {
    raw: &'a str,
    repairs: Vec<Repair>,
    warnings: Vec<String>,
}

impl<'a> YamlReconstructor<'a> {
    fn new(raw: &'a str) -> Self {
        Self {
            raw,
            repairs: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn log(&mut self, repair: Repair) {
        self.repairs.push(repair);
    }

    fn run(&mut self) -> Result<Value> {
        self.log(Repair::YamlInterpretation);

        let mut root: Map<String, Value> = Map::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut current_key: Option<String> = None;

        let lines: Vec<&str> = self.raw.lines().collect();
        let mut idx = 0;
        while idx < lines.len() {
            let line = lines[idx];
            idx += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let indent = line.len() - line.trim_start().len();

            if let Some(rest) = dash_item(trimmed) {
                let item = self.scalar(rest.trim());
                let Some(key) = current_key.clone() else {
                    self.warnings.push("list item with no preceding key".into());
                    continue;
                };
                // A pending nested mapping for this key closes before the
                // list coercion below can see it.
                if stack.last().map_or(false, |f| f.key == key) {
                    if let Some(frame) = stack.pop() {
                        let parent = current_map(&mut stack, &mut root);
                        parent.insert(frame.key, Value::Object(frame.map));
                    }
                }
                let map = current_map(&mut stack, &mut root);
                match map.get_mut(&key) {
                    Some(Value::Array(items)) => {
                        items.push(item);
                        self.log(Repair::AppendedListItem);
                    }
                    Some(slot) => {
                        let prior = std::mem::take(slot);
                        *slot = Value::Array(vec![prior, item]);
                        self.log(Repair::CoercedScalarToList);
                    }
                    None => {
                        map.insert(key, Value::Array(vec![item]));
                        self.log(Repair::AppendedListItem);
                    }
                }
                continue;
            }

            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                self.warnings
                    .push(format!("skipped non-mapping line {trimmed:?}"));
                continue;
            }

            let Some(caps) = KEY_LINE.captures(trimmed) else {
                self.warnings
                    .push(format!("skipped unrecognized line {trimmed:?}"));
                continue;
            };

            // A dedented key line pops nested contexts until its
            // indentation is accepted.
            while stack.last().map_or(false, |f| indent <= f.open_indent) {
                if let Some(frame) = stack.pop() {
                    let parent = current_map(&mut stack, &mut root);
                    parent.insert(frame.key, Value::Object(frame.map));
                }
            }
            current_key = None;

            let key = captured_key(&caps);
            let rest = caps.name("rest").map_or("", |m| m.as_str()).trim();
            if !rest.is_empty() {
                let value = self.scalar(rest);
                let map = current_map(&mut stack, &mut root);
                map.insert(key.clone(), value);
                self.log(Repair::BoundYamlKey);
                // Later dash items may still attach here, coercing the
                // bound scalar into a list.
                current_key = Some(key);
                continue;
            }

            // Bare `KEY:` looks one line ahead to choose between a list
            // and a nested mapping.
            let next_line = lines[idx..].iter().find(|l| !l.trim().is_empty());
            match next_line {
                Some(l) if dash_item(l.trim()).is_some() => {
                    let map = current_map(&mut stack, &mut root);
                    map.insert(key.clone(), Value::Array(Vec::new()));
                    current_key = Some(key);
                }
                _ => {
                    stack.push(Frame {
                        key: key.clone(),
                        open_indent: indent,
                        map: Map::new(),
                    });
                    self.log(Repair::OpenedNestedMapping);
                    current_key = Some(key);
                }
            }
        }

        while let Some(frame) = stack.pop() {
            let parent = current_map(&mut stack, &mut root);
            parent.insert(frame.key, Value::Object(frame.map));
        }

        if root.is_empty() {
            return Err(ParseError::Unrecognized("no yaml key lines recognized"));
        }
        Ok(Value::Object(root))
    }

    /// Parses one scalar value. Inline `{...}` (or `[...]`) delegates to
    /// the JSON reconstructor over the sub-span; everything else is typed
    /// in place.
    fn scalar(&mut self, raw: &str) -> Value {
        let s = self.strip_comment(raw).trim();
        if s.is_empty() {
            return Value::Null;
        }
        if s.starts_with('{') || s.starts_with('[') {
            let inner = json::reconstruct(s);
            if inner.success {
                self.log(Repair::RepairedInlineJson);
                self.repairs.extend(inner.repairs);
                self.warnings.extend(inner.warnings);
                if let Some(object) = inner.object {
                    return object;
                }
            }
            self.warnings
                .push("unrepairable inline JSON value kept as text".into());
            return Value::String(s.to_string());
        }
        if let Some(stripped) = quoted_body(s, '"').or_else(|| quoted_body(s, '\'')) {
            return Value::String(stripped.to_string());
        }
        match s {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            "null" | "~" => return Value::Null,
            _ => {}
        }
        if let Ok(number) = serde_json::from_str::<serde_json::Number>(s) {
            return Value::Number(number);
        }
        Value::String(s.to_string())
    }

    /// Drops a ` # ...` comment from an unquoted value.
    fn strip_comment<'s>(&mut self, s: &'s str) -> &'s str {
        let trimmed = s.trim_start();
        if trimmed.starts_with('"') || trimmed.starts_with('\'') || trimmed.starts_with('{') {
            return s;
        }
        match s.find('#') {
            Some(0) => {
                self.log(Repair::RemovedInlineComment);
                ""
            }
            Some(i) if s[..i].ends_with(char::is_whitespace) => {
                self.log(Repair::RemovedInlineComment);
                &s[..i]
            }
            _ => s,
        }
    }
}

fn current_map<'m>(
    stack: &'m mut Vec<Frame>,
    root: &'m mut Map<String, Value>,
) -> &'m mut Map<String, Value> {
    match stack.last_mut() {
        Some(frame) => &mut frame.map,
        None => root,
    }
}

/// Returns the remainder of a `- item` line, or `None` when the line is
/// not a list item (a lone `-` counts; `-3` does not).
fn dash_item(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('-')?;
    if rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t') {
        Some(rest)
    } else {
        None
    }
}

fn quoted_body(s: &str, quote: char) -> Option<&str> {
    let body = s.strip_prefix(quote)?.strip_suffix(quote)?;
    Some(body)
}

fn captured_key(caps: &regex::Captures<'_>) -> String {
    caps.name("dq")
        .or_else(|| caps.name("sq"))
        .or_else(|| caps.name("bare"))
        .map_or(String::new(), |m| m.as_str().trim().to_string())
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
    fn test_simple_mapping() {
        let result = ok("name: Alice\nage: 30");
        assert_eq!(result.object, Some(json!({"name": "Alice", "age": 30})));
        // Base penalty plus one per bound key.
        assert_eq!(result.score, 7);
    }

    #[test]
    fn test_value_typing() {
        let result = ok("a: true\nb: null\nc: 3.5\nd: hello\ne: \"quoted\"");
        assert_eq!(
            result.object,
            Some(json!({"a": true, "b": null, "c": 3.5, "d": "hello", "e": "quoted"}))
        );
    }

    #[test]
    fn test_flat_list_despite_ragged_indentation() {
        let result = ok("items:\n - one\n  - two\n    - three");
        assert_eq!(result.object, Some(json!({"items": ["one", "two", "three"]})));
    }

    #[test]
    fn test_nested_mapping_with_dedent() {
        let result = ok("outer:\n  a: 1\n  b: 2\nafter: 3");
        assert_eq!(
            result.object,
            Some(json!({"outer": {"a": 1, "b": 2}, "after": 3}))
        );
        assert!(result.repairs.contains(&Repair::OpenedNestedMapping));
    }

    #[test]
    fn test_deeply_nested_mappings_fold() {
        let result = ok("a:\n  b:\n    c: 1\nd: 2");
        assert_eq!(result.object, Some(json!({"a": {"b": {"c": 1}}, "d": 2})));
    }

    #[test]
    fn test_trailing_bare_key_binds_empty_mapping() {
        let result = ok("done: yes\npending:");
        assert_eq!(result.object, Some(json!({"done": "yes", "pending": {}})));
    }

    #[test]
    fn test_scalar_coerced_to_list_by_dash() {
        let result = ok("scores: 10\n- 11\n- 12");
        assert_eq!(result.object, Some(json!({"scores": [10, 11, 12]})));
        assert!(result.repairs.contains(&Repair::CoercedScalarToList));
        assert!(result.repairs.contains(&Repair::AppendedListItem));
    }

    #[test]
    fn test_dash_attaches_to_most_recent_key() {
        let result = ok("cfg:\n  x: 1\n- 2");
        assert_eq!(result.object, Some(json!({"cfg": {"x": [1, 2]}})));
    }

    #[test]
    fn test_inline_json_delegation() {
        let result = ok("server: {host: localhost, port: 8080}");
        assert_eq!(
            result.object,
            Some(json!({"server": {"host": "localhost", "port": 8080}}))
        );
        assert!(result.repairs.contains(&Repair::RepairedInlineJson));
    }

    #[test]
    fn test_comment_stripped_from_value() {
        let result = ok("count: 3 # three of them");
        assert_eq!(result.object, Some(json!({"count": 3})));
        assert!(result.repairs.contains(&Repair::RemovedInlineComment));
    }

    #[test]
    fn test_quoted_keys() {
        let result = ok("\"full name\": Ada\n'role': admin");
        assert_eq!(
            result.object,
            Some(json!({"full name": "Ada", "role": "admin"}))
        );
    }

    #[test]
    fn test_dash_item_without_key_is_skipped() {
        let result = ok("- stray\nname: ok");
        assert_eq!(result.object, Some(json!({"name": "ok"})));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("no preceding key")));
    }

    #[test]
    fn test_no_keys_fails() {
        let result = reconstruct("just some prose\nwith no structure");
        assert!(!result.success);
    }

    #[test]
    fn test_negative_number_line_is_not_a_list_item() {
        assert!(dash_item("-3").is_none());
        assert_eq!(dash_item("- 3"), Some(" 3"));
        assert_eq!(dash_item("-"), Some(""));
    }
}
