//! Parsing of rule generator replies.
//!
//! Models don't always return clean JSON. The reply is tried as-is, then
//! from a fenced code block, then as the outermost `{ ... }` span, each
//! also with trailing commas stripped. Anything still unparsable is a
//! [`RuleError::Malformed`] outcome.

use serde::Deserialize;

use crate::{RuleEntry, RuleError, RuleSet};

/// The reply shape the generator is asked to produce.
#[derive(Debug, Deserialize)]
struct GeneratedRules {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Option<Vec<RuleEntry>>,
    #[serde(default)]
    error: Option<String>,
}

/// Parses a generator reply and validates the rule set it describes.
pub fn parse_generated_rules(raw: &str) -> Result<RuleSet, RuleError> {
    let reply = parse_reply(raw)?;

    if !reply.success {
        let reason = reply
            .error
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| "no reason given".to_owned());
        return Err(RuleError::Rejected(reason));
    }

    let entries = reply
        .result
        .ok_or_else(|| RuleError::Malformed("reply has no result".to_owned()))?;

    Ok(RuleSet::from_entries(entries)?)
}

fn parse_reply(raw: &str) -> Result<GeneratedRules, RuleError> {
    let trimmed = raw.trim();

    let mut candidates = vec![trimmed];
    if let Some(block) = extract_json_from_codeblock(trimmed) {
        candidates.push(block);
    }
    if let Some(object) = outermost_object(trimmed) {
        candidates.push(object);
    }

    for candidate in candidates {
        if let Ok(reply) = serde_json::from_str::<GeneratedRules>(candidate) {
            return Ok(reply);
        }
        if let Ok(reply) = serde_json::from_str::<GeneratedRules>(&strip_trailing_commas(candidate)) {
            return Ok(reply);
        }
    }

    tracing::warn!(raw_response = raw, "unparsable rule generator reply");
    Err(RuleError::Malformed("no JSON object found in reply".to_owned()))
}

/// Returns the contents of the first ``` fenced block, skipping a
/// language tag such as `json`.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body_start = after_fence.find('\n').map_or(0, |i| i + 1);
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// Returns the span from the first `{` to the last `}`.
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Removes commas that directly precede a closing `}` or `]`. Text inside
/// string literals is copied unchanged.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "success": true,
        "result": [
            {"object": "dragon", "emoji": "🐉", "loses_against": ["knight"], "wins_against": ["wizard"], "logic": "Knights slay dragons."},
            {"object": "knight", "emoji": "🛡️", "loses_against": ["wizard"], "wins_against": ["dragon"], "logic": "Wizards outwit knights."},
            {"object": "wizard", "emoji": "🧙", "loses_against": ["dragon"], "wins_against": ["knight"], "logic": "Dragons burn wizards."}
        ],
        "error": null
    }"#;

    #[test]
    fn test_parse_clean_reply() {
        let rules = parse_generated_rules(VALID).unwrap();
        let dragon = rules.index_of("dragon").unwrap();
        assert_eq!(rules.rationale(dragon), Some("Knights slay dragons."));
    }

    #[test]
    fn test_parse_reply_inside_code_block() {
        let raw = format!("Here you go:\n```json\n{VALID}\n```\nEnjoy!");
        assert!(parse_generated_rules(&raw).is_ok());
    }

    #[test]
    fn test_parse_reply_surrounded_by_prose() {
        let raw = format!("Sure! {VALID} Let me know if you need more.");
        assert!(parse_generated_rules(&raw).is_ok());
    }

    #[test]
    fn test_parse_reply_with_trailing_commas() {
        let raw = VALID.replace("\"Dragons burn wizards.\"}", "\"Dragons burn wizards.\",}");
        assert!(parse_generated_rules(&raw).is_ok());
    }

    #[test]
    fn test_parse_declined_reply_carries_reason() {
        let raw = r#"{"success": false, "result": null, "error": "cannot compare feelings"}"#;
        let result = parse_generated_rules(raw);
        assert!(matches!(result, Err(RuleError::Rejected(r)) if r == "cannot compare feelings"));
    }

    #[test]
    fn test_parse_success_without_result_is_malformed() {
        let result = parse_generated_rules(r#"{"success": true}"#);
        assert!(matches!(result, Err(RuleError::Malformed(_))));
    }

    #[test]
    fn test_parse_garbage_is_malformed_not_panic() {
        let result = parse_generated_rules("I'm sorry, I can't help with that.");
        assert!(matches!(result, Err(RuleError::Malformed(_))));
    }

    #[test]
    fn test_parse_contradictory_rules_are_invalid() {
        let raw = r#"{"success": true, "result": [
            {"object": "a", "emoji": "1", "loses_against": ["b"]},
            {"object": "b", "emoji": "2", "loses_against": ["a", "c"]},
            {"object": "c", "emoji": "3", "loses_against": ["a"]}
        ]}"#;
        assert!(matches!(parse_generated_rules(raw), Err(RuleError::Invalid(_))));
    }

    #[test]
    fn test_strip_trailing_commas_keeps_inner_commas() {
        assert_eq!(strip_trailing_commas("[1, 2,\n]"), "[1, 2\n]");
        assert_eq!(strip_trailing_commas(r#"{"a": [1,2],}"#), r#"{"a": [1,2]}"#);
    }

    #[test]
    fn test_strip_trailing_commas_leaves_strings_alone() {
        assert_eq!(
            strip_trailing_commas(r#"["Rock wins, ]", "say \"hi, }\"",]"#),
            r#"["Rock wins, ]", "say \"hi, }\""]"#
        );
    }

    #[test]
    fn test_parse_trailing_commas_keeps_rationale_text() {
        let raw = VALID
            .replace("Knights slay dragons.", "Knights slay dragons, }")
            .replace(r#""Dragons burn wizards."}"#, r#""Dragons burn wizards."},"#);
        let rules = parse_generated_rules(&raw).unwrap();
        let dragon = rules.index_of("dragon").unwrap();
        assert_eq!(rules.rationale(dragon), Some("Knights slay dragons, }"));
    }
}
