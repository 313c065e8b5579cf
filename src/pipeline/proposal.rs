//! Extraction of the structured change list from the propose-step reply.
//!
//! Models wrap their JSON in prose and code fences despite instructions.
//! Three tiers run in order (fenced block, balanced-bracket scan, regex
//! salvage); the first candidate that parses as a change list wins. When
//! every tier misses, the raw reply is carried as-is. Parsing never fails
//! and never triggers another model call.

use regex::Regex;

use crate::models::{Proposal, ProposedChange};

pub fn parse_proposal(reply: &str) -> Proposal {
    let candidates = [
        extract_fenced_block(reply),
        extract_balanced_array(reply),
        extract_array_by_regex(reply),
    ];

    for candidate in candidates.into_iter().flatten() {
        if let Some(changes) = try_parse_changes(&candidate) {
            return Proposal::Changes(changes);
        }
    }
    Proposal::Raw(reply.trim().to_string())
}

fn try_parse_changes(candidate: &str) -> Option<Vec<ProposedChange>> {
    serde_json::from_str(candidate).ok()
}

/// Tier 1: contents of the first code fence, tolerating a language tag
/// like ```json on the opening line.
fn extract_fenced_block(reply: &str) -> Option<String> {
    let fence_start = reply.find("```")?;
    let after_fence = &reply[fence_start + 3..];
    let content_start = after_fence.find('\n')? + 1;
    let content = &after_fence[content_start..];
    let fence_end = content.find("```")?;
    Some(content[..fence_end].trim().to_string())
}

/// Tier 2: first balanced bracket pair, skipping brackets inside JSON
/// strings so a "]" in a reason field doesn't cut the array short.
fn extract_balanced_array(reply: &str) -> Option<String> {
    let start = reply.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in reply[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '[' if !in_string => depth += 1,
            ']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(reply[start..start + offset + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Tier 3: regex anchored on an array that opens with an object. Catches
/// payloads the bracket scan loses to stray brackets earlier in the prose.
fn extract_array_by_regex(reply: &str) -> Option<String> {
    let re = Regex::new(r"(?s)\[\s*\{.*?\}\s*\]").ok()?;
    re.find(reply).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANGES_JSON: &str = r#"[
  {"original": "Bonjour le monde", "change": "Bonjour, le monde", "reason": "missing comma"},
  {"original": "est tres grand", "change": "est très grand", "reason": "missing accent"}
]"#;

    fn expect_changes(proposal: Proposal) -> Vec<ProposedChange> {
        match proposal {
            Proposal::Changes(changes) => changes,
            Proposal::Raw(raw) => panic!("expected structured changes, got raw: {raw}"),
        }
    }

    #[test]
    fn direct_array_parses() {
        let changes = expect_changes(parse_proposal(CHANGES_JSON));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].reason, "missing comma");
    }

    #[test]
    fn fenced_block_inside_prose_is_extracted() {
        let reply = format!(
            "Here are my suggested corrections:\n\n```json\n{CHANGES_JSON}\n```\n\nLet me know if you need more."
        );
        let changes = expect_changes(parse_proposal(&reply));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[1].change, "est très grand");
    }

    #[test]
    fn bare_fence_without_language_tag() {
        let reply = format!("Suggestions:\n```\n{CHANGES_JSON}\n```");
        let changes = expect_changes(parse_proposal(&reply));
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn unfenced_array_in_prose_found_by_bracket_scan() {
        let reply = format!("I reviewed the text. {CHANGES_JSON} That is all.");
        let changes = expect_changes(parse_proposal(&reply));
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn bracket_inside_string_does_not_cut_the_array() {
        let reply = r#"[{"original": "a", "change": "b", "reason": "fixes [sic] marker"}]"#;
        let changes = expect_changes(parse_proposal(reply));
        assert_eq!(changes[0].reason, "fixes [sic] marker");
    }

    #[test]
    fn regex_salvages_after_misleading_bracket() {
        let reply = format!("[Note] I found two issues. {CHANGES_JSON}");
        let changes = expect_changes(parse_proposal(&reply));
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn empty_array_is_a_valid_empty_change_list() {
        let changes = expect_changes(parse_proposal("[]"));
        assert!(changes.is_empty());
    }

    #[test]
    fn prose_reply_carries_raw() {
        let reply = "  The translation reads well. No changes needed.  ";
        match parse_proposal(reply) {
            Proposal::Raw(raw) => {
                assert_eq!(raw, "The translation reads well. No changes needed.");
            }
            Proposal::Changes(_) => panic!("expected raw carry"),
        }
    }

    #[test]
    fn malformed_fenced_json_falls_back_to_raw() {
        let reply = "```json\n[{broken\n```";
        assert!(matches!(parse_proposal(reply), Proposal::Raw(_)));
    }

    #[test]
    fn array_missing_a_field_falls_back_to_raw() {
        let reply = r#"[{"original": "a", "change": "b"}]"#;
        assert!(matches!(parse_proposal(reply), Proposal::Raw(_)));
    }

    // ─── Individual tiers ───

    #[test]
    fn tier_fence_extracts_contents() {
        let block = extract_fenced_block("before\n```json\n[1, 2]\n```\nafter").unwrap();
        assert_eq!(block, "[1, 2]");
        assert!(extract_fenced_block("no fences here").is_none());
        assert!(extract_fenced_block("```json\nunclosed").is_none());
    }

    #[test]
    fn tier_bracket_scan_balances_nesting() {
        let found = extract_balanced_array("x [1, [2, 3], 4] y").unwrap();
        assert_eq!(found, "[1, [2, 3], 4]");
        assert!(extract_balanced_array("no arrays").is_none());
        assert!(extract_balanced_array("unclosed [1, 2").is_none());
    }

    #[test]
    fn tier_regex_requires_object_array() {
        let found = extract_array_by_regex(r#"[tag] then [{"a": 1}] end"#).unwrap();
        assert_eq!(found, r#"[{"a": 1}]"#);
        assert!(extract_array_by_regex("[1, 2, 3]").is_none());
    }
}
