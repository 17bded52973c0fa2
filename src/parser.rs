//! Answer sanitization.
//!
//! Models often wrap JSON in a fenced code block even when told not to.
//! [`strip_code_fence`] removes at most one leading fence (with an optional
//! `json` language tag) and one trailing fence, leaving the interior intact.
//! The result is not parsed; callers decide what to do with it.

const FENCE: &str = "```";
const LANG_TAG: &str = "json";

/// Strip a surrounding markdown code fence from a model answer.
///
/// - `` ```json\n{"a":1}\n``` `` -> `{"a":1}`
/// - `` ```\n{"a":1}\n``` `` -> `{"a":1}`
/// - `{"a":1}` -> `{"a":1}`
///
/// Leading and trailing fences are matched independently, so an answer cut
/// off before its closing fence still loses the opening one.
pub fn strip_code_fence(answer: &str) -> String {
    let mut text = answer.trim();

    if let Some(rest) = text.strip_prefix(FENCE) {
        text = strip_lang_tag(rest);
    }

    if let Some(rest) = text.trim_end().strip_suffix(FENCE) {
        text = rest;
    }

    text.trim().to_string()
}

/// Drop a `json` tag directly after the opening fence. The tag only counts
/// when followed by whitespace, a closing fence or end of input, so
/// `` ```jsonl `` keeps its text.
fn strip_lang_tag(after_fence: &str) -> &str {
    let Some(head) = after_fence.get(..LANG_TAG.len()) else {
        return after_fence;
    };
    if !head.eq_ignore_ascii_case(LANG_TAG) {
        return after_fence;
    }
    let rest = &after_fence[LANG_TAG.len()..];
    match rest.chars().next() {
        None => rest,
        Some(c) if c.is_whitespace() || rest.starts_with(FENCE) => rest,
        Some(_) => after_fence,
    }
}
