// src/utils/text.rs

use std::sync::LazyLock;

use regex::Regex;

static BULLETS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[•●]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static INLINE_OPTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[A-Fa-f][\).]\s+").unwrap());
static KEY_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Fa-f][\).]:?\s*").unwrap());
static QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""([^"\\]+)""#).unwrap());

pub const MAX_PROMPT_CHARS: usize = 2000;
pub const MAX_OPTION_CHARS: usize = 100;

/// Cleans a question prompt extracted from a document.
///
/// Drops bullet glyphs and lines that repeat the options inline (`A) ...`),
/// then collapses whitespace.
pub fn sanitize_prompt(raw: &str) -> String {
    let without_bullets = BULLETS.replace_all(raw, "").replace('\r', "");
    let kept: Vec<&str> = without_bullets
        .split('\n')
        .filter(|line| !INLINE_OPTION_LINE.is_match(line))
        .collect();
    let joined = kept.join("\n");
    let collapsed = WHITESPACE.replace_all(&joined, " ");
    truncate_chars(collapsed.trim(), MAX_PROMPT_CHARS)
}

/// Strips a leading `A)` / `A.` / `A:` key prefix and bullets from an option label.
pub fn option_description(label: &str) -> String {
    let stripped = KEY_PREFIX.replace(label, "");
    let without_bullets = BULLETS.replace_all(&stripped, "");
    let collapsed = WHITESPACE.replace_all(&without_bullets, " ");
    truncate_chars(collapsed.trim(), MAX_OPTION_CHARS)
}

/// Wraps quoted phrases in underscores so they render italic: `"hi"` -> `_"hi"_`.
pub fn italicize_quotes(body: &str) -> String {
    QUOTED.replace_all(body, "_\"${1}\"_").into_owned()
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_drops_inline_options_and_bullets() {
        let raw = "• What do you do on a Friday night?\r\nA) Party\nb. Sleep\n  more   text ";
        assert_eq!(
            sanitize_prompt(raw),
            "What do you do on a Friday night? more text"
        );
    }

    #[test]
    fn test_prompt_is_capped() {
        let raw = "x".repeat(MAX_PROMPT_CHARS + 50);
        assert_eq!(sanitize_prompt(&raw).chars().count(), MAX_PROMPT_CHARS);
    }

    #[test]
    fn test_option_description_strips_prefix() {
        assert_eq!(option_description("A) Go   outside ●"), "Go outside");
        assert_eq!(option_description("c.: Stay in"), "Stay in");
        assert_eq!(option_description("Plain answer"), "Plain answer");
    }

    #[test]
    fn test_italicize_quotes() {
        assert_eq!(
            italicize_quotes(r#"He said "woof" twice"#),
            r#"He said _"woof"_ twice"#
        );
    }
}
