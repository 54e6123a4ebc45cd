use crate::clean::{clean_inline, clean_paragraphs, non_empty};
use crate::template::{extract_template, find_matching_close, find_template_start};
use once_cell::sync::Lazy;
use regex::Regex;

static SECTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(={1,6})\s*(.+?)\s*={1,6}[ \t]*\r?$").unwrap());

static BOLD_ONLY_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^'{2,}[^']+'{2,}$").unwrap());

static BOILERPLATE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(is a playable|can be obtained)\b").unwrap());

static DESCRIPTIVE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(is|was)\b").unwrap());

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Raw body of the section headed `heading`, up to the next heading of the same or a
/// higher level. Sub-sections stay inside the body.
pub fn extract_section_raw<'a>(text: &'a str, heading: &str) -> Option<&'a str> {
    let mut headings = SECTION_REGEX.captures_iter(text);

    let (level, body_start) = headings.by_ref().find_map(|c| {
        if c[2].eq_ignore_ascii_case(heading.trim()) {
            let whole = c.get(0)?;
            Some((c[1].len(), whole.end()))
        } else {
            None
        }
    })?;

    let body_end = headings
        .find(|c| c[1].len() <= level)
        .and_then(|c| c.get(0).map(|m| m.start()))
        .unwrap_or(text.len());

    Some(&text[body_start..body_end])
}

/// The named section cleaned with paragraph breaks preserved.
pub fn extract_section(text: &str, heading: &str) -> Option<String> {
    extract_section_raw(text, heading).and_then(|body| non_empty(clean_paragraphs(body)))
}

/// The descriptive lead sentence that follows `template` and precedes the first
/// heading. Bold-name-only lines and acquisition boilerplate are passed over; a line
/// that reads as a definition ("X is ...") is preferred.
pub fn extract_lead(text: &str, template: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let start = find_template_start(bytes, template)?;
    let close = find_matching_close(bytes, start)?;
    let remainder = &text[close + 2..];

    let lead_end = remainder.find("\n==").unwrap_or(remainder.len());
    let mut candidates = Vec::new();

    for raw in remainder[..lead_end].lines() {
        let raw = raw.trim();
        if raw.is_empty()
            || raw.starts_with("{{")
            || raw.starts_with("[[File:")
            || raw.starts_with("__")
            || BOLD_ONLY_REGEX.is_match(raw)
        {
            continue;
        }
        let cleaned = clean_inline(raw);
        if cleaned.is_empty() || BOILERPLATE_REGEX.is_match(&cleaned) {
            continue;
        }
        candidates.push(cleaned);
    }

    candidates
        .iter()
        .find(|line| DESCRIPTIVE_REGEX.is_match(line))
        .or_else(|| candidates.first())
        .cloned()
}

/// Text of a `{{Description|...}}` template, cleaned to one line.
pub fn description_template(text: &str) -> Option<String> {
    let span = extract_template(text, "Description")?;
    let (_, body) = span.split_once('|')?;
    non_empty(clean_inline(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "{{Character Infobox\n|name = Amber\n}}\n'''Amber'''\nAmber is the only remaining member of the [[Outrider]]s.\n\n== Profile ==\nA '''cheerful''' girl.\n\n\n\nShe loves gliding.\n=== Trivia ===\nNested detail.\n== Appearance ==\nRed ribbon.\n";

    #[test]
    fn section_runs_to_next_sibling_heading() {
        let raw = extract_section_raw(PAGE, "Profile").unwrap();
        assert!(raw.contains("She loves gliding."));
        assert!(raw.contains("Nested detail."));
        assert!(!raw.contains("Red ribbon."));
    }

    #[test]
    fn section_cleaned_with_paragraphs() {
        let section = extract_section(PAGE, "profile").unwrap();
        assert!(section.starts_with("A cheerful girl.\n\nShe loves gliding."));
    }

    #[test]
    fn last_section_runs_to_end() {
        assert_eq!(extract_section(PAGE, "Appearance").as_deref(), Some("Red ribbon."));
    }

    #[test]
    fn missing_section() {
        assert_eq!(extract_section(PAGE, "History"), None);
    }

    #[test]
    fn empty_section_is_none() {
        assert_eq!(extract_section("== A ==\n\n== B ==\nx", "A"), None);
    }

    #[test]
    fn lead_skips_bold_name_line() {
        assert_eq!(
            extract_lead(PAGE, "Character Infobox").as_deref(),
            Some("Amber is the only remaining member of the Outriders.")
        );
    }

    #[test]
    fn lead_skips_boilerplate() {
        let text = "{{Weapon Infobox}}\nIt can be obtained from Wishes.\nA blade that was forged in fire.\n";
        assert_eq!(
            extract_lead(text, "Weapon Infobox").as_deref(),
            Some("A blade that was forged in fire.")
        );
    }

    #[test]
    fn lead_missing_template() {
        assert_eq!(extract_lead("No infobox here.", "Weapon Infobox"), None);
    }

    #[test]
    fn description_template_body() {
        let text = "{{Description|A '''sharp''' [[Sword|blade]].}}";
        assert_eq!(description_template(text).as_deref(), Some("A sharp blade."));
    }

    #[test]
    fn contains_ignore_case_basic() {
        assert!(contains_ignore_case("The CharacterTabs marker", "charactertabs"));
        assert!(!contains_ignore_case("Nothing", "tabs"));
    }
}
