//! Markup-to-plain-text normalization.
//!
//! This is an ordered cascade of independent rewrite rules, not a parser. Each rule is
//! a pure function so it can be tested on its own; [`normalize`] applies them in a
//! fixed order and the order is load-bearing (links must be unwrapped before template
//! pipes are inspected, refs before the generic tag stripper, and so on).
//!
//! Known limitation: a parameterized template nested inside another parameterized
//! template is only reduced one level per pass (`{{A|{{B|x}}}}` becomes `{{A|x}}`).

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static COMMENT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

static EXTERNAL_LINK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(https?://[^\s\]]+)\s+([^\]]+)\]").unwrap());

static CATEGORY_LINK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[\[?\s*:?\s*Category\s*:\s*([^|\]]+?)\s*(?:\|[^\]]*)?\]\]?").unwrap()
});

static PIPED_LINK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^|\]]+)\|([^\]]+)\]\]").unwrap());

static PLAIN_LINK_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[([^\]]+)\]\]").unwrap());

static PIPED_TEMPLATE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{[^{}|]+\|(?:[^{}|]*\|)*([^{}|]*)\}\}").unwrap());

static BARE_TEMPLATE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^{}|]+)\}\}").unwrap());

static REF_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<ref(?:\s[^>]*[^/>])?>(.*?)</ref\s*>").unwrap());

static URL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s\]<>|]+").unwrap());

static QUOTE_RUN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"'{2,5}").unwrap());

static PARAGRAPH_TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?p(?:\s[^<>]*)?/?>").unwrap());

static LINE_BREAK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br(?:\s[^<>]*)?/?>").unwrap());

static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[A-Za-z][^<>]*>").unwrap());

static TRAILING_SPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\r]+\n").unwrap());

static BLANK_RUN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Named entities decoded by step 8. `&amp;` goes last so `&amp;mdash;` survives as text.
const ENTITIES: &[(&str, &str)] = &[
    ("&mdash;", "\u{2014}"),
    ("&ndash;", "\u{2013}"),
    ("&nbsp;", " "),
    ("&hellip;", "\u{2026}"),
    ("&amp;", "&"),
];

/// How `[url label]` external links are rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStyle {
    /// `[url label]` becomes `label`.
    TextOnly,
    /// `[url label]` becomes `url label`.
    KeepUrl,
}

/// Runs the full rewrite cascade without any whitespace policy.
pub fn normalize(text: &str, style: LinkStyle) -> String {
    let s = strip_comments(text);
    let s = rewrite_external_links(&s, style);
    let s = rewrite_internal_links(&s);
    let s = rewrite_piped_templates(&s);
    let s = rewrite_bare_templates(&s);
    let s = resolve_refs(&s);
    let s = strip_quote_runs(&s);
    let s = decode_entities(&s);
    rewrite_html_tags(&s)
}

/// Cleans text where paragraph structure matters (profiles, histories, stories).
pub fn clean_paragraphs(text: &str) -> String {
    collapse_paragraphs(&normalize(text, LinkStyle::TextOnly))
}

/// Cleans short labeled values down to a single line.
pub fn clean_inline(text: &str) -> String {
    collapse_inline(&normalize(text, LinkStyle::TextOnly))
}

/// Paragraph cleaning that keeps external link targets next to their labels.
pub fn clean_value(text: &str) -> String {
    collapse_paragraphs(&normalize(text, LinkStyle::KeepUrl))
}

/// The first URL in `raw`, or its inline-cleaned text when it has none.
pub fn url_or_text(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }
    if let Some(m) = URL_REGEX.find(raw) {
        return Some(m.as_str().to_string());
    }
    non_empty(clean_inline(raw))
}

/// Splits a loosely delimited list and drops duplicates. The whole value is cleaned
/// first so pipes inside links and templates are not taken as separators.
pub fn split_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for piece in clean_inline(raw).split([',', ';', '/', '|']) {
        let cleaned = piece.trim().to_string();
        if cleaned.is_empty() {
            continue;
        }
        if out.iter().any(|existing| existing.eq_ignore_ascii_case(&cleaned)) {
            continue;
        }
        out.push(cleaned);
    }
    out
}

pub fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

pub fn strip_comments(s: &str) -> String {
    COMMENT_REGEX.replace_all(s, "").into_owned()
}

pub fn rewrite_external_links(s: &str, style: LinkStyle) -> String {
    let replacement = match style {
        LinkStyle::TextOnly => "$2",
        LinkStyle::KeepUrl => "$1 $2",
    };
    EXTERNAL_LINK_REGEX.replace_all(s, replacement).into_owned()
}

pub fn rewrite_internal_links(s: &str) -> String {
    let s = CATEGORY_LINK_REGEX.replace_all(s, "$1");
    let s = PIPED_LINK_REGEX.replace_all(&s, "$2");
    PLAIN_LINK_REGEX.replace_all(&s, "$1").into_owned()
}

pub fn rewrite_piped_templates(s: &str) -> String {
    PIPED_TEMPLATE_REGEX.replace_all(s, "$1").into_owned()
}

pub fn rewrite_bare_templates(s: &str) -> String {
    BARE_TEMPLATE_REGEX.replace_all(s, "$1").into_owned()
}

/// `<ref>` bodies collapse to their URL, or vanish when they have none.
pub fn resolve_refs(s: &str) -> String {
    REF_REGEX
        .replace_all(s, |caps: &Captures| {
            URL_REGEX
                .find(&caps[1])
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        })
        .into_owned()
}

pub fn strip_quote_runs(s: &str) -> String {
    QUOTE_RUN_REGEX.replace_all(s, "").into_owned()
}

pub fn decode_entities(s: &str) -> String {
    let mut out = s.to_string();
    for &(entity, literal) in ENTITIES {
        if out.contains(entity) {
            out = out.replace(entity, literal);
        }
    }
    out
}

pub fn rewrite_html_tags(s: &str) -> String {
    let s = PARAGRAPH_TAG_REGEX.replace_all(s, "\n\n");
    let s = LINE_BREAK_REGEX.replace_all(&s, "\n");
    TAG_REGEX.replace_all(&s, "").into_owned()
}

fn collapse_paragraphs(s: &str) -> String {
    let s = TRAILING_SPACE_REGEX.replace_all(s, "\n");
    BLANK_RUN_REGEX.replace_all(&s, "\n\n").trim().to_string()
}

fn collapse_inline(s: &str) -> String {
    WHITESPACE_REGEX.replace_all(s, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_removed_across_lines() {
        assert_eq!(strip_comments("a<!-- x\ny -->b"), "ab");
    }

    #[test]
    fn external_link_styles() {
        let text = "[https://example.org Official Site] end";
        assert_eq!(
            rewrite_external_links(text, LinkStyle::TextOnly),
            "Official Site end"
        );
        assert_eq!(
            rewrite_external_links(text, LinkStyle::KeepUrl),
            "https://example.org Official Site end"
        );
    }

    #[test]
    fn internal_links_unwrapped() {
        assert_eq!(
            rewrite_internal_links("[[Mondstadt]] and [[Liyue Harbor|Liyue]]"),
            "Mondstadt and Liyue"
        );
    }

    #[test]
    fn category_links_unwrapped_to_title() {
        assert_eq!(rewrite_internal_links("[[:Category:Swords]]"), "Swords");
        assert_eq!(rewrite_internal_links("[[Category:Swords|sort]]"), "Swords");
        assert_eq!(rewrite_internal_links("[:Category:Bows]"), "Bows");
    }

    #[test]
    fn piped_template_keeps_last_parameter() {
        assert_eq!(rewrite_piped_templates("{{Color|buzzword|Pyro DMG}}"), "Pyro DMG");
        assert_eq!(rewrite_piped_templates("{{sic|Akasha}}"), "Akasha");
    }

    #[test]
    fn piped_template_nesting_is_reduced_one_level() {
        assert_eq!(rewrite_piped_templates("{{A|{{B|x}}}}"), "{{A|x}}");
    }

    #[test]
    fn bare_template_becomes_name() {
        assert_eq!(rewrite_bare_templates("a {{Cryo}} b"), "a Cryo b");
    }

    #[test]
    fn refs_keep_url_or_vanish() {
        assert_eq!(
            resolve_refs("x<ref>see https://a.example/c</ref>y"),
            "xhttps://a.example/cy"
        );
        assert_eq!(resolve_refs("x<ref name=\"n\">no link</ref>y"), "xy");
    }

    #[test]
    fn self_closing_ref_does_not_swallow_text() {
        let text = "a<ref name=\"n\"/> kept <ref>gone</ref>";
        assert_eq!(resolve_refs(text), "a<ref name=\"n\"/> kept ");
    }

    #[test]
    fn quote_runs_stripped() {
        assert_eq!(strip_quote_runs("'''Amber''' is ''brave''"), "Amber is brave");
        assert_eq!(strip_quote_runs("it's"), "it's");
    }

    #[test]
    fn entities_decoded() {
        assert_eq!(decode_entities("a&mdash;b&amp;c"), "a\u{2014}b&c");
    }

    #[test]
    fn html_tags_rewritten() {
        assert_eq!(rewrite_html_tags("a<br/>b<p>c</p>"), "a\nb\n\nc\n\n");
        assert_eq!(rewrite_html_tags("<span style=\"x\">hi</span>"), "hi");
        assert_eq!(rewrite_html_tags("3 < 5 > 1"), "3 < 5 > 1");
    }

    #[test]
    fn paragraphs_collapse_blank_runs() {
        assert_eq!(
            clean_paragraphs("Line one.  \n\n\n\nLine two.\n"),
            "Line one.\n\nLine two."
        );
    }

    #[test]
    fn inline_collapses_all_whitespace() {
        assert_eq!(clean_inline("  a\n\n b\tc "), "a b c");
    }

    #[test]
    fn full_pipeline_inline() {
        let text = "'''[[Amber]]''' is an {{Pyro}} <!-- c --> outrider.<ref>note</ref>";
        assert_eq!(clean_inline(text), "Amber is an Pyro outrider.");
    }

    #[test]
    fn clean_value_keeps_urls() {
        assert_eq!(
            clean_value("[https://x.example Trailer] released"),
            "https://x.example Trailer released"
        );
    }

    #[test]
    fn inline_is_stable_after_one_pass() {
        let text = "''Lead''\n\n[[Mondstadt|City]] of {{Anemo}} &mdash; freedom";
        let once = clean_inline(text);
        assert_eq!(clean_inline(&once), once);
    }

    #[test]
    fn url_or_text_prefers_url() {
        assert_eq!(
            url_or_text("[https://x.example/a Post]").as_deref(),
            Some("https://x.example/a")
        );
        assert_eq!(url_or_text("''Knight''").as_deref(), Some("Knight"));
        assert_eq!(url_or_text("   "), None);
    }

    #[test]
    fn split_list_dedupes_case_insensitively() {
        assert_eq!(
            split_list("[[Mondstadt]], mondstadt; Liyue / "),
            vec!["Mondstadt", "Liyue"]
        );
    }

    #[test]
    fn split_list_keeps_piped_links_whole() {
        assert_eq!(
            split_list("[[Knights of Favonius|Knights]], [[Outrider]]"),
            vec!["Knights", "Outrider"]
        );
    }
}
