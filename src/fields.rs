//! Line-oriented `|key = value` parsing of a template body.

use crate::clean::{clean_inline, non_empty};
use crate::content::contains_ignore_case;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::Lines;
use tracing::trace;

static KEY_COMMENT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

/// Raw (uncleaned) template values keyed by lower-cased field name.
///
/// A key that appears twice keeps the later value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldRecord {
    fields: BTreeMap<String, String>,
}

impl FieldRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: String) {
        self.fields.insert(key.to_lowercase(), value);
    }

    /// The stored value, even when blank.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.fields.get(&key.to_lowercase()).map(String::as_str)
    }

    /// The trimmed value; blank values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Non-blank entries whose key starts with `prefix`, in key order.
    pub fn with_prefix(&self, prefix: &str) -> Vec<(&str, &str)> {
        let prefix = prefix.to_lowercase();
        self.fields
            .iter()
            .filter(|(k, v)| k.starts_with(&prefix) && !v.trim().is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    /// The value cleaned to a single line; blank counts as absent.
    pub fn inline(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| non_empty(clean_inline(v)))
    }

    /// Non-blank values of `prefix`, `prefix1`, `prefix2`, ... ordered by their number.
    pub fn numbered(&self, prefix: &str) -> Vec<&str> {
        let mut entries: Vec<(u32, &str)> = self
            .with_prefix(prefix)
            .into_iter()
            .filter_map(|(key, value)| {
                let suffix = &key[prefix.len()..];
                if suffix.is_empty() {
                    Some((0, value))
                } else {
                    suffix.parse().ok().map(|n| (n, value))
                }
            })
            .collect();
        entries.sort_by_key(|(n, _)| *n);
        entries.into_iter().map(|(_, value)| value.trim()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Parses the body returned by [`crate::template::extract_template`].
///
/// A leading `header` (the template's own name) is dropped. Lines starting with `|`
/// open a new field; other lines continue the current value with their newline
/// preserved. Fields whose key starts with `image` and the gallery block that follows
/// them are skipped entirely.
pub fn parse_fields(span: &str, header: &str) -> FieldRecord {
    let body = strip_header(span, header);
    let mut record = FieldRecord::new();
    let mut current: Option<(String, String)> = None;
    let mut lines = body.lines().peekable();

    while let Some(line) = lines.next() {
        if is_separator_line(line) {
            commit(&mut record, current.take());
            match split_field_line(line) {
                Some((key, _)) if key.starts_with("image") => {
                    skip_image_block(line, &mut lines);
                }
                Some((key, value)) => current = Some((key, value.to_string())),
                None => trace!(line, "Ignoring field line without '='"),
            }
        } else if let Some((_, value)) = current.as_mut() {
            value.push('\n');
            value.push_str(line.trim_end());
        }
    }
    commit(&mut record, current);

    record
}

/// Trims a key and removes inline HTML comments from it.
pub fn normalize_key(raw: &str) -> String {
    KEY_COMMENT_REGEX
        .replace_all(raw.trim(), "")
        .trim()
        .to_lowercase()
}

fn commit(record: &mut FieldRecord, field: Option<(String, String)>) {
    if let Some((key, value)) = field {
        record.insert(&key, value);
    }
}

fn is_separator_line(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

/// `|key = value` into its normalized key and trimmed value. A line whose `=` is
/// missing or comes after another `|` is not a field.
fn split_field_line(line: &str) -> Option<(String, &str)> {
    let rest = &line.trim_start()[1..];
    let eq = rest.find('=')?;
    if rest[..eq].contains('|') {
        return None;
    }
    let key = normalize_key(&rest[..eq]);
    if key.is_empty() {
        return None;
    }
    Some((key, rest[eq + 1..].trim()))
}

/// Consumes an image field's continuation. With a `<gallery>` everything up to the
/// closing tag goes; otherwise lines go until the next `|` line, which is left for
/// the caller.
fn skip_image_block(first: &str, lines: &mut Peekable<Lines<'_>>) {
    let in_gallery = contains_ignore_case(first, "<gallery");
    if in_gallery && contains_ignore_case(first, "</gallery>") {
        return;
    }

    while let Some(next) = lines.peek() {
        if in_gallery {
            let closed = contains_ignore_case(next, "</gallery>");
            lines.next();
            if closed {
                break;
            }
        } else if is_separator_line(next) {
            break;
        } else {
            lines.next();
        }
    }
}

fn strip_header<'a>(span: &'a str, header: &str) -> &'a str {
    let trimmed = span.trim_start();
    let Some(head) = trimmed.get(..header.len()) else {
        return span;
    };
    if header.is_empty() || !head.eq_ignore_ascii_case(header) {
        return span;
    }
    let rest = &trimmed[header.len()..];
    match rest.chars().next() {
        Some(c) if c.is_alphanumeric() || c == '_' => span,
        _ => rest,
    }
}
