//! Brace-balanced template location.
//!
//! Templates nest freely inside field values (`{{Outer|a={{Inner|b}}}}`), so the
//! closing delimiter is found by counting `{{`/`}}` pairs rather than by taking the
//! first `}}`. Single stray braces never change the depth.

use memchr::memmem;

/// Returns the body of the first `{{name ...}}` invocation, outer braces stripped and
/// trimmed. `None` if the template is absent or never closes.
pub fn extract_template<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let start = find_template_start(text.as_bytes(), name)?;
    let close = find_matching_close(text.as_bytes(), start)?;
    Some(text[start + 2..close].trim())
}

/// Every top-level `{{name ...}}` invocation in document order.
pub fn extract_templates<'a>(text: &'a str, name: &str) -> Vec<&'a str> {
    let mut results = Vec::new();
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(pos) = find_template_start(&bytes[search_from..], name) {
        let abs_pos = search_from + pos;
        if let Some(close_pos) = find_matching_close(bytes, abs_pos) {
            results.push(text[abs_pos + 2..close_pos].trim());
            search_from = close_pos + 2;
        } else {
            search_from = abs_pos + 2;
        }
        if search_from >= bytes.len() {
            break;
        }
    }

    results
}

/// Byte offset of the `{{` opening the first invocation of `name`.
///
/// Matching is ASCII case-insensitive, tolerates whitespace after `{{`, and requires
/// `name` to end on a word boundary so `Quote` does not match `{{Quotes}}`.
pub fn find_template_start(bytes: &[u8], name: &str) -> Option<usize> {
    let needle = name.as_bytes();
    if needle.is_empty() {
        return None;
    }

    for pos in memmem::find_iter(bytes, b"{{") {
        let mut i = pos + 2;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let end = i + needle.len();
        if end > bytes.len() {
            continue;
        }
        if !bytes[i..end].eq_ignore_ascii_case(needle) {
            continue;
        }
        if ends_on_word_boundary(bytes, end, needle) {
            return Some(pos);
        }
    }
    None
}

fn ends_on_word_boundary(bytes: &[u8], end: usize, needle: &[u8]) -> bool {
    let last_is_word = needle.last().is_some_and(|b| is_word_byte(*b));
    if !last_is_word {
        return true;
    }
    match bytes.get(end) {
        None => true,
        Some(next) => !is_word_byte(*next),
    }
}

/// Non-ASCII bytes count as word characters: they belong to letters in practice.
fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

/// Position of the `}}` that balances the `{{` at `start`.
pub fn find_matching_close(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth: i32 = 0;
    let mut i = start;
    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'}' && bytes[i + 1] == b'}' {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
            i += 2;
        } else {
            i += 1;
        }
    }
    None
}

/// Splits on `|` outside nested `{{ }}` and `[[ ]]`.
pub fn split_at_depth_zero(content: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let bytes = content.as_bytes();
    let mut braces: i32 = 0;
    let mut links: i32 = 0;
    let mut last_split = 0;
    let mut i = 0;

    while i < bytes.len() {
        let pair = if i + 1 < bytes.len() {
            Some((bytes[i], bytes[i + 1]))
        } else {
            None
        };
        match pair {
            Some((b'{', b'{')) => {
                braces += 1;
                i += 2;
            }
            Some((b'}', b'}')) => {
                braces -= 1;
                i += 2;
            }
            Some((b'[', b'[')) => {
                links += 1;
                i += 2;
            }
            Some((b']', b']')) => {
                links -= 1;
                i += 2;
            }
            _ if bytes[i] == b'|' && braces <= 0 && links <= 0 => {
                segments.push(&content[last_split..i]);
                last_split = i + 1;
                i += 1;
            }
            _ => i += 1,
        }
    }
    segments.push(&content[last_split..]);
    segments
}
