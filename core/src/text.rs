//! Single-line identifier helpers shared by the completion and cursor pipelines.
//!
//! Columns are char indices into the line, matching [`Pos`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::Pos;

/// Letters, digits, `_` and `$`.
pub static DEFAULT_IDENTIFIER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9_$]").expect("default identifier regex should compile"));

fn is_identifier_char(ch: char, regex: &Regex) -> bool {
    let mut buf = [0u8; 4];
    regex.is_match(ch.encode_utf8(&mut buf))
}

/// Identifier text that ends right before `column`.
pub fn preceding_identifier(line: &str, column: usize, regex: Option<&Regex>) -> String {
    let regex = regex.unwrap_or(&DEFAULT_IDENTIFIER_REGEX);
    let chars: Vec<char> = line.chars().collect();
    let end = column.min(chars.len());
    let mut start = end;
    while start > 0 && is_identifier_char(chars[start - 1], regex) {
        start -= 1;
    }
    chars[start..end].iter().collect()
}

/// Identifier text that starts at `column`.
pub fn following_identifier(line: &str, column: usize, regex: Option<&Regex>) -> String {
    let regex = regex.unwrap_or(&DEFAULT_IDENTIFIER_REGEX);
    let chars: Vec<char> = line.chars().collect();
    let start = column.min(chars.len());
    let mut end = start;
    while end < chars.len() && is_identifier_char(chars[end], regex) {
        end += 1;
    }
    chars[start..end].iter().collect()
}

/// `line` with the identifier before `column` cut out.
fn strip_preceding_identifier(line: &str, column: usize, regex: Option<&Regex>) -> String {
    let prefix_len = preceding_identifier(line, column, regex).chars().count();
    let column = column.min(line.chars().count());
    line.chars()
        .enumerate()
        .filter(|(i, _)| *i < column - prefix_len || *i >= column)
        .map(|(_, ch)| ch)
        .collect()
}

/// Whether results computed for `old_line` at `old_pos` still hold for `new_line` at `new_pos`.
///
/// Only the identifier being typed before the cursor may differ between the two lines.
pub fn can_reuse_for_edited_line(
    old_line: &str,
    new_line: &str,
    old_pos: Pos,
    new_pos: Pos,
    regex: Option<&Regex>,
) -> bool {
    if old_pos.row != new_pos.row {
        return false;
    }
    if old_line == new_line {
        return true;
    }
    strip_preceding_identifier(old_line, old_pos.column as usize, regex)
        == strip_preceding_identifier(new_line, new_pos.column as usize, regex)
}

/// Index of the leftmost item in lexicographically sorted `items` that starts with `prefix`.
pub fn sorted_prefix_search<S: AsRef<str>>(items: &[S], prefix: &str) -> Option<usize> {
    let mut low = 0usize;
    let mut high = items.len();
    while low < high {
        let mid = low + (high - low) / 2;
        if items[mid].as_ref() < prefix {
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    // "starts with" is not monotonic over the probe above, so walk back to the first hit.
    while low > 0 && items[low - 1].as_ref().starts_with(prefix) {
        low -= 1;
    }
    items.get(low).filter(|item| item.as_ref().starts_with(prefix)).map(|_| low)
}
