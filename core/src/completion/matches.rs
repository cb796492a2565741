use std::cmp::Ordering;

use regex::Regex;

use super::CompletionMatch;

/// Priority given to a match whose text is already sitting in front of the cursor.
pub const MAX_PRIORITY: i32 = 100;

/// Whether `candidate` should replace `kept` when both share an identity.
fn outranks(candidate: &CompletionMatch, kept: &CompletionMatch) -> bool {
    let rank = |m: &CompletionMatch| (m.is_contextual, !m.is_generic, m.priority);
    match rank(candidate).cmp(&rank(kept)) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.score.total_cmp(&kept.score) == Ordering::Greater,
    }
}

/// Collapse matches sharing an identity into one, keeping the best-ranked.
///
/// The output is ordered by identity. Running it again on its own output is a no-op.
pub fn dedup_matches(mut matches: Vec<CompletionMatch>) -> Vec<CompletionMatch> {
    matches.sort_by(|a, b| a.identity().cmp(b.identity()));
    let mut out: Vec<CompletionMatch> = Vec::with_capacity(matches.len());
    for m in matches {
        match out.last_mut() {
            Some(last) if last.identity() == m.identity() => {
                if outranks(&m, last) {
                    *last = m;
                }
            }
            _ => out.push(m),
        }
    }
    out
}

/// Raise to [`MAX_PRIORITY`] every match whose replacement is exactly the identifier-bounded
/// text before the cursor. `identifier` is the language's identifier character class.
pub fn boost_exact(matches: &mut [CompletionMatch], line_before_cursor: &str, identifier: &Regex) {
    for m in matches.iter_mut() {
        if m.replace_text.is_empty() || !line_before_cursor.ends_with(&m.replace_text) {
            continue;
        }
        let head = &line_before_cursor[..line_before_cursor.len() - m.replace_text.len()];
        let glued = head.chars().next_back().is_some_and(|ch| {
            let mut buf = [0u8; 4];
            identifier.is_match(ch.encode_utf8(&mut buf))
        });
        if !glued {
            m.priority = MAX_PRIORITY;
        }
    }
}

/// Priority, then score, descending; function-like first among equal names; then name.
pub fn sort_matches(matches: &mut [CompletionMatch]) {
    matches.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.score.total_cmp(&a.score))
            .then_with(|| {
                if a.name == b.name {
                    b.is_function.cmp(&a.is_function)
                } else {
                    Ordering::Equal
                }
            })
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Dedup, boost and sort, in that order.
pub fn finalize(matches: Vec<CompletionMatch>, line_before_cursor: &str, identifier: &Regex) -> Vec<CompletionMatch> {
    let mut matches = dedup_matches(matches);
    boost_exact(&mut matches, line_before_cursor, identifier);
    sort_matches(&mut matches);
    matches
}
