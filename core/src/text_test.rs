use regex::Regex;

use crate::document::Pos;
use crate::text::*;

#[test]
fn test_preceding_identifier_after_dot() {
    assert_eq!(preceding_identifier("foo.bar", 7, None), "bar");
    assert_eq!(preceding_identifier("foo.bar", 5, None), "b");
    assert_eq!(preceding_identifier("foo.bar", 4, None), "");
    assert_eq!(preceding_identifier("foo.bar", 0, None), "");
}

#[test]
fn test_following_identifier_after_dot() {
    assert_eq!(following_identifier("foo.bar", 4, None), "bar");
    assert_eq!(following_identifier("foo.bar", 3, None), "");
    assert_eq!(following_identifier("foo.bar", 7, None), "");
    assert_eq!(following_identifier("foo.bar", 1, None), "oo");
}

#[test]
fn test_identifier_default_class_includes_dollar() {
    assert_eq!(preceding_identifier("x = $el_2", 9, None), "$el_2");
}

#[test]
fn test_identifier_with_custom_regex() {
    let css = Regex::new(r"[A-Za-z0-9_\-]").unwrap();
    assert_eq!(preceding_identifier("color: back-gr", 14, Some(&css)), "back-gr");
    assert_eq!(preceding_identifier("color: back-gr", 14, None), "gr");
}

#[test]
fn test_identifier_handles_non_ascii_columns() {
    assert_eq!(preceding_identifier("é.naïve", 4, None), "na");
    assert_eq!(preceding_identifier("é.naïve", 7, None), "ve");
    assert_eq!(preceding_identifier("ab", 10, None), "ab");
}

#[test]
fn test_reuse_for_identifier_extension() {
    assert!(can_reuse_for_edited_line(
        "foo.",
        "foo.b",
        Pos::new(0, 4),
        Pos::new(0, 5),
        None
    ));
}

#[test]
fn test_reuse_rejects_unrelated_edit() {
    let pos = Pos::new(0, 7);
    assert!(!can_reuse_for_edited_line("foo.bar", "baz.bar", pos, pos, None));
}

#[test]
fn test_reuse_rejects_different_rows() {
    assert!(!can_reuse_for_edited_line(
        "foo",
        "foo",
        Pos::new(0, 3),
        Pos::new(1, 3),
        None
    ));
}

#[test]
fn test_reuse_identical_lines() {
    assert!(can_reuse_for_edited_line(
        "let x = 1",
        "let x = 1",
        Pos::new(2, 0),
        Pos::new(2, 9),
        None
    ));
}

#[test]
fn test_reuse_after_backspace_inside_identifier() {
    assert!(can_reuse_for_edited_line(
        "call(abc)",
        "call(ab)",
        Pos::new(0, 8),
        Pos::new(0, 7),
        None
    ));
}

#[test]
fn test_sorted_prefix_search_finds_leftmost() {
    let items = ["alpha", "beta", "bet", "betamax", "gamma"];
    let mut sorted = items.to_vec();
    sorted.sort();
    // ["alpha", "bet", "beta", "betamax", "gamma"]
    assert_eq!(sorted_prefix_search(&sorted, "bet"), Some(1));
    assert_eq!(sorted_prefix_search(&sorted, "beta"), Some(2));
    assert_eq!(sorted_prefix_search(&sorted, "b"), Some(1));
    assert_eq!(sorted_prefix_search(&sorted, "a"), Some(0));
    assert_eq!(sorted_prefix_search(&sorted, ""), Some(0));
}

#[test]
fn test_sorted_prefix_search_misses() {
    let sorted = vec!["alpha".to_string(), "beta".to_string()];
    assert_eq!(sorted_prefix_search(&sorted, "c"), None);
    assert_eq!(sorted_prefix_search(&sorted, "alq"), None);
    let empty: Vec<String> = Vec::new();
    assert_eq!(sorted_prefix_search(&empty, "a"), None);
}

#[test]
fn test_sorted_prefix_search_with_duplicates() {
    let sorted = ["foo", "foo", "foo", "foobar", "fop"];
    assert_eq!(sorted_prefix_search(&sorted, "foo"), Some(0));
    assert_eq!(sorted_prefix_search(&sorted, "foob"), Some(3));
    assert_eq!(sorted_prefix_search(&sorted, "fop"), Some(4));
}
