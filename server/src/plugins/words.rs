//! Completes identifiers already present in the part being edited.

use std::collections::BTreeMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use plexus_core::completion::CompletionMatch;
use plexus_core::handler::CompletionContext;
use plexus_core::text::sorted_prefix_search;
use plexus_core::{EditorKind, HandlerContext, HandlerResult, LanguageHandler, Method};
use regex::Regex;
use serde::Deserialize;

pub(crate) const ID: &str = "words";
pub(crate) const FEATURE: &str = "wordCompletion";

static WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*").expect("word regex should compile"));

/// Options accepted as the `source` of a `register` request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WordOptions {
    min_length: usize,
    /// Empty means every language.
    languages: Vec<String>,
}

impl Default for WordOptions {
    fn default() -> Self {
        Self {
            min_length: 3,
            languages: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct WordCompleter {
    options: WordOptions,
}

impl WordCompleter {
    pub(crate) fn from_source(source: Option<&str>) -> Result<Self, String> {
        let options = match source.map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                serde_json::from_str(raw).map_err(|e| format!("invalid {ID} options: {e}"))?
            }
            _ => WordOptions::default(),
        };
        Ok(Self { options })
    }

    /// Distinct words of `text`, sorted, with how often each occurs.
    fn index<'t>(&self, text: &'t str) -> BTreeMap<&'t str, usize> {
        let mut counts = BTreeMap::new();
        for word in WORD.find_iter(text).map(|m| m.as_str()) {
            if word.chars().count() >= self.options.min_length {
                *counts.entry(word).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[async_trait]
impl LanguageHandler for WordCompleter {
    fn name(&self) -> &str {
        ID
    }

    fn supports(&self, method: Method) -> bool {
        method == Method::Complete
    }

    fn handles_language(&self, language: &str) -> bool {
        self.options.languages.is_empty() || self.options.languages.iter().any(|l| l == language)
    }

    fn handles_editor(&self) -> EditorKind {
        EditorKind::Both
    }

    async fn complete(&self, ctx: &HandlerContext, request: &CompletionContext<'_>) -> HandlerResult<Vec<CompletionMatch>> {
        if !ctx.is_feature_enabled(FEATURE) || request.prefix.is_empty() {
            return Ok(Vec::new());
        }
        let text = request.part.value();
        let counts = self.index(&text);
        let words: Vec<&str> = counts.keys().copied().collect();
        let Some(start) = sorted_prefix_search(&words, request.prefix) else {
            return Ok(Vec::new());
        };
        let matches = words[start..]
            .iter()
            .take_while(|word| word.starts_with(request.prefix))
            // The word being typed counts itself once.
            .filter(|word| **word != request.prefix || counts[**word] > 1)
            .map(|word| {
                let mut m = CompletionMatch::new(*word).with_score(counts[*word] as f64);
                m.is_generic = true;
                m
            })
            .collect();
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use plexus_core::Pos;
    use plexus_core::text::DEFAULT_IDENTIFIER_REGEX;

    use super::*;
    use crate::plugins::testing::context;

    async fn complete_with(completer: &WordCompleter, text: &str, prefix: &str, disabled: &[&str]) -> Vec<String> {
        let (ctx, part) = context(text, disabled);
        let request = CompletionContext {
            part: &part,
            tree: None,
            node: None,
            pos: Pos::new(0, 0),
            line: "",
            prefix,
            identifier_regex: &DEFAULT_IDENTIFIER_REGEX,
        };
        completer
            .complete(&ctx, &request)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect()
    }

    #[tokio::test]
    async fn test_completes_words_with_prefix() {
        let completer = WordCompleter::default();
        let got = complete_with(&completer, "let format = 1;\nlet foo = fo", "fo", &[]).await;
        assert_eq!(got, vec!["foo", "format"]);
    }

    #[tokio::test]
    async fn test_word_being_typed_is_not_offered() {
        let completer = WordCompleter::default();
        let got = complete_with(&completer, "let value = valu", "valu", &[]).await;
        assert_eq!(got, vec!["value"]);
        let got = complete_with(&completer, "call(); call", "call", &[]).await;
        assert_eq!(got, vec!["call"]);
    }

    #[tokio::test]
    async fn test_disabled_feature_yields_nothing() {
        let completer = WordCompleter::default();
        let got = complete_with(&completer, "format foo fo", "fo", &[FEATURE]).await;
        assert!(got.is_empty());
    }

    #[test]
    fn test_options_from_source() {
        let completer = WordCompleter::from_source(Some(r#"{ "minLength": 5, "languages": ["python"] }"#)).unwrap();
        assert_eq!(completer.options.min_length, 5);
        assert!(completer.handles_language("python"));
        assert!(!completer.handles_language("javascript"));

        assert!(WordCompleter::from_source(Some("   ")).is_ok());
        let err = WordCompleter::from_source(Some("[1, 2")).unwrap_err();
        assert!(err.starts_with("invalid words options"));
    }
}
