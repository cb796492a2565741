//! Completion results, their merge rules and the memoization that lets narrowing requests
//! skip the handler fan-out.

use serde::{Deserialize, Serialize};

mod cache;
mod matches;

pub use cache::{CacheKey, CompletionCache, Lookup};
pub use matches::{MAX_PRIORITY, boost_exact, dedup_matches, finalize, sort_matches};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionMatch {
    pub name: String,
    pub replace_text: String,
    /// Overrides the language's identifier regex when the host filters this match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier_regex: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub is_generic: bool,
    #[serde(default)]
    pub is_contextual: bool,
    #[serde(default)]
    pub is_function: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl CompletionMatch {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            replace_text: name.clone(),
            name,
            ..Default::default()
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    /// Key two matches must share to be considered the same candidate.
    pub fn identity(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}
