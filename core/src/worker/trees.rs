use std::collections::HashMap;
use std::sync::Arc;

use crate::document::Document;
use crate::handler::SyntaxTree;

/// Per-part parse results for one document generation, plus the last good trees of the
/// previous generation for best-effort cursor work.
#[derive(Debug, Default)]
pub(crate) struct TreeCache {
    path: Option<Arc<str>>,
    generation: u64,
    fresh: HashMap<usize, Option<SyntaxTree>>,
    stale: HashMap<usize, SyntaxTree>,
}

impl TreeCache {
    fn is_for(&self, document: &Document) -> bool {
        self.path.as_ref() == Some(document.path()) && self.generation == document.generation()
    }

    /// Forget everything; used when the document is replaced.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Move fresh trees aside after an edit.
    pub(crate) fn retire(&mut self) {
        for (index, tree) in self.fresh.drain() {
            if let Some(tree) = tree {
                self.stale.insert(index, tree);
            }
        }
    }

    /// Parse result for `index` in exactly this generation. `Some(None)` means the part was
    /// parsed and no handler produced a tree.
    pub(crate) fn fresh(&self, document: &Document, index: usize) -> Option<Option<SyntaxTree>> {
        if !self.is_for(document) {
            return None;
        }
        self.fresh.get(&index).cloned()
    }

    /// Any tree for `index`, current or from the previous generation.
    pub(crate) fn best_effort(&self, document: &Document, index: usize) -> Option<SyntaxTree> {
        if self.path.as_ref() != Some(document.path()) {
            return None;
        }
        if self.generation == document.generation() {
            if let Some(Some(tree)) = self.fresh.get(&index) {
                return Some(tree.clone());
            }
        }
        self.stale.get(&index).cloned()
    }

    /// Record a parse of `document`. The caller guarantees `document` is the live generation.
    pub(crate) fn store(&mut self, document: &Document, index: usize, tree: Option<SyntaxTree>) {
        if self.path.as_ref() != Some(document.path()) {
            self.reset();
            self.path = Some(document.path().clone());
        } else if self.generation != document.generation() {
            self.retire();
        }
        self.generation = document.generation();
        self.fresh.insert(index, tree);
    }
}
