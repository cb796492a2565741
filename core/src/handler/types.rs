use std::any::Any;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::{Pos, Range};
use crate::marker::{Marker, SyntaxError};
use crate::region::Part;

/// Opaque, handler-owned tree node. Handlers downcast to their own types.
pub type Node = Arc<dyn Any + Send + Sync>;

/// Result of a successful `parse`: the handler's tree plus the error it recovered from, if any.
#[derive(Clone)]
pub struct SyntaxTree {
    pub root: Node,
    pub error: Option<SyntaxError>,
}

impl SyntaxTree {
    pub fn new<T: Any + Send + Sync>(root: T) -> Self {
        Self {
            root: Arc::new(root),
            error: None,
        }
    }

    pub fn with_error(mut self, error: SyntaxError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.root.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntaxTree").field("error", &self.error).finish_non_exhaustive()
    }
}

/// What a handler sees for a cursor-bound request. `pos` is part-local.
#[derive(Clone, Copy)]
pub struct CursorContext<'a> {
    pub part: &'a Part,
    pub tree: Option<&'a SyntaxTree>,
    pub node: Option<&'a Node>,
    pub pos: Pos,
}

/// What a handler sees for `complete`/`predictNextCompletion`. `pos` is part-local.
#[derive(Clone, Copy)]
pub struct CompletionContext<'a> {
    pub part: &'a Part,
    pub tree: Option<&'a SyntaxTree>,
    pub node: Option<&'a Node>,
    pub pos: Pos,
    pub line: &'a str,
    pub prefix: &'a str,
    pub identifier_regex: &'a Regex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tooltip {
    pub message: String,
    #[serde(default)]
    pub pos: Option<Range>,
    #[serde(default)]
    pub display_pos: Option<Pos>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorMoveResult {
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub display_pos: Option<Pos>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub pos: Range,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<OutlineItem>,
}

impl OutlineItem {
    pub(crate) fn into_global(mut self, part: &Part) -> Self {
        self.pos = part.range_to_global(self.pos);
        self.items = self.items.into_iter().map(|item| item.into_global(part)).collect();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outline {
    pub items: Vec<OutlineItem>,
}

/// A definition site. Positions in other files are left untouched by the re-offset step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub pos: Range,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenamePositions {
    pub pos: Range,
    pub others: Vec<Range>,
    #[serde(default)]
    pub is_generated: bool,
}

impl RenamePositions {
    pub(crate) fn into_global(self, part: &Part) -> Self {
        Self {
            pos: part.range_to_global(self.pos),
            others: self.others.into_iter().map(|r| part.range_to_global(r)).collect(),
            is_generated: self.is_generated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectExpression {
    pub value: String,
    pub pos: Range,
}
