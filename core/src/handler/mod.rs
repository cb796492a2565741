//! Capability interface for pluggable language handlers.
//!
//! A handler implements only the methods it supports and advertises them through
//! [`LanguageHandler::supports`]; every other method falls back to a default that reports
//! [`HandlerError::Unsupported`]. The registry never calls a method a handler does not
//! advertise.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::{Document, Pos, Range};
use crate::completion::CompletionMatch;
use crate::error::{HandlerError, HandlerResult};
use crate::host::HostServices;
use crate::marker::{Marker, Quickfix};
use crate::region::Part;

mod catalog;
mod registry;
mod types;

pub use catalog::{HandlerCatalog, HandlerFactory};
pub use registry::{HandlerRegistry, MatchTarget, RegisteredHandler};
pub use types::{
    CompletionContext, CursorContext, CursorMoveResult, Definition, InspectExpression, Node, Outline, OutlineItem,
    RenamePositions, SyntaxTree, Tooltip,
};

/// Every optional handler capability, used for matching and for log/error labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Init,
    OnDocumentOpen,
    OnDocumentClose,
    OnUpdate,
    Parse,
    FindNode,
    GetPos,
    Analyze,
    Complete,
    PredictNextCompletion,
    OnCursorMove,
    Tooltip,
    HighlightOccurrences,
    Outline,
    Hierarchy,
    CodeFormat,
    JumpToDefinition,
    GetQuickfixes,
    GetRefactorings,
    GetRenamePositions,
    OnRenameBegin,
    CommitRename,
    OnRenameCancel,
    GetInspectExpression,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Init => "init",
            Method::OnDocumentOpen => "onDocumentOpen",
            Method::OnDocumentClose => "onDocumentClose",
            Method::OnUpdate => "onUpdate",
            Method::Parse => "parse",
            Method::FindNode => "findNode",
            Method::GetPos => "getPos",
            Method::Analyze => "analyze",
            Method::Complete => "complete",
            Method::PredictNextCompletion => "predictNextCompletion",
            Method::OnCursorMove => "onCursorMove",
            Method::Tooltip => "tooltip",
            Method::HighlightOccurrences => "highlightOccurrences",
            Method::Outline => "outline",
            Method::Hierarchy => "hierarchy",
            Method::CodeFormat => "codeFormat",
            Method::JumpToDefinition => "jumpToDefinition",
            Method::GetQuickfixes => "getQuickfixes",
            Method::GetRefactorings => "getRefactorings",
            Method::GetRenamePositions => "getRenamePositions",
            Method::OnRenameBegin => "onRenameBegin",
            Method::CommitRename => "commitRename",
            Method::OnRenameCancel => "onRenameCancel",
            Method::GetInspectExpression => "getInspectExpression",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which editor surfaces a handler serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditorKind {
    #[default]
    EditorOnly,
    ConsoleOnly,
    Both,
    Any,
}

/// Per-call state the core hands to every handler invocation.
#[derive(Clone)]
pub struct HandlerContext {
    pub path: Arc<str>,
    pub language: Arc<str>,
    pub workspace_dir: Option<Arc<str>>,
    pub disabled_features: Arc<HashSet<String>>,
    pub debug: bool,
    pub host: HostServices,
}

impl HandlerContext {
    pub fn for_document(
        document: &Document,
        disabled_features: Arc<HashSet<String>>,
        debug: bool,
        host: HostServices,
    ) -> Self {
        Self {
            path: document.path().clone(),
            language: document.language().clone(),
            workspace_dir: document.workspace_dir().cloned(),
            disabled_features,
            debug,
            host,
        }
    }

    pub fn is_feature_enabled(&self, name: &str) -> bool {
        !self.disabled_features.contains(name)
    }
}

impl fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("path", &self.path)
            .field("language", &self.language)
            .field("workspace_dir", &self.workspace_dir)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait LanguageHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this handler implements `method`.
    fn supports(&self, method: Method) -> bool;

    fn handles_language(&self, language: &str) -> bool;

    fn handles_editor(&self) -> EditorKind {
        EditorKind::EditorOnly
    }

    /// Largest part, in chars, this handler will look at. `None` uses the worker default.
    fn max_file_size(&self) -> Option<usize> {
        None
    }

    fn identifier_regex(&self) -> Option<Regex> {
        None
    }

    fn completion_regex(&self) -> Option<Regex> {
        None
    }

    fn tooltip_regex(&self) -> Option<Regex> {
        None
    }

    async fn init(&self, _ctx: &HandlerContext) -> HandlerResult<()> {
        Err(HandlerError::Unsupported(Method::Init))
    }

    async fn on_document_open(&self, _ctx: &HandlerContext, _document: &Document) -> HandlerResult<()> {
        Err(HandlerError::Unsupported(Method::OnDocumentOpen))
    }

    async fn on_document_close(&self, _ctx: &HandlerContext, _path: &str) -> HandlerResult<()> {
        Err(HandlerError::Unsupported(Method::OnDocumentClose))
    }

    async fn on_update(&self, _ctx: &HandlerContext, _document: &Document) -> HandlerResult<()> {
        Err(HandlerError::Unsupported(Method::OnUpdate))
    }

    async fn parse(&self, _ctx: &HandlerContext, _part: &Part) -> HandlerResult<Option<SyntaxTree>> {
        Err(HandlerError::Unsupported(Method::Parse))
    }

    async fn find_node(&self, _ctx: &HandlerContext, _tree: &SyntaxTree, _pos: Pos) -> HandlerResult<Option<Node>> {
        Err(HandlerError::Unsupported(Method::FindNode))
    }

    async fn get_pos(&self, _ctx: &HandlerContext, _node: &Node) -> HandlerResult<Option<Range>> {
        Err(HandlerError::Unsupported(Method::GetPos))
    }

    async fn analyze(
        &self,
        _ctx: &HandlerContext,
        _part: &Part,
        _tree: Option<&SyntaxTree>,
    ) -> HandlerResult<Vec<Marker>> {
        Err(HandlerError::Unsupported(Method::Analyze))
    }

    async fn complete(
        &self,
        _ctx: &HandlerContext,
        _request: &CompletionContext<'_>,
    ) -> HandlerResult<Vec<CompletionMatch>> {
        Err(HandlerError::Unsupported(Method::Complete))
    }

    /// Text the user is expected to have typed next, given the matches just computed.
    async fn predict_next_completion(
        &self,
        _ctx: &HandlerContext,
        _request: &CompletionContext<'_>,
        _matches: &[CompletionMatch],
    ) -> HandlerResult<Option<String>> {
        Err(HandlerError::Unsupported(Method::PredictNextCompletion))
    }

    async fn on_cursor_move(
        &self,
        _ctx: &HandlerContext,
        _cursor: &CursorContext<'_>,
    ) -> HandlerResult<Option<CursorMoveResult>> {
        Err(HandlerError::Unsupported(Method::OnCursorMove))
    }

    async fn tooltip(&self, _ctx: &HandlerContext, _cursor: &CursorContext<'_>) -> HandlerResult<Option<Tooltip>> {
        Err(HandlerError::Unsupported(Method::Tooltip))
    }

    async fn highlight_occurrences(
        &self,
        _ctx: &HandlerContext,
        _cursor: &CursorContext<'_>,
    ) -> HandlerResult<Vec<Marker>> {
        Err(HandlerError::Unsupported(Method::HighlightOccurrences))
    }

    async fn outline(
        &self,
        _ctx: &HandlerContext,
        _part: &Part,
        _tree: Option<&SyntaxTree>,
    ) -> HandlerResult<Option<Outline>> {
        Err(HandlerError::Unsupported(Method::Outline))
    }

    async fn hierarchy(
        &self,
        _ctx: &HandlerContext,
        _cursor: &CursorContext<'_>,
        _kind: &str,
    ) -> HandlerResult<Option<serde_json::Value>> {
        Err(HandlerError::Unsupported(Method::Hierarchy))
    }

    async fn code_format(&self, _ctx: &HandlerContext, _part: &Part) -> HandlerResult<Option<String>> {
        Err(HandlerError::Unsupported(Method::CodeFormat))
    }

    async fn jump_to_definition(
        &self,
        _ctx: &HandlerContext,
        _cursor: &CursorContext<'_>,
    ) -> HandlerResult<Vec<Definition>> {
        Err(HandlerError::Unsupported(Method::JumpToDefinition))
    }

    async fn get_quickfixes(&self, _ctx: &HandlerContext, _cursor: &CursorContext<'_>) -> HandlerResult<Vec<Quickfix>> {
        Err(HandlerError::Unsupported(Method::GetQuickfixes))
    }

    async fn get_refactorings(&self, _ctx: &HandlerContext, _cursor: &CursorContext<'_>) -> HandlerResult<Vec<String>> {
        Err(HandlerError::Unsupported(Method::GetRefactorings))
    }

    async fn get_rename_positions(
        &self,
        _ctx: &HandlerContext,
        _cursor: &CursorContext<'_>,
    ) -> HandlerResult<Option<RenamePositions>> {
        Err(HandlerError::Unsupported(Method::GetRenamePositions))
    }

    async fn on_rename_begin(&self, _ctx: &HandlerContext) -> HandlerResult<()> {
        Err(HandlerError::Unsupported(Method::OnRenameBegin))
    }

    async fn commit_rename(
        &self,
        _ctx: &HandlerContext,
        _old_id: &str,
        _new_name: &str,
        _is_generated: bool,
    ) -> HandlerResult<()> {
        Err(HandlerError::Unsupported(Method::CommitRename))
    }

    async fn on_rename_cancel(&self, _ctx: &HandlerContext) -> HandlerResult<()> {
        Err(HandlerError::Unsupported(Method::OnRenameCancel))
    }

    async fn get_inspect_expression(
        &self,
        _ctx: &HandlerContext,
        _cursor: &CursorContext<'_>,
    ) -> HandlerResult<Option<InspectExpression>> {
        Err(HandlerError::Unsupported(Method::GetInspectExpression))
    }
}
