//! Typed message bus between the host editor and the worker.
//!
//! Both directions are adjacently tagged JSON: `{"command": "...", "data": {...}}` inbound,
//! `{"event": "...", "data": ...}` outbound. Anything that fails to deserialize is rejected at
//! the process boundary and never reaches the worker.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::completion::CompletionMatch;
use crate::document::{EditOp, Pos, Range};
use crate::handler::{Definition, InspectExpression, Outline, RenamePositions};
use crate::host::HostEnvelope;
use crate::marker::{Marker, Quickfix, Severity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchFile {
    pub path: String,
    pub language: String,
    pub text: String,
    #[serde(default)]
    pub cursor: Pos,
    #[serde(default)]
    pub workspace_dir: Option<String>,
    #[serde(default)]
    pub is_console: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub pos: Pos,
    /// The host's view of the cursor line when the request was issued.
    pub line: String,
    #[serde(default)]
    pub force_box: bool,
    #[serde(default)]
    pub is_update: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "data", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Inbound {
    DocumentOpen {
        path: String,
        language: String,
        text: String,
    },
    SwitchFile(SwitchFile),
    Change(EditOp),
    #[serde(rename = "cursormove")]
    CursorMove {
        pos: Pos,
        #[serde(default)]
        line: Option<String>,
    },
    Complete(CompleteRequest),
    Analyze,
    Outline,
    Hierarchy {
        pos: Pos,
        #[serde(default)]
        kind: String,
    },
    CodeFormat,
    JumpToDefinition {
        pos: Pos,
    },
    IsJumpToDefinitionAvailable {
        pos: Pos,
    },
    Quickfixes {
        pos: Pos,
    },
    Refactorings {
        pos: Pos,
    },
    RenamePositions {
        pos: Pos,
    },
    OnRenameBegin,
    CommitRename {
        old_id: String,
        new_name: String,
        #[serde(default)]
        is_generated: bool,
    },
    OnRenameCancel,
    Inspect {
        pos: Pos,
    },
    DocumentClose {
        path: String,
    },
    Register {
        handler_id: String,
        #[serde(default)]
        source: Option<String>,
    },
    Unregister {
        handler_id: String,
    },
    SetWarningLevel {
        level: Severity,
    },
    EnableFeature {
        name: String,
    },
    DisableFeature {
        name: String,
    },
    SetDebug {
        enabled: bool,
    },
    HostResponse {
        id: u64,
        #[serde(default)]
        err: Option<String>,
        #[serde(default)]
        result: Value,
    },
}

/// Tooltip/hint payload. `line: None` tells the host its cursor event was stale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub pos: Option<Range>,
    pub display_pos: Option<Pos>,
    pub message: Option<String>,
    pub line: Option<String>,
}

impl Hint {
    pub fn line_changed() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    pub pos: Pos,
    pub line: String,
    pub path: String,
    pub prefix: String,
    pub matches: Vec<CompletionMatch>,
    pub force_box: bool,
    pub is_update: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegexAdvert {
    pub language: String,
    pub regex: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Outbound {
    Markers(Vec<Marker>),
    Hint(Hint),
    HighlightMarkers(Vec<Marker>),
    Complete(CompletionResponse),
    Outline(Outline),
    Hierarchy(Value),
    Definition {
        results: Vec<Definition>,
        identifier: String,
    },
    IsJumpToDefinitionAvailableResult(bool),
    #[serde(rename = "quickfixes_result")]
    QuickfixesResult(Vec<Quickfix>),
    RefactoringsResult(Vec<String>),
    RenamePositionsResult(Option<RenamePositions>),
    CommitRenameResult {
        err: Option<String>,
    },
    Registered {
        path: String,
        err: Option<String>,
    },
    #[serde(rename = "code_format")]
    CodeFormat(String),
    InspectResult(Option<InspectExpression>),
    SetIdentifierRegex(RegexAdvert),
    SetCompletionRegex(RegexAdvert),
    SetTooltipRegex(RegexAdvert),
    HostRequest(HostEnvelope),
    ShowError {
        message: String,
        timeout: Option<u64>,
    },
}
