use serde::{Deserialize, Serialize};

use crate::document::{Pos, Range};
use crate::region::Part;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown severity `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerKind {
    #[default]
    Diagnostic,
    OccurrenceMain,
    OccurrenceOther,
}

/// A text replacement offered as a fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quickfix {
    pub label: String,
    pub pos: Range,
    pub replacement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub pos: Range,
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub kind: MarkerKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolutions: Vec<Quickfix>,
}

impl Marker {
    pub fn new(pos: Range, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            pos,
            severity,
            message: message.into(),
            kind: MarkerKind::Diagnostic,
            resolutions: Vec::new(),
        }
    }

    pub fn occurrence(pos: Range, main: bool) -> Self {
        Self {
            pos,
            severity: Severity::Info,
            message: String::new(),
            kind: if main {
                MarkerKind::OccurrenceMain
            } else {
                MarkerKind::OccurrenceOther
            },
            resolutions: Vec::new(),
        }
    }

    pub fn with_resolution(mut self, fix: Quickfix) -> Self {
        self.resolutions.push(fix);
        self
    }

    /// Rewrite a part-local marker (and its fixes) into document coordinates.
    pub fn into_global(mut self, part: &Part) -> Self {
        self.pos = part.range_to_global(self.pos);
        for fix in &mut self.resolutions {
            fix.pos = part.range_to_global(fix.pos);
        }
        self
    }

    pub fn covers(&self, pos: Pos) -> bool {
        self.pos.contains(pos)
    }
}

/// Syntax error recorded by a parser, in part-local rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxError {
    pub row: u32,
    pub message: String,
}

/// Rows after a syntax error that are considered noise for non-error markers.
const ERROR_SHADOW_ROWS: u32 = 2;

/// Drop non-error markers that sit on or just after `error`.
///
/// Recovered trees tend to produce spurious warnings right after the real error.
pub fn filter_around_error(markers: &mut Vec<Marker>, error: &SyntaxError) {
    markers.retain(|m| {
        m.severity == Severity::Error
            || m.pos.start.row < error.row
            || m.pos.start.row > error.row + ERROR_SHADOW_ROWS
    });
}

/// Keep markers at or above `level`.
pub fn filter_by_level(markers: Vec<Marker>, level: Severity) -> Vec<Marker> {
    markers.into_iter().filter(|m| m.severity >= level).collect()
}
