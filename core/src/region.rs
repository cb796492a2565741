use std::sync::Arc;

use ropey::Rope;

use crate::document::{Document, Pos, Range};
use crate::error::EditError;

/// A contiguous, single-language slice of a document.
///
/// Handlers only ever see part-local coordinates; the pipelines translate back to the
/// outer document with [`Part::to_global`].
#[derive(Debug, Clone)]
pub struct Part {
    pub index: usize,
    pub language: Arc<str>,
    pub region: Range,
    text: Rope,
}

impl Part {
    pub fn new(index: usize, language: &str, region: Range, text: Rope) -> Self {
        Self {
            index,
            language: language.into(),
            region,
            text,
        }
    }

    /// Cut `region` out of `document`.
    pub fn from_document(index: usize, language: &str, document: &Document, region: Range) -> Result<Self, EditError> {
        let start = document.char_index(region.start)?;
        let end = document.char_index(region.end)?.max(start);
        let text = Rope::from(document.rope().slice(start..end));
        Ok(Self::new(index, language, region, text))
    }

    pub fn text(&self) -> &Rope {
        &self.text
    }

    pub fn value(&self) -> String {
        self.text.to_string()
    }

    pub fn len_chars(&self) -> usize {
        self.text.len_chars()
    }

    pub fn line(&self, row: u32) -> Option<String> {
        let row = row as usize;
        if row >= self.text.len_lines() {
            return None;
        }
        let line = self.text.line(row).to_string();
        Some(line.trim_end_matches(['\n', '\r']).to_string())
    }

    pub fn to_local(&self, pos: Pos) -> Pos {
        pos_to_region(&self.region, pos)
    }

    pub fn to_global(&self, pos: Pos) -> Pos {
        pos_from_region(&self.region, pos)
    }

    pub fn range_to_global(&self, range: Range) -> Range {
        Range::new(self.to_global(range.start), self.to_global(range.end))
    }
}

/// Map a document position into `region`-local coordinates.
pub fn pos_to_region(region: &Range, pos: Pos) -> Pos {
    let column = if pos.row == region.start.row {
        pos.column.saturating_sub(region.start.column)
    } else {
        pos.column
    };
    Pos::new(pos.row.saturating_sub(region.start.row), column)
}

/// Map a `region`-local position back to document coordinates.
///
/// Only the region's first row is shifted horizontally.
pub fn pos_from_region(region: &Range, local: Pos) -> Pos {
    let column = if local.row == 0 {
        local.column + region.start.column
    } else {
        local.column
    };
    Pos::new(local.row + region.start.row, column)
}

/// Splits mixed-language documents into parts. Must be deterministic per snapshot.
pub trait RegionSplitter: Send + Sync {
    fn get_parts(&self, document: &Document, language: &str) -> Vec<Part>;

    fn get_context_part(&self, document: &Document, pos: Pos, language: &str) -> Option<Part> {
        self.get_parts(document, language)
            .into_iter()
            .find(|part| part.region.contains(pos))
    }

    fn pos_to_region(&self, region: &Range, pos: Pos) -> Pos {
        pos_to_region(region, pos)
    }

    fn pos_from_region(&self, region: &Range, local: Pos) -> Pos {
        pos_from_region(region, local)
    }
}

/// Treats the whole document as one part in the document's language.
#[derive(Debug, Default, Clone, Copy)]
pub struct WholeDocumentSplitter;

impl RegionSplitter for WholeDocumentSplitter {
    fn get_parts(&self, document: &Document, language: &str) -> Vec<Part> {
        let last_row = document.line_count().saturating_sub(1) as u32;
        let last_col = document.line(last_row).map(|l| l.chars().count()).unwrap_or(0) as u32;
        let region = Range::new(Pos::new(0, 0), Pos::new(last_row, last_col));
        vec![Part::new(0, language, region, document.rope().clone())]
    }
}
