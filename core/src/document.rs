use std::sync::Arc;

use ropey::Rope;
use serde::{Deserialize, Serialize};

use crate::error::EditError;

/// Zero-based row/column position. Columns count chars, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Pos {
    pub row: u32,
    pub column: u32,
}

impl Pos {
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Range {
    pub start: Pos,
    pub end: Pos,
}

impl Range {
    pub const fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    pub const fn point(pos: Pos) -> Self {
        Self { start: pos, end: pos }
    }

    /// Inclusive on both ends so a cursor sitting right after a token still hits it.
    pub fn contains(&self, pos: Pos) -> bool {
        self.start <= pos && pos <= self.end
    }
}

/// One edit as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum EditOp {
    Insert { start: Pos, text: String },
    Remove { range: Range },
}

/// Which kind of editor surface the document lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Surface {
    #[default]
    Editor,
    Console,
}

/// The core's copy of the editor buffer.
///
/// Cloning is cheap: the rope shares its chunks, which lets pipelines snapshot the document
/// before suspending on a handler.
#[derive(Debug, Clone)]
pub struct Document {
    text: Rope,
    path: Arc<str>,
    language: Arc<str>,
    workspace_dir: Option<Arc<str>>,
    surface: Surface,
    generation: u64,
}

impl Document {
    pub fn new(path: &str, language: &str, text: &str) -> Self {
        Self {
            text: Rope::from_str(text),
            path: path.into(),
            language: language.into(),
            workspace_dir: None,
            surface: Surface::Editor,
            generation: 0,
        }
    }

    pub fn with_workspace_dir(mut self, dir: Option<&str>) -> Self {
        self.workspace_dir = dir.map(Into::into);
        self
    }

    pub fn with_surface(mut self, surface: Surface) -> Self {
        self.surface = surface;
        self
    }

    pub fn path(&self) -> &Arc<str> {
        &self.path
    }

    pub fn language(&self) -> &Arc<str> {
        &self.language
    }

    pub fn workspace_dir(&self) -> Option<&Arc<str>> {
        self.workspace_dir.as_ref()
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    /// Bumped on every edit; consumers compare it to detect stale results.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn rope(&self) -> &Rope {
        &self.text
    }

    pub fn value(&self) -> String {
        self.text.to_string()
    }

    pub fn len_chars(&self) -> usize {
        self.text.len_chars()
    }

    pub fn line_count(&self) -> usize {
        self.text.len_lines()
    }

    /// Text of `row` without its line terminator.
    pub fn line(&self, row: u32) -> Option<String> {
        let row = row as usize;
        if row >= self.text.len_lines() {
            return None;
        }
        let mut line = self.text.line(row).to_string();
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Some(line)
    }

    fn line_len(&self, row: usize) -> usize {
        let slice = self.text.line(row);
        let mut len = slice.len_chars();
        while len > 0 && matches!(slice.char(len - 1), '\n' | '\r') {
            len -= 1;
        }
        len
    }

    /// Char offset of `pos`, with the column clamped to the line.
    pub fn char_index(&self, pos: Pos) -> Result<usize, EditError> {
        let row = pos.row as usize;
        let rows = self.text.len_lines();
        if row >= rows {
            return Err(EditError::RowOutOfRange { row: pos.row, rows });
        }
        let column = (pos.column as usize).min(self.line_len(row));
        Ok(self.text.line_to_char(row) + column)
    }

    pub fn apply(&mut self, op: &EditOp) -> Result<(), EditError> {
        match op {
            EditOp::Insert { start, text } => {
                let at = self.char_index(*start)?;
                if !text.is_empty() {
                    self.text.insert(at, text);
                }
            }
            EditOp::Remove { range } => {
                let start = self.char_index(range.start)?;
                let end = self.char_index(range.end)?;
                let (s, e) = if start <= end { (start, end) } else { (end, start) };
                if s != e {
                    self.text.remove(s..e);
                }
            }
        }
        self.generation = self.generation.wrapping_add(1);
        Ok(())
    }

    /// Copy of this document with `row` swapped for `line`, as if the user had typed it.
    pub fn with_line_replaced(&self, row: u32, line: &str) -> Result<Document, EditError> {
        let mut next = self.clone();
        let start = self.char_index(Pos::new(row, 0))?;
        let end = start + self.line_len(row as usize);
        next.text.remove(start..end);
        next.text.insert(start, line);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_strips_terminators() {
        let doc = Document::new("a.js", "javascript", "one\r\ntwo\nthree");
        assert_eq!(doc.line(0).as_deref(), Some("one"));
        assert_eq!(doc.line(1).as_deref(), Some("two"));
        assert_eq!(doc.line(2).as_deref(), Some("three"));
        assert_eq!(doc.line(3), None);
    }

    #[test]
    fn test_insert_and_remove_bump_generation() {
        let mut doc = Document::new("a.js", "javascript", "foo\nbar");
        doc.apply(&EditOp::Insert {
            start: Pos::new(1, 3),
            text: "baz".into(),
        })
        .unwrap();
        assert_eq!(doc.value(), "foo\nbarbaz");
        doc.apply(&EditOp::Remove {
            range: Range::new(Pos::new(0, 1), Pos::new(1, 0)),
        })
        .unwrap();
        assert_eq!(doc.value(), "fbarbaz");
        assert_eq!(doc.generation(), 2);
    }

    #[test]
    fn test_column_is_clamped_to_line() {
        let mut doc = Document::new("a.js", "javascript", "ab\ncd");
        doc.apply(&EditOp::Insert {
            start: Pos::new(0, 99),
            text: "!".into(),
        })
        .unwrap();
        assert_eq!(doc.value(), "ab!\ncd");
    }

    #[test]
    fn test_edit_past_last_row_is_rejected() {
        let mut doc = Document::new("a.js", "javascript", "ab");
        let err = doc
            .apply(&EditOp::Insert {
                start: Pos::new(4, 0),
                text: "x".into(),
            })
            .unwrap_err();
        assert_eq!(err, EditError::RowOutOfRange { row: 4, rows: 1 });
        assert_eq!(doc.generation(), 0);
    }

    #[test]
    fn test_with_line_replaced_keeps_other_lines() {
        let doc = Document::new("a.js", "javascript", "let a = fo\nnext\n");
        let next = doc.with_line_replaced(0, "let a = foo.").unwrap();
        assert_eq!(next.value(), "let a = foo.\nnext\n");
        assert_eq!(doc.value(), "let a = fo\nnext\n");
    }
}
