use async_trait::async_trait;
use plexus_core::handler::SyntaxTree;
use plexus_core::{
    EditorKind, HandlerContext, HandlerResult, LanguageHandler, Marker, Method, Part, Pos, Quickfix, Range, Severity,
};

pub(crate) const ID: &str = "whitespace";
pub(crate) const FEATURE: &str = "trailingWhitespace";

/// Flags and strips spaces or tabs at the end of a line.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TrailingWhitespace;

/// Column span of the trailing run, in chars.
fn trailing_span(line: &str) -> Option<(u32, u32)> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let trimmed = line.trim_end_matches([' ', '\t']);
    if trimmed.len() == line.len() {
        return None;
    }
    Some((trimmed.chars().count() as u32, line.chars().count() as u32))
}

fn strip_line(line: &str) -> String {
    match line.strip_suffix('\r') {
        Some(body) => format!("{}\r", body.trim_end_matches([' ', '\t'])),
        None => line.trim_end_matches([' ', '\t']).to_string(),
    }
}

#[async_trait]
impl LanguageHandler for TrailingWhitespace {
    fn name(&self) -> &str {
        ID
    }

    fn supports(&self, method: Method) -> bool {
        matches!(method, Method::Analyze | Method::CodeFormat)
    }

    fn handles_language(&self, _language: &str) -> bool {
        true
    }

    fn handles_editor(&self) -> EditorKind {
        EditorKind::Both
    }

    async fn analyze(
        &self,
        ctx: &HandlerContext,
        part: &Part,
        _tree: Option<&SyntaxTree>,
    ) -> HandlerResult<Vec<Marker>> {
        if !ctx.is_feature_enabled(FEATURE) {
            return Ok(Vec::new());
        }
        let value = part.value();
        let markers = value
            .split('\n')
            .enumerate()
            .filter_map(|(row, line)| {
                let (start, end) = trailing_span(line)?;
                let span = Range::new(Pos::new(row as u32, start), Pos::new(row as u32, end));
                Some(
                    Marker::new(span, Severity::Warning, "trailing whitespace").with_resolution(Quickfix {
                        label: "Remove trailing whitespace".to_string(),
                        pos: span,
                        replacement: String::new(),
                        preview: None,
                    }),
                )
            })
            .collect();
        Ok(markers)
    }

    async fn code_format(&self, _ctx: &HandlerContext, part: &Part) -> HandlerResult<Option<String>> {
        let value = part.value();
        let formatted: Vec<String> = value.split('\n').map(strip_line).collect();
        Ok(Some(formatted.join("\n")))
    }
}
