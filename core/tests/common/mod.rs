#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use plexus_core::completion::CompletionMatch;
use plexus_core::handler::{CompletionContext, CursorContext, Definition, Outline, OutlineItem, SyntaxTree, Tooltip};
use plexus_core::marker::SyntaxError;
use plexus_core::message::SwitchFile;
use plexus_core::{
    Document, HandlerCatalog, HandlerContext, HandlerError, HandlerResult, Inbound, LanguageHandler, Marker, Method,
    Outbound, Part, Pos, Quickfix, Range, RegionSplitter, WholeDocumentSplitter, Worker, WorkerConfig,
};
use regex::Regex;
use tokio::sync::mpsc::UnboundedReceiver;

/// Shared, ordered record of `"<handler>:<method>"` calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Calls of `method` across every handler sharing this log.
    pub fn count(&self, method: Method) -> usize {
        let suffix = format!(":{method}");
        self.0.lock().unwrap().iter().filter(|e| e.ends_with(&suffix)).count()
    }
}

/// A handler whose every answer is fixed up front.
#[derive(Clone)]
pub struct ScriptedHandler {
    name: String,
    language: String,
    methods: HashSet<Method>,
    log: CallLog,
    markers: Vec<Marker>,
    echo_path: bool,
    analyze_delay: Option<Duration>,
    stall_analyze: bool,
    parse_error: Option<SyntaxError>,
    completions: Vec<CompletionMatch>,
    prediction: Option<String>,
    tooltip: Option<String>,
    cursor_hint: Option<String>,
    outline: Vec<OutlineItem>,
    formatted: Option<String>,
    definitions: Vec<Definition>,
    quickfixes: Vec<Quickfix>,
    rename_error: Option<String>,
    identifier: Option<Regex>,
}

impl ScriptedHandler {
    /// Handles `language`, parses every part and analyzes to nothing.
    pub fn new(name: &str, language: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            language: language.to_string(),
            methods: HashSet::from([Method::Parse, Method::Analyze]),
            log: log.clone(),
            markers: Vec::new(),
            echo_path: false,
            analyze_delay: None,
            stall_analyze: false,
            parse_error: None,
            completions: Vec::new(),
            prediction: None,
            tooltip: None,
            cursor_hint: None,
            outline: Vec::new(),
            formatted: None,
            definitions: Vec::new(),
            quickfixes: Vec::new(),
            rename_error: None,
            identifier: None,
        }
    }

    fn support(mut self, method: Method) -> Self {
        self.methods.insert(method);
        self
    }

    pub fn with_init(self) -> Self {
        self.support(Method::Init)
    }

    pub fn with_markers(mut self, markers: Vec<Marker>) -> Self {
        self.markers = markers;
        self
    }

    /// Add an info marker whose message is the analyzed document's path.
    pub fn echoing_path(mut self) -> Self {
        self.echo_path = true;
        self
    }

    pub fn with_analyze_delay(mut self, delay: Duration) -> Self {
        self.analyze_delay = Some(delay);
        self
    }

    /// `analyze` never returns.
    pub fn stalling(mut self) -> Self {
        self.stall_analyze = true;
        self
    }

    /// Advertise `class` as the identifier character class.
    pub fn with_identifier_chars(mut self, class: &str) -> Self {
        self.identifier = Some(Regex::new(class).unwrap());
        self
    }

    pub fn with_parse_error(mut self, error: SyntaxError) -> Self {
        self.parse_error = Some(error);
        self
    }

    pub fn with_completions(mut self, names: &[&str]) -> Self {
        self.completions = names.iter().map(|n| CompletionMatch::new(*n)).collect();
        self.support(Method::Complete)
    }

    pub fn predicting(mut self, text: &str) -> Self {
        self.prediction = Some(text.to_string());
        self.support(Method::PredictNextCompletion)
    }

    pub fn with_tooltip(mut self, message: &str) -> Self {
        self.tooltip = Some(message.to_string());
        self.support(Method::Tooltip)
    }

    pub fn with_cursor_hint(mut self, message: &str) -> Self {
        self.cursor_hint = Some(message.to_string());
        self.support(Method::OnCursorMove)
    }

    pub fn with_outline(mut self, items: Vec<OutlineItem>) -> Self {
        self.outline = items;
        self.support(Method::Outline)
    }

    pub fn formatting_to(mut self, text: &str) -> Self {
        self.formatted = Some(text.to_string());
        self.support(Method::CodeFormat)
    }

    pub fn with_definitions(mut self, definitions: Vec<Definition>) -> Self {
        self.definitions = definitions;
        self.support(Method::JumpToDefinition)
    }

    pub fn with_quickfixes(mut self, fixes: Vec<Quickfix>) -> Self {
        self.quickfixes = fixes;
        self.support(Method::GetQuickfixes)
    }

    pub fn renaming(mut self, error: Option<&str>) -> Self {
        self.rename_error = error.map(str::to_string);
        self.support(Method::CommitRename)
    }

    fn record(&self, method: Method) {
        self.log.push(format!("{}:{method}", self.name));
    }
}

#[async_trait]
impl LanguageHandler for ScriptedHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, method: Method) -> bool {
        self.methods.contains(&method)
    }

    fn handles_language(&self, language: &str) -> bool {
        language == self.language
    }

    fn identifier_regex(&self) -> Option<Regex> {
        self.identifier.clone()
    }

    async fn init(&self, _ctx: &HandlerContext) -> HandlerResult<()> {
        self.record(Method::Init);
        Ok(())
    }

    async fn parse(&self, _ctx: &HandlerContext, part: &Part) -> HandlerResult<Option<SyntaxTree>> {
        self.record(Method::Parse);
        let tree = SyntaxTree::new(part.value());
        Ok(Some(match &self.parse_error {
            Some(error) => tree.with_error(error.clone()),
            None => tree,
        }))
    }

    async fn analyze(&self, ctx: &HandlerContext, _part: &Part, _tree: Option<&SyntaxTree>) -> HandlerResult<Vec<Marker>> {
        self.record(Method::Analyze);
        if self.stall_analyze {
            futures::future::pending::<()>().await;
        }
        if let Some(delay) = self.analyze_delay {
            tokio::time::sleep(delay).await;
        }
        let mut markers = self.markers.clone();
        if self.echo_path {
            markers.push(Marker::new(
                Range::point(Pos::new(0, 0)),
                plexus_core::Severity::Info,
                ctx.path.to_string(),
            ));
        }
        Ok(markers)
    }

    async fn complete(&self, _ctx: &HandlerContext, _request: &CompletionContext<'_>) -> HandlerResult<Vec<CompletionMatch>> {
        self.record(Method::Complete);
        Ok(self.completions.clone())
    }

    async fn predict_next_completion(
        &self,
        _ctx: &HandlerContext,
        _request: &CompletionContext<'_>,
        _matches: &[CompletionMatch],
    ) -> HandlerResult<Option<String>> {
        self.record(Method::PredictNextCompletion);
        Ok(self.prediction.clone())
    }

    async fn on_cursor_move(
        &self,
        _ctx: &HandlerContext,
        _cursor: &CursorContext<'_>,
    ) -> HandlerResult<Option<plexus_core::handler::CursorMoveResult>> {
        self.record(Method::OnCursorMove);
        Ok(self.cursor_hint.clone().map(|hint| plexus_core::handler::CursorMoveResult {
            hint: Some(hint),
            ..Default::default()
        }))
    }

    async fn tooltip(&self, _ctx: &HandlerContext, cursor: &CursorContext<'_>) -> HandlerResult<Option<Tooltip>> {
        self.record(Method::Tooltip);
        Ok(self.tooltip.clone().map(|message| Tooltip {
            message,
            pos: Some(Range::point(cursor.pos)),
            display_pos: None,
        }))
    }

    async fn outline(&self, _ctx: &HandlerContext, _part: &Part, _tree: Option<&SyntaxTree>) -> HandlerResult<Option<Outline>> {
        self.record(Method::Outline);
        Ok(Some(Outline {
            items: self.outline.clone(),
        }))
    }

    async fn code_format(&self, _ctx: &HandlerContext, _part: &Part) -> HandlerResult<Option<String>> {
        self.record(Method::CodeFormat);
        Ok(self.formatted.clone())
    }

    async fn jump_to_definition(&self, _ctx: &HandlerContext, _cursor: &CursorContext<'_>) -> HandlerResult<Vec<Definition>> {
        self.record(Method::JumpToDefinition);
        Ok(self.definitions.clone())
    }

    async fn get_quickfixes(&self, _ctx: &HandlerContext, _cursor: &CursorContext<'_>) -> HandlerResult<Vec<Quickfix>> {
        self.record(Method::GetQuickfixes);
        Ok(self.quickfixes.clone())
    }

    async fn commit_rename(
        &self,
        _ctx: &HandlerContext,
        _old_id: &str,
        _new_name: &str,
        _is_generated: bool,
    ) -> HandlerResult<()> {
        self.record(Method::CommitRename);
        match &self.rename_error {
            Some(err) => Err(HandlerError::failed(err.clone())),
            None => Ok(()),
        }
    }
}

/// Everything before `start` is the document's own language, everything after is javascript.
#[derive(Debug, Clone, Copy)]
pub struct ScriptSplitter {
    pub start: Pos,
}

impl RegionSplitter for ScriptSplitter {
    fn get_parts(&self, document: &Document, language: &str) -> Vec<Part> {
        let last_row = document.line_count().saturating_sub(1) as u32;
        let last_col = document.line(last_row).map(|l| l.chars().count()).unwrap_or(0) as u32;
        let end = Pos::new(last_row, last_col);
        if end < self.start {
            return WholeDocumentSplitter.get_parts(document, language);
        }
        [
            (language, Range::new(Pos::new(0, 0), self.start)),
            ("javascript", Range::new(self.start, end)),
        ]
        .into_iter()
        .enumerate()
        .filter_map(|(index, (language, region))| Part::from_document(index, language, document, region).ok())
        .collect()
    }
}

pub struct Harness {
    pub worker: Arc<Worker>,
    pub events: UnboundedReceiver<Outbound>,
}

impl Harness {
    pub fn start(config: WorkerConfig, handlers: Vec<ScriptedHandler>) -> Self {
        Self::with_splitter(config, handlers, Arc::new(WholeDocumentSplitter))
    }

    /// Build a worker whose catalog holds `handlers` and register all of them, in order.
    pub fn with_splitter(config: WorkerConfig, handlers: Vec<ScriptedHandler>, splitter: Arc<dyn RegionSplitter>) -> Self {
        let mut catalog = HandlerCatalog::new();
        let ids: Vec<String> = handlers.iter().map(|h| h.name.clone()).collect();
        for handler in handlers {
            let id = handler.name.clone();
            catalog.add(&id, move |_| Ok(Arc::new(handler.clone()) as Arc<dyn LanguageHandler>));
        }
        let (worker, events) = Worker::new(config, splitter, catalog).unwrap();
        let mut harness = Self { worker, events };
        for id in ids {
            harness.send(Inbound::Register {
                handler_id: id,
                source: None,
            });
        }
        harness.drain();
        harness
    }

    pub fn send(&self, message: Inbound) {
        self.worker.dispatch(message);
    }

    pub fn open(&self, path: &str, language: &str, text: &str) {
        self.send(Inbound::SwitchFile(SwitchFile {
            path: path.to_string(),
            language: language.to_string(),
            text: text.to_string(),
            cursor: Pos::default(),
            workspace_dir: None,
            is_console: false,
        }));
    }

    /// Everything emitted so far.
    pub fn drain(&mut self) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    /// Marker sets published so far, oldest first.
    pub fn marker_sets(&mut self) -> Vec<Vec<Marker>> {
        self.drain()
            .into_iter()
            .filter_map(|event| match event {
                Outbound::Markers(markers) => Some(markers),
                _ => None,
            })
            .collect()
    }
}

/// Let spawned tasks run to quiescence; advances the paused clock by `ms`.
pub async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

pub fn at(row: u32, column: u32, end_column: u32) -> Range {
    Range::new(Pos::new(row, column), Pos::new(row, end_column))
}
