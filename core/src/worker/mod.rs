//! The coordinator: owns the live document, the handler registry and the caches, and turns
//! inbound messages into handler fan-outs and outbound events.
//!
//! Document mutations are applied synchronously inside [`Worker::dispatch`], in arrival order.
//! Everything that talks to handlers runs as a spawned task on a snapshot and re-checks the
//! live state before publishing.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use regex::Regex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::completion::CompletionCache;
use crate::config::WorkerConfig;
use crate::document::{Document, EditOp, Pos, Surface};
use crate::error::ConfigError;
use crate::fanout::{FanOut, StageProbe};
use crate::handler::{
    HandlerCatalog, HandlerContext, HandlerRegistry, MatchTarget, Method, Node, RegisteredHandler, SyntaxTree,
};
use crate::host::{HostReply, HostServices};
use crate::marker::{Marker, Severity};
use crate::message::{Inbound, Outbound, RegexAdvert, SwitchFile};
use crate::region::{Part, RegionSplitter};
use crate::scheduler::{IdleHook, RunTicket, UpdateJob, UpdateScheduler};

mod analysis;
mod completion;
mod cursor;
mod requests;
mod trees;

use cursor::CursorEvent;
use trees::TreeCache;

#[derive(Debug, Clone)]
struct Settings {
    warning_level: Severity,
    disabled_features: Arc<HashSet<String>>,
    debug: bool,
}

struct WorkerState {
    document: Option<Document>,
    cursor: Pos,
    registry: HandlerRegistry,
    settings: Settings,
    trees: TreeCache,
    last_markers: Vec<Marker>,
    pending_cursor: Option<CursorEvent>,
    /// Language of every document the host told us is open.
    open_documents: HashMap<String, Arc<str>>,
}

/// Everything a pipeline needs, copied out of the state so no lock is held across handlers.
pub(crate) struct Snapshot {
    pub(crate) document: Document,
    pub(crate) handlers: Vec<Arc<RegisteredHandler>>,
    pub(crate) ctx: HandlerContext,
    pub(crate) timing: bool,
}

pub struct Worker {
    config: WorkerConfig,
    splitter: Arc<dyn RegionSplitter>,
    catalog: HandlerCatalog,
    host: HostServices,
    outbound: mpsc::UnboundedSender<Outbound>,
    scheduler: UpdateScheduler,
    probe: StageProbe,
    state: Mutex<WorkerState>,
    completions: Mutex<CompletionCache>,
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        splitter: Arc<dyn RegionSplitter>,
        catalog: HandlerCatalog,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<Outbound>), ConfigError> {
        config.validate()?;
        let (outbound, rx) = mpsc::unbounded_channel();
        let probe = StageProbe::new();
        let worker = Arc::new_cyclic(|weak: &std::sync::Weak<Worker>| {
            let on_idle: IdleHook = {
                let weak = weak.clone();
                Arc::new(move || {
                    if let Some(worker) = weak.upgrade() {
                        worker.replay_deferred_cursor();
                    }
                })
            };
            let weak = weak.clone();
            let job: UpdateJob = Arc::new(move |ticket: RunTicket| {
                let weak = weak.clone();
                async move {
                    if let Some(worker) = weak.upgrade() {
                        worker.run_update(ticket).await;
                    }
                }
                .boxed()
            });
            let scheduler = UpdateScheduler::new(config.min_delay(), config.max_delay(), probe.clone(), job, on_idle);
            let settings = Settings {
                warning_level: config.warning_level,
                disabled_features: Arc::new(config.disabled_features.iter().cloned().collect()),
                debug: false,
            };
            Worker {
                splitter,
                catalog,
                host: HostServices::new(outbound.clone()),
                outbound,
                scheduler,
                probe,
                state: Mutex::new(WorkerState {
                    document: None,
                    cursor: Pos::default(),
                    registry: HandlerRegistry::new(),
                    settings,
                    trees: TreeCache::default(),
                    last_markers: Vec::new(),
                    pending_cursor: None,
                    open_documents: HashMap::new(),
                }),
                completions: Mutex::new(CompletionCache::new()),
                config,
            }
        });
        Ok((worker, rx))
    }

    fn state(&self) -> MutexGuard<'_, WorkerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn completions(&self) -> MutexGuard<'_, CompletionCache> {
        self.completions.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn host(&self) -> &HostServices {
        &self.host
    }

    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.scheduler
    }

    /// Copy of the live document, if one has been switched to.
    pub fn document(&self) -> Option<Document> {
        self.state().document.clone()
    }

    pub fn handler_ids(&self) -> Vec<String> {
        self.state().registry.ids()
    }

    /// Markers from the most recent published analysis pass.
    pub fn last_markers(&self) -> Vec<Marker> {
        self.state().last_markers.clone()
    }

    fn emit(&self, message: Outbound) {
        if self.outbound.send(message).is_err() {
            debug!("outbound channel closed, dropping event");
        }
    }

    fn snapshot(&self) -> Option<Snapshot> {
        let document = self.state().document.clone()?;
        Some(self.snapshot_for(document))
    }

    /// Snapshot of the registry and settings with a context built for `document`.
    fn snapshot_for(&self, document: Document) -> Snapshot {
        let state = self.state();
        let ctx = HandlerContext::for_document(
            &document,
            state.settings.disabled_features.clone(),
            state.settings.debug,
            self.host.clone(),
        );
        Snapshot {
            handlers: state.registry.snapshot(),
            timing: state.settings.debug,
            ctx,
            document,
        }
    }

    /// Whether `document` is still the live generation of the live path.
    fn is_live(&self, document: &Document) -> bool {
        self.state()
            .document
            .as_ref()
            .is_some_and(|d| d.path() == document.path() && d.generation() == document.generation())
    }

    fn part_target<'a>(&self, document: &Document, part: &'a Part) -> MatchTarget<'a> {
        MatchTarget::new(
            &part.language,
            part.len_chars(),
            document.surface(),
            self.config.max_file_size,
        )
    }

    fn document_target<'a>(&self, document: &'a Document) -> MatchTarget<'a> {
        MatchTarget::new(
            document.language(),
            document.len_chars(),
            document.surface(),
            self.config.max_file_size,
        )
    }

    fn fan_out<'a>(&'a self, snap: &Snapshot, method: Method, target: &MatchTarget<'_>) -> FanOut<'a> {
        FanOut::matching(&snap.handlers, method, target)
            .with_probe(&self.probe)
            .with_timing(snap.timing)
    }

    /// Parse `part`, reusing this generation's tree when there is one.
    pub(crate) async fn parse_part(&self, snap: &Snapshot, document: &Document, part: &Part, cache: bool) -> Option<SyntaxTree> {
        if cache {
            if let Some(tree) = self.state().trees.fresh(document, part.index) {
                return tree;
            }
        }
        let ctx = &snap.ctx;
        let tree = self
            .fan_out(snap, Method::Parse, &self.part_target(document, part))
            .run_last(|h| async move { h.handler.parse(ctx, part).await })
            .await;
        if cache {
            let mut state = self.state();
            let live = state
                .document
                .as_ref()
                .is_some_and(|d| d.path() == document.path() && d.generation() == document.generation());
            if live {
                state.trees.store(document, part.index, tree.clone());
            }
        }
        tree
    }

    pub(crate) async fn find_node(
        &self,
        snap: &Snapshot,
        document: &Document,
        part: &Part,
        tree: Option<&SyntaxTree>,
        local: Pos,
    ) -> Option<Node> {
        let tree = tree?;
        let ctx = &snap.ctx;
        self.fan_out(snap, Method::FindNode, &self.part_target(document, part))
            .run_last(|h| async move { h.handler.find_node(ctx, tree, local).await })
            .await
    }

    /// Identifier regex for `language`: the last serving handler that declares one.
    pub(crate) fn identifier_regex(&self, handlers: &[Arc<RegisteredHandler>], language: &str, surface: Surface) -> Regex {
        handlers
            .iter()
            .filter(|h| h.serves(language, surface))
            .filter_map(|h| h.handler.identifier_regex())
            .last()
            .unwrap_or_else(|| crate::text::DEFAULT_IDENTIFIER_REGEX.clone())
    }

    /// Apply one inbound message. Must be called from inside a tokio runtime.
    pub fn dispatch(self: &Arc<Self>, message: Inbound) {
        match message {
            Inbound::DocumentOpen { path, language, text } => {
                let document = Document::new(&path, &language, &text);
                self.state().open_documents.insert(path, document.language().clone());
                tokio::spawn(self.clone().document_open(document));
            }
            Inbound::SwitchFile(switch) => self.switch_file(switch),
            Inbound::DocumentClose { path } => {
                let language = {
                    let mut state = self.state();
                    let current = state.document.as_ref().map(|d| d.language().clone());
                    state.open_documents.remove(&path).or(current)
                };
                if let Some(language) = language {
                    tokio::spawn(self.clone().document_close(path, language));
                }
            }
            Inbound::Change(op) => self.change(op),
            Inbound::CursorMove { pos, line } => self.cursor_move(pos, line),
            Inbound::Complete(request) => {
                self.state().cursor = request.pos;
                tokio::spawn(self.clone().complete(request));
            }
            Inbound::Analyze => self.scheduler.request(true),
            Inbound::Outline => {
                tokio::spawn(self.clone().outline());
            }
            Inbound::Hierarchy { pos, kind } => {
                tokio::spawn(self.clone().hierarchy(pos, kind));
            }
            Inbound::CodeFormat => {
                tokio::spawn(self.clone().code_format());
            }
            Inbound::JumpToDefinition { pos } => {
                tokio::spawn(self.clone().jump_to_definition(pos));
            }
            Inbound::IsJumpToDefinitionAvailable { pos } => {
                tokio::spawn(self.clone().is_jump_to_definition_available(pos));
            }
            Inbound::Quickfixes { pos } => {
                tokio::spawn(self.clone().quickfixes(pos));
            }
            Inbound::Refactorings { pos } => {
                tokio::spawn(self.clone().refactorings(pos));
            }
            Inbound::RenamePositions { pos } => {
                tokio::spawn(self.clone().rename_positions(pos));
            }
            Inbound::OnRenameBegin => {
                tokio::spawn(self.clone().rename_hook(Method::OnRenameBegin));
            }
            Inbound::CommitRename {
                old_id,
                new_name,
                is_generated,
            } => {
                tokio::spawn(self.clone().commit_rename(old_id, new_name, is_generated));
            }
            Inbound::OnRenameCancel => {
                tokio::spawn(self.clone().rename_hook(Method::OnRenameCancel));
            }
            Inbound::Inspect { pos } => {
                tokio::spawn(self.clone().inspect(pos));
            }
            Inbound::Register { handler_id, source } => self.register(&handler_id, source.as_deref()),
            Inbound::Unregister { handler_id } => self.unregister(&handler_id),
            Inbound::SetWarningLevel { level } => {
                self.state().settings.warning_level = level;
                self.scheduler.request(true);
            }
            Inbound::EnableFeature { name } => {
                let mut state = self.state();
                Arc::make_mut(&mut state.settings.disabled_features).remove(&name);
            }
            Inbound::DisableFeature { name } => {
                let mut state = self.state();
                Arc::make_mut(&mut state.settings.disabled_features).insert(name);
            }
            Inbound::SetDebug { enabled } => {
                self.state().settings.debug = enabled;
                info!(enabled, "handler timing logs toggled");
            }
            Inbound::HostResponse { id, err, result } => {
                self.host.resolve(id, HostReply { err, result });
            }
        }
    }

    fn switch_file(self: &Arc<Self>, switch: SwitchFile) {
        let surface = if switch.is_console {
            Surface::Console
        } else {
            Surface::Editor
        };
        let document = Document::new(&switch.path, &switch.language, &switch.text)
            .with_workspace_dir(switch.workspace_dir.as_deref())
            .with_surface(surface);
        info!(path = %switch.path, language = %switch.language, "switched file");
        let handlers = {
            let mut state = self.state();
            state
                .open_documents
                .insert(switch.path.clone(), document.language().clone());
            state.document = Some(document.clone());
            state.cursor = switch.cursor;
            state.trees.reset();
            state.last_markers.clear();
            state.pending_cursor = None;
            state.registry.snapshot()
        };
        self.completions().invalidate();
        self.advertise_regexes(&handlers, &document);
        self.scheduler.request(true);
    }

    fn change(self: &Arc<Self>, op: EditOp) {
        {
            let mut state = self.state();
            let Some(document) = state.document.as_mut() else {
                debug!("edit without a document, ignoring");
                return;
            };
            if let Err(err) = document.apply(&op) {
                warn!(error = %err, "rejected edit");
                return;
            }
            state.trees.retire();
        }
        self.scheduler.request(false);
    }

    /// Emit the per-language regex advertisements for `document`'s language.
    fn advertise_regexes(&self, handlers: &[Arc<RegisteredHandler>], document: &Document) {
        let language = document.language().to_string();
        let serving: Vec<_> = handlers
            .iter()
            .filter(|h| h.serves(&language, document.surface()))
            .collect();
        let pick = |get: fn(&RegisteredHandler) -> Option<Regex>| {
            serving.iter().filter_map(|h| get(h)).last().map(|regex| RegexAdvert {
                language: language.clone(),
                regex: regex.as_str().to_string(),
            })
        };
        if let Some(advert) = pick(|h| h.handler.identifier_regex()) {
            self.emit(Outbound::SetIdentifierRegex(advert));
        }
        if let Some(advert) = pick(|h| h.handler.completion_regex()) {
            self.emit(Outbound::SetCompletionRegex(advert));
        }
        if let Some(advert) = pick(|h| h.handler.tooltip_regex()) {
            self.emit(Outbound::SetTooltipRegex(advert));
        }
    }

    fn register(self: &Arc<Self>, id: &str, source: Option<&str>) {
        let registered = self
            .catalog
            .instantiate(id, source)
            .and_then(|handler| self.state().registry.register(id, handler));
        let err = match registered {
            Ok(_) => {
                info!(handler = id, "handler registered");
                None
            }
            Err(err) => {
                warn!(handler = id, error = %err, "handler registration failed");
                Some(err.to_string())
            }
        };
        let ok = err.is_none();
        self.emit(Outbound::Registered {
            path: id.to_string(),
            err,
        });
        if !ok {
            return;
        }
        self.completions().invalidate();
        let (handlers, document) = {
            let state = self.state();
            (state.registry.snapshot(), state.document.clone())
        };
        if let Some(document) = document {
            self.advertise_regexes(&handlers, &document);
            self.scheduler.request(true);
        }
    }

    fn unregister(self: &Arc<Self>, id: &str) {
        let removed = {
            let mut state = self.state();
            let removed = state.registry.unregister(id);
            if removed.is_some() {
                state.trees.reset();
            }
            removed
        };
        match removed {
            Some(_) => {
                info!(handler = id, "handler unregistered");
                self.completions().invalidate();
                self.scheduler.request(true);
            }
            None => debug!(handler = id, "unregister for unknown handler"),
        }
    }

    /// Run the one-shot `init` for handlers serving `document` that have not seen one yet.
    async fn ensure_initialized(&self, snap: &Snapshot) {
        let target = self.document_target(&snap.document).ignoring_size();
        let fresh: Vec<_> = snap
            .handlers
            .iter()
            .filter(|h| h.matches(Method::Init, &target) && h.mark_initialized())
            .cloned()
            .collect();
        if fresh.is_empty() {
            return;
        }
        let ctx = &snap.ctx;
        FanOut::matching(&fresh, Method::Init, &target)
            .with_probe(&self.probe)
            .with_timing(snap.timing)
            .run(|h| async move { h.handler.init(ctx).await })
            .await;
    }

    async fn document_open(self: Arc<Self>, document: Document) {
        let snap = self.snapshot_for(document);
        let target = self.document_target(&snap.document).ignoring_size();
        let (ctx, doc) = (&snap.ctx, &snap.document);
        self.fan_out(&snap, Method::OnDocumentOpen, &target)
            .run(|h| async move { h.handler.on_document_open(ctx, doc).await })
            .await;
    }

    async fn document_close(self: Arc<Self>, path: String, language: Arc<str>) {
        let snap = self.snapshot_for(Document::new(&path, &language, ""));
        let target = self.document_target(&snap.document).ignoring_size();
        let (ctx, path) = (&snap.ctx, path.as_str());
        self.fan_out(&snap, Method::OnDocumentClose, &target)
            .run(|h| async move { h.handler.on_document_close(ctx, path).await })
            .await;
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}
