use std::sync::Arc;

use regex::Regex;
use tokio::time::sleep;
use tracing::debug;

use super::{Snapshot, Worker};
use crate::completion::{CacheKey, CompletionMatch, Lookup, finalize};
use crate::document::{Document, Pos};
use crate::handler::{CompletionContext, Method, Node, SyntaxTree};
use crate::message::{CompleteRequest, CompletionResponse, Outbound};
use crate::region::Part;
use crate::text::{can_reuse_for_edited_line, preceding_identifier};

/// Part-local view of one completion position, with the tree and node already resolved.
struct CompletionInput {
    document: Document,
    part: Part,
    local: Pos,
    line: String,
    prefix: String,
    tree: Option<SyntaxTree>,
    node: Option<Node>,
}

impl CompletionInput {
    fn context<'a>(&'a self, regex: &'a Regex) -> CompletionContext<'a> {
        CompletionContext {
            part: &self.part,
            tree: self.tree.as_ref(),
            node: self.node.as_ref(),
            pos: self.local,
            line: &self.line,
            prefix: &self.prefix,
            identifier_regex: regex,
        }
    }

    fn line_before_cursor(&self) -> String {
        self.line.chars().take(self.local.column as usize).collect()
    }
}

impl Worker {
    pub(crate) async fn complete(self: Arc<Self>, request: CompleteRequest) {
        if !self.wait_for_line(&request).await {
            debug!(row = request.pos.row, "completion line never caught up, giving up");
            return;
        }
        let Some(snap) = self.snapshot() else {
            return;
        };
        let document = snap.document.clone();
        let regex = self.identifier_regex(&snap.handlers, document.language(), document.surface());
        let Some(key) = CacheKey::compute(&document, request.pos, Some(&regex)) else {
            return;
        };

        let lookup = self.completions().lookup(&key);
        let mut computed = None;
        let matches = match lookup {
            Lookup::Hit(matches) => {
                debug!(prefix = %key.prefix, "completion served from cache");
                matches
            }
            Lookup::Pending(rx) => match rx.await {
                Ok(matches) => matches,
                Err(_) => return,
            },
            Lookup::Miss => {
                self.completions().begin(key.clone());
                let Some(input) = self.completion_input(&snap, document, request.pos, &regex, true).await else {
                    self.completions().fill(&key, Arc::new(Vec::new()));
                    return;
                };
                let matches = Arc::new(self.compute_matches(&snap, &input, &regex).await);
                self.completions().fill(&key, matches.clone());
                computed = Some(input);
                matches
            }
        };

        let (live_line, cursor, path) = {
            let state = self.state();
            let Some(live) = state.document.as_ref() else {
                return;
            };
            (live.line(request.pos.row), state.cursor, live.path().clone())
        };
        let fresh = live_line
            .as_deref()
            .is_some_and(|live| can_reuse_for_edited_line(&request.line, live, request.pos, cursor, Some(&regex)));
        if fresh && path == *snap.document.path() {
            self.emit(Outbound::Complete(CompletionResponse {
                pos: request.pos,
                line: request.line.clone(),
                path: path.to_string(),
                prefix: key.prefix.clone(),
                matches: (*matches).clone(),
                force_box: request.force_box,
                is_update: request.is_update,
            }));
        } else {
            debug!(row = request.pos.row, "dropping stale completion result");
        }

        if let Some(input) = computed {
            if self.config.predict_completions {
                self.predict(&snap, &input, &regex, &matches).await;
            }
        }
    }

    /// Whether the live line matches what the host saw, after the configured retries.
    async fn wait_for_line(&self, request: &CompleteRequest) -> bool {
        let mut delays = self.config.completion_retry_delays();
        loop {
            let live = self
                .state()
                .document
                .as_ref()
                .and_then(|d| d.line(request.pos.row));
            if live.as_deref() == Some(request.line.as_str()) {
                return true;
            }
            match delays.next() {
                Some(delay) => sleep(delay).await,
                None => return false,
            }
        }
    }

    async fn completion_input(
        &self,
        snap: &Snapshot,
        document: Document,
        pos: Pos,
        regex: &Regex,
        cache_trees: bool,
    ) -> Option<CompletionInput> {
        let part = self.splitter.get_context_part(&document, pos, document.language())?;
        let local = part.to_local(pos);
        let line = part.line(local.row)?;
        let prefix = preceding_identifier(&line, local.column as usize, Some(regex));
        let tree = self.parse_part(snap, &document, &part, cache_trees).await;
        let node = self.find_node(snap, &document, &part, tree.as_ref(), local).await;
        Some(CompletionInput {
            document,
            part,
            local,
            line,
            prefix,
            tree,
            node,
        })
    }

    async fn compute_matches(&self, snap: &Snapshot, input: &CompletionInput, regex: &Regex) -> Vec<CompletionMatch> {
        let ctx = &snap.ctx;
        let request = input.context(regex);
        let matches = self
            .fan_out(snap, Method::Complete, &self.part_target(&input.document, &input.part))
            .run_concat(|h| async move { h.handler.complete(ctx, &request).await })
            .await;
        finalize(matches, &input.line_before_cursor(), regex)
    }

    /// Pre-compute the completion for the text a handler expects the user to type next.
    async fn predict(&self, snap: &Snapshot, input: &CompletionInput, regex: &Regex, matches: &[CompletionMatch]) {
        let ctx = &snap.ctx;
        let request = input.context(regex);
        let predicted = self
            .fan_out(
                snap,
                Method::PredictNextCompletion,
                &self.part_target(&input.document, &input.part),
            )
            .run_last(|h| async move { h.handler.predict_next_completion(ctx, &request, matches).await })
            .await;
        let Some(text) = predicted else {
            return;
        };

        let global = input.part.to_global(input.local);
        let Some(line) = input.document.line(global.row) else {
            return;
        };
        let column = (global.column as usize).min(line.chars().count());
        let start = column - preceding_identifier(&line, column, Some(regex)).chars().count();
        let head: String = line.chars().take(start).collect();
        let tail: String = line.chars().skip(column).collect();
        let predicted_line = format!("{head}{text}{tail}");
        let predicted_pos = Pos::new(global.row, (start + text.chars().count()) as u32);
        let Ok(predicted_doc) = input.document.with_line_replaced(global.row, &predicted_line) else {
            return;
        };
        let Some(key) = CacheKey::compute(&predicted_doc, predicted_pos, Some(regex)) else {
            return;
        };
        if self.completions().live_key().is_some_and(|live| live.serves(&key)) {
            return;
        }

        debug!(predicted = %text, "pre-computing predicted completion");
        self.completions().begin_prediction(key.clone());
        let Some(predicted_input) = self
            .completion_input(snap, predicted_doc, predicted_pos, regex, false)
            .await
        else {
            return;
        };
        let predicted_matches = self.compute_matches(snap, &predicted_input, regex).await;
        self.completions().fill(&key, Arc::new(predicted_matches));
    }
}
