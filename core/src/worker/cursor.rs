use std::sync::Arc;

use tracing::debug;

use super::Worker;
use crate::document::{Pos, Range};
use crate::handler::{CursorContext, CursorMoveResult, Method};
use crate::marker::Marker;
use crate::message::{Hint, Outbound};

/// A cursor move as the host reported it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CursorEvent {
    pub(crate) pos: Pos,
    /// Host's copy of the cursor line; `None` skips the staleness check.
    pub(crate) line: Option<String>,
}

impl Worker {
    pub(crate) fn cursor_move(self: &Arc<Self>, pos: Pos, line: Option<String>) {
        self.state().cursor = pos;
        tokio::spawn(self.clone().cursor_unparsed(CursorEvent { pos, line }));
    }

    /// `Some(line)` if the live line still reads as the event saw it.
    fn live_line_for(&self, event: &CursorEvent) -> Option<String> {
        let live = self.state().document.as_ref()?.line(event.pos.row)?;
        match &event.line {
            Some(seen) if *seen != live => None,
            _ => Some(live),
        }
    }

    fn is_cursor_at(&self, pos: Pos) -> bool {
        self.state().cursor == pos
    }

    /// Fast pass: answer from whatever tree is at hand, then hand over to the analyzed pass.
    async fn cursor_unparsed(self: Arc<Self>, event: CursorEvent) {
        let Some(line) = self.live_line_for(&event) else {
            self.emit(Outbound::Hint(Hint::line_changed()));
            return;
        };
        let Some(snap) = self.snapshot() else {
            return;
        };
        let document = &snap.document;
        let Some(part) = self.splitter.get_context_part(document, event.pos, document.language()) else {
            debug!(pos = ?event.pos, "cursor outside every part");
            return;
        };
        let local = part.to_local(event.pos);
        let tree = self.state().trees.best_effort(document, part.index);
        let node = self.find_node(&snap, document, &part, tree.as_ref(), local).await;
        let cursor = CursorContext {
            part: &part,
            tree: tree.as_ref(),
            node: node.as_ref(),
            pos: local,
        };
        let ctx = &snap.ctx;
        let results: Vec<CursorMoveResult> = self
            .fan_out(&snap, Method::OnCursorMove, &self.part_target(document, &part))
            .run(|h| async move { h.handler.on_cursor_move(ctx, &cursor).await })
            .await
            .into_iter()
            .flatten()
            .collect();

        let mut markers: Vec<Marker> = Vec::new();
        let mut message = None;
        let mut display_pos = None;
        for result in results {
            markers.extend(result.markers.into_iter().map(|m| m.into_global(&part)));
            if result.hint.is_some() {
                message = result.hint;
                display_pos = result.display_pos.map(|p| part.to_global(p));
            }
        }
        if message.is_none() {
            let state = self.state();
            let covering: Vec<&str> = state
                .last_markers
                .iter()
                .filter(|m| m.covers(event.pos))
                .map(|m| m.message.as_str())
                .filter(|m| !m.is_empty())
                .collect();
            if !covering.is_empty() {
                message = Some(covering.join("\n"));
            }
        }

        if !self.is_cursor_at(event.pos) {
            return;
        }
        if !markers.is_empty() {
            self.emit(Outbound::HighlightMarkers(markers));
        }
        if message.is_some() {
            self.emit(Outbound::Hint(Hint {
                pos: None,
                display_pos,
                message,
                line: Some(line),
            }));
        }

        // Checked under the state lock so the idle hook cannot miss a parked event.
        let deferred = {
            let mut state = self.state();
            let busy = self.scheduler.is_busy();
            if busy && state.pending_cursor.replace(event.clone()).is_some() {
                debug!("replacing deferred cursor event");
            }
            busy
        };
        if !deferred {
            self.cursor_analyzed(event).await;
        }
    }

    /// Run the analyzed pass parked while an update was in progress.
    pub(crate) fn replay_deferred_cursor(self: &Arc<Self>) {
        let pending = {
            let mut state = self.state();
            if self.scheduler.is_busy() {
                return;
            }
            state.pending_cursor.take()
        };
        if let Some(event) = pending {
            debug!(pos = ?event.pos, "replaying deferred cursor event");
            tokio::spawn(self.clone().cursor_analyzed(event));
        }
    }

    /// Authoritative pass on a fresh tree; overwrites whatever the fast pass showed.
    pub(crate) async fn cursor_analyzed(self: Arc<Self>, event: CursorEvent) {
        if !self.is_cursor_at(event.pos) {
            return;
        }
        if self.live_line_for(&event).is_none() {
            self.emit(Outbound::Hint(Hint::line_changed()));
            return;
        }
        let Some(snap) = self.snapshot() else {
            return;
        };
        let document = &snap.document;
        let Some(part) = self.splitter.get_context_part(document, event.pos, document.language()) else {
            return;
        };
        let local = part.to_local(event.pos);
        let tree = self.parse_part(&snap, document, &part, true).await;
        let node = self.find_node(&snap, document, &part, tree.as_ref(), local).await;
        let cursor = CursorContext {
            part: &part,
            tree: tree.as_ref(),
            node: node.as_ref(),
            pos: local,
        };
        let ctx = &snap.ctx;
        let target = self.part_target(document, &part);
        let tooltip = self
            .fan_out(&snap, Method::Tooltip, &target)
            .run_last(|h| async move { h.handler.tooltip(ctx, &cursor).await })
            .await;
        let occurrences = self
            .fan_out(&snap, Method::HighlightOccurrences, &target)
            .run_concat(|h| async move { h.handler.highlight_occurrences(ctx, &cursor).await })
            .await;

        if !self.is_live(document) || !self.is_cursor_at(event.pos) {
            debug!(pos = ?event.pos, "dropping stale cursor result");
            return;
        }
        let line = document.line(event.pos.row);
        self.emit(Outbound::HighlightMarkers(
            occurrences.into_iter().map(|m| m.into_global(&part)).collect(),
        ));
        let hint = match tooltip {
            Some(tooltip) => Hint {
                pos: tooltip.pos.map(|r: Range| part.range_to_global(r)),
                display_pos: tooltip.display_pos.map(|p| part.to_global(p)),
                message: Some(tooltip.message),
                line,
            },
            None => Hint {
                line,
                ..Hint::default()
            },
        };
        self.emit(Outbound::Hint(hint));
    }
}
