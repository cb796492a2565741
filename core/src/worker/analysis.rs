use std::sync::Arc;

use tracing::debug;

use super::{Snapshot, Worker};
use crate::handler::Method;
use crate::marker::{Marker, filter_around_error, filter_by_level};
use crate::message::Outbound;
use crate::scheduler::RunTicket;

impl Worker {
    /// One full analysis pass. Invoked by the scheduler, never directly.
    pub(crate) async fn run_update(self: Arc<Self>, ticket: RunTicket) {
        let Some(snap) = self.snapshot() else {
            return;
        };
        self.ensure_initialized(&snap).await;

        let ctx = &snap.ctx;
        let document = &snap.document;
        self.fan_out(&snap, Method::OnUpdate, &self.document_target(document))
            .run(|h| async move { h.handler.on_update(ctx, document).await })
            .await;

        let markers = self.collect_markers(&snap).await;

        let published = {
            let mut state = self.state();
            let same_path = state.document.as_ref().is_some_and(|d| d.path() == document.path());
            if same_path && self.scheduler.is_current(ticket) {
                let markers = filter_by_level(markers, state.settings.warning_level);
                state.last_markers = markers.clone();
                Some(markers)
            } else {
                None
            }
        };
        match published {
            Some(markers) => {
                debug!(count = markers.len(), path = %document.path(), "publishing markers");
                self.emit(Outbound::Markers(markers));
            }
            None => debug!(path = %document.path(), "dropping markers of an abandoned pass"),
        }
    }

    /// Parse and analyze every part, returning document-global markers.
    pub(crate) async fn collect_markers(&self, snap: &Snapshot) -> Vec<Marker> {
        let document = &snap.document;
        let ctx = &snap.ctx;
        let parts = self.splitter.get_parts(document, document.language());
        let mut markers = Vec::new();
        for part in &parts {
            let tree = self.parse_part(snap, document, part, true).await;
            let tree_ref = tree.as_ref();
            let mut found = self
                .fan_out(snap, Method::Analyze, &self.part_target(document, part))
                .run_concat(|h| async move { h.handler.analyze(ctx, part, tree_ref).await })
                .await;
            if let Some(error) = tree.as_ref().and_then(|t| t.error.as_ref()) {
                filter_around_error(&mut found, error);
            }
            markers.extend(found.into_iter().map(|m| m.into_global(part)));
        }
        markers
    }
}
