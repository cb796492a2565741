use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::{Snapshot, Worker};
use crate::document::{Document, EditOp, Pos};
use crate::error::{EditError, HandlerError};
use crate::handler::{CursorContext, Definition, Method, Node, Outline, SyntaxTree};
use crate::marker::Quickfix;
use crate::message::Outbound;
use crate::region::Part;
use crate::text::{following_identifier, preceding_identifier};

/// A request position resolved to its part, tree and node.
struct Located {
    part: Part,
    local: Pos,
    tree: Option<SyntaxTree>,
    node: Option<Node>,
}

impl Located {
    fn cursor(&self) -> CursorContext<'_> {
        CursorContext {
            part: &self.part,
            tree: self.tree.as_ref(),
            node: self.node.as_ref(),
            pos: self.local,
        }
    }
}

impl Worker {
    async fn locate(&self, snap: &Snapshot, pos: Pos) -> Option<Located> {
        let document = &snap.document;
        let Some(part) = self.splitter.get_context_part(document, pos, document.language()) else {
            debug!(?pos, "request outside every part");
            return None;
        };
        let local = part.to_local(pos);
        let tree = self.parse_part(snap, document, &part, true).await;
        let node = self.find_node(snap, document, &part, tree.as_ref(), local).await;
        Some(Located {
            part,
            local,
            tree,
            node,
        })
    }

    pub(crate) async fn outline(self: Arc<Self>) {
        let Some(snap) = self.snapshot() else {
            return;
        };
        let document = &snap.document;
        let ctx = &snap.ctx;
        let mut items = Vec::new();
        for part in self.splitter.get_parts(document, document.language()) {
            let tree = self.parse_part(&snap, document, &part, true).await;
            let (part_ref, tree_ref) = (&part, tree.as_ref());
            let outline = self
                .fan_out(&snap, Method::Outline, &self.part_target(document, &part))
                .run_last(|h| async move { h.handler.outline(ctx, part_ref, tree_ref).await })
                .await;
            if let Some(outline) = outline {
                items.extend(outline.items.into_iter().map(|item| item.into_global(&part)));
            }
        }
        self.emit(Outbound::Outline(Outline { items }));
    }

    pub(crate) async fn hierarchy(self: Arc<Self>, pos: Pos, kind: String) {
        let Some(snap) = self.snapshot() else {
            return;
        };
        let Some(located) = self.locate(&snap, pos).await else {
            return;
        };
        let (ctx, cursor, kind) = (&snap.ctx, located.cursor(), kind.as_str());
        let result = self
            .fan_out(&snap, Method::Hierarchy, &self.part_target(&snap.document, &located.part))
            .run_last(|h| async move { h.handler.hierarchy(ctx, &cursor, kind).await })
            .await;
        self.emit(Outbound::Hierarchy(result.unwrap_or(Value::Null)));
    }

    /// Format every part and splice the results back, last part first so earlier regions
    /// keep their coordinates.
    pub(crate) async fn code_format(self: Arc<Self>) {
        let Some(snap) = self.snapshot() else {
            return;
        };
        let document = &snap.document;
        let ctx = &snap.ctx;
        let mut parts = self.splitter.get_parts(document, document.language());
        parts.sort_by_key(|part| part.region.start);
        let mut formatted = document.clone();
        let mut changed = false;
        for part in parts.iter().rev() {
            let result = self
                .fan_out(&snap, Method::CodeFormat, &self.part_target(document, part))
                .run_last(|h| async move { h.handler.code_format(ctx, part).await })
                .await;
            let Some(text) = result else {
                continue;
            };
            if text == part.value() {
                continue;
            }
            if let Err(err) = splice(&mut formatted, part, text) {
                debug!(error = %err, "formatted part no longer fits the document");
                return;
            }
            changed = true;
        }
        if !changed {
            return;
        }
        if !self.is_live(document) {
            debug!("document changed while formatting, dropping result");
            return;
        }
        self.emit(Outbound::CodeFormat(formatted.value()));
    }

    async fn definitions(&self, snap: &Snapshot, pos: Pos) -> Option<Vec<Definition>> {
        let located = self.locate(snap, pos).await?;
        let (ctx, cursor) = (&snap.ctx, located.cursor());
        let current = snap.document.path();
        let definitions = self
            .fan_out(snap, Method::JumpToDefinition, &self.part_target(&snap.document, &located.part))
            .run_concat(|h| async move { h.handler.jump_to_definition(ctx, &cursor).await })
            .await
            .into_iter()
            .map(|mut def| {
                if def.path.as_deref().map_or(true, |path| path == &**current) {
                    def.pos = located.part.range_to_global(def.pos);
                }
                def
            })
            .collect();
        Some(definitions)
    }

    pub(crate) async fn jump_to_definition(self: Arc<Self>, pos: Pos) {
        let Some(snap) = self.snapshot() else {
            return;
        };
        let Some(results) = self.definitions(&snap, pos).await else {
            return;
        };
        let document = &snap.document;
        let regex = self.identifier_regex(&snap.handlers, document.language(), document.surface());
        let line = document.line(pos.row).unwrap_or_default();
        let column = pos.column as usize;
        let identifier = format!(
            "{}{}",
            preceding_identifier(&line, column, Some(&regex)),
            following_identifier(&line, column, Some(&regex))
        );
        self.emit(Outbound::Definition { results, identifier });
    }

    pub(crate) async fn is_jump_to_definition_available(self: Arc<Self>, pos: Pos) {
        let Some(snap) = self.snapshot() else {
            return;
        };
        let available = self
            .definitions(&snap, pos)
            .await
            .is_some_and(|results| !results.is_empty());
        self.emit(Outbound::IsJumpToDefinitionAvailableResult(available));
    }

    /// Fixes attached to published markers under `pos`, then whatever handlers offer.
    pub(crate) async fn quickfixes(self: Arc<Self>, pos: Pos) {
        let Some(snap) = self.snapshot() else {
            return;
        };
        let mut fixes: Vec<Quickfix> = self
            .state()
            .last_markers
            .iter()
            .filter(|m| m.covers(pos))
            .flat_map(|m| m.resolutions.iter().cloned())
            .collect();
        if let Some(located) = self.locate(&snap, pos).await {
            let (ctx, cursor) = (&snap.ctx, located.cursor());
            let offered = self
                .fan_out(&snap, Method::GetQuickfixes, &self.part_target(&snap.document, &located.part))
                .run_concat(|h| async move { h.handler.get_quickfixes(ctx, &cursor).await })
                .await;
            fixes.extend(offered.into_iter().map(|mut fix| {
                fix.pos = located.part.range_to_global(fix.pos);
                fix
            }));
        }
        self.emit(Outbound::QuickfixesResult(fixes));
    }

    pub(crate) async fn refactorings(self: Arc<Self>, pos: Pos) {
        let Some(snap) = self.snapshot() else {
            return;
        };
        let Some(located) = self.locate(&snap, pos).await else {
            return;
        };
        let (ctx, cursor) = (&snap.ctx, located.cursor());
        let names = self
            .fan_out(&snap, Method::GetRefactorings, &self.part_target(&snap.document, &located.part))
            .run_concat(|h| async move { h.handler.get_refactorings(ctx, &cursor).await })
            .await;
        self.emit(Outbound::RefactoringsResult(names));
    }

    pub(crate) async fn rename_positions(self: Arc<Self>, pos: Pos) {
        let Some(snap) = self.snapshot() else {
            return;
        };
        let Some(located) = self.locate(&snap, pos).await else {
            return;
        };
        let (ctx, cursor) = (&snap.ctx, located.cursor());
        let result = self
            .fan_out(
                &snap,
                Method::GetRenamePositions,
                &self.part_target(&snap.document, &located.part),
            )
            .run_last(|h| async move { h.handler.get_rename_positions(ctx, &cursor).await })
            .await;
        self.emit(Outbound::RenamePositionsResult(
            result.map(|positions| positions.into_global(&located.part)),
        ));
    }

    /// `onRenameBegin` / `onRenameCancel`: notify every matching handler, no reply.
    pub(crate) async fn rename_hook(self: Arc<Self>, method: Method) {
        let Some(snap) = self.snapshot() else {
            return;
        };
        let ctx = &snap.ctx;
        let target = self.document_target(&snap.document).ignoring_size();
        self.fan_out(&snap, method, &target)
            .run(|h| async move {
                match method {
                    Method::OnRenameBegin => h.handler.on_rename_begin(ctx).await,
                    _ => h.handler.on_rename_cancel(ctx).await,
                }
            })
            .await;
    }

    pub(crate) async fn commit_rename(self: Arc<Self>, old_id: String, new_name: String, is_generated: bool) {
        let Some(snap) = self.snapshot() else {
            return;
        };
        let ctx = &snap.ctx;
        let (old_id, new_name) = (old_id.as_str(), new_name.as_str());
        let target = self.document_target(&snap.document).ignoring_size();
        let err = self
            .fan_out(&snap, Method::CommitRename, &target)
            .run(|h| async move {
                let outcome = h.handler.commit_rename(ctx, old_id, new_name, is_generated).await;
                Ok::<_, HandlerError>(outcome.err().map(|err| err.to_string()))
            })
            .await
            .into_iter()
            .flatten()
            .next();
        self.emit(Outbound::CommitRenameResult { err });
    }

    pub(crate) async fn inspect(self: Arc<Self>, pos: Pos) {
        let Some(snap) = self.snapshot() else {
            return;
        };
        let Some(located) = self.locate(&snap, pos).await else {
            return;
        };
        let (ctx, cursor) = (&snap.ctx, located.cursor());
        let result = self
            .fan_out(
                &snap,
                Method::GetInspectExpression,
                &self.part_target(&snap.document, &located.part),
            )
            .run_last(|h| async move { h.handler.get_inspect_expression(ctx, &cursor).await })
            .await;
        self.emit(Outbound::InspectResult(result.map(|mut expr| {
            expr.pos = located.part.range_to_global(expr.pos);
            expr
        })));
    }
}

/// Replace `part`'s region in `document` with `text`.
fn splice(document: &mut Document, part: &Part, text: String) -> Result<(), EditError> {
    document.apply(&EditOp::Remove { range: part.region })?;
    document.apply(&EditOp::Insert {
        start: part.region.start,
        text,
    })
}
