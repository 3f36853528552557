//! One open map: node graph, layout, camera, focus history and the branch
//! creation flow, driven synchronously by the host's input and by async
//! generation replies fed back through [`MapSession::complete`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::attachment::Attachment;
use crate::branch::{BranchFlow, GenerationTicket, PendingRequests, PopupDraft, RequestKind, SelectionRegion};
use crate::connectors::{compute_connectors, Connector, RedrawGate};
use crate::error::MapError;
use crate::format::{format_reply, FormattedText};
use crate::geom::{Point, Position, Size};
use crate::history::{breadcrumbs, Breadcrumb, HistoryStack, Visibility};
use crate::layout::{self, LayoutConfig};
use crate::node::{BranchPhase, Node, NodeHandle, Response};
use crate::prompt;
use crate::protocol::{GenerateReply, GenerateRequest, DEFAULT_MODEL};
use crate::store::NodeStore;
use crate::viewport::{DragOutcome, HitRegion, Transform, Viewport, ViewportConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub layout: LayoutConfig,
    pub viewport: ViewportConfig,
    pub model: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            viewport: ViewportConfig::default(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Everything a renderer needs for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub handle: NodeHandle,
    pub label: String,
    pub position: Position,
    pub size: Size,
    pub collapsed: bool,
    pub has_children: bool,
    pub is_root: bool,
    pub is_view_root: bool,
    pub prompt_title: &'static str,
    pub prompt_text: String,
    pub response: Response,
    /// Formatted reply; placeholders and errors are a single plain line.
    pub body: FormattedText,
    /// Full attachment so the renderer can decode an image preview.
    pub attachment: Option<Attachment>,
    pub phase: BranchPhase,
    pub can_undo: bool,
}

/// Declarative frame state. Built fresh on demand; never mutated by the
/// renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSnapshot {
    pub transform: Transform,
    pub nodes: Vec<NodeView>,
    pub connectors: Vec<Connector>,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub flow: BranchPhase,
    pub popup: Option<PopupDraft>,
}

#[derive(Debug)]
pub struct MapSession {
    cfg: MapConfig,
    store: NodeStore,
    history: HistoryStack,
    viewport: Viewport,
    flow: BranchFlow,
    pending: PendingRequests,
    redraw: RedrawGate,
}

impl MapSession {
    pub fn new(cfg: MapConfig) -> Self {
        let viewport = Viewport::new(cfg.viewport);
        Self {
            cfg,
            store: NodeStore::new(),
            history: HistoryStack::new(),
            viewport,
            flow: BranchFlow::default(),
            pending: PendingRequests::default(),
            redraw: RedrawGate::default(),
        }
    }

    pub fn config(&self) -> &MapConfig {
        &self.cfg
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    pub fn node(&self, h: NodeHandle) -> Option<&Node> {
        self.store.get(h)
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn flow(&self) -> &BranchFlow {
        &self.flow
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_started(&self) -> bool {
        self.store.root().is_some()
    }

    pub fn model(&self) -> &str {
        &self.cfg.model
    }

    /// Applies to requests issued from now on.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.cfg.model = model.into();
    }

    // ---- lifecycle -------------------------------------------------------

    /// Creates the root node and issues its generation request.
    pub fn start(&mut self, prompt_text: &str, attachment: Option<Attachment>) -> Result<GenerationTicket, MapError> {
        let prompt_text = prompt_text.trim();
        if prompt_text.is_empty() {
            return Err(MapError::EmptyPrompt);
        }
        let root = self.store.create_root(prompt_text, attachment.clone())?;
        if let Some(n) = self.store.get_mut(root) {
            n.position = self.cfg.layout.root_position;
            n.phase = BranchPhase::AwaitingResponse;
        }
        self.refresh_estimate(root);
        self.history.reset(root);
        self.viewport.reset_to_anchor(Some((self.cfg.layout.root_position, true)));
        self.redraw.request();
        tracing::info!(node = %root, "map started");

        let context = prompt::compose(prompt::START_CONTEXT, prompt_text);
        Ok(self.issue(root, RequestKind::Root, context, attachment))
    }

    // ---- selection flow --------------------------------------------------

    pub fn selection_changed(&mut self, node: NodeHandle, region: SelectionRegion, text: &str) {
        let node_ok = self.store.contains(node);
        let region = if node_ok { region } else { SelectionRegion::Outside };
        let before = self.flow.phase();
        self.flow.select(node, region, text);
        if before != self.flow.phase() {
            self.redraw.request();
        }
    }

    /// Returns whether the popup opened.
    pub fn selection_released(&mut self) -> bool {
        let opened = self.flow.release();
        if opened {
            self.redraw.request();
        }
        opened
    }

    pub fn dismiss_popup(&mut self) {
        if self.flow != BranchFlow::Idle {
            self.flow.dismiss();
            self.redraw.request();
        }
    }

    pub fn popup(&self) -> Option<&PopupDraft> {
        self.flow.draft()
    }

    pub fn set_popup_prompt(&mut self, text: &str) {
        if let Some(d) = self.flow.draft_mut() {
            d.prompt = text.to_string();
        }
    }

    pub fn set_popup_attachment(&mut self, attachment: Option<Attachment>) {
        if let Some(d) = self.flow.draft_mut() {
            d.attachment = attachment;
        }
    }

    /// Confirms the popup. `Ok(None)` when no popup was open.
    pub fn submit_popup(&mut self) -> Result<Option<GenerationTicket>, MapError> {
        let Some(draft) = self.flow.take_draft() else {
            return Ok(None);
        };
        self.redraw.request();
        self.create_branch(draft.parent, &draft.excerpt, Some(&draft.prompt), draft.attachment)
            .map(Some)
    }

    // ---- branch creation -------------------------------------------------

    /// Allocates a child of `parent` spawned from `excerpt`, places it as the
    /// parent's last child, reflows, starts the camera towards it and returns
    /// the request to send.
    pub fn create_branch(
        &mut self,
        parent: NodeHandle,
        excerpt: &str,
        prompt_text: Option<&str>,
        attachment: Option<Attachment>,
    ) -> Result<GenerationTicket, MapError> {
        let parent_node = self.store.get(parent).ok_or(MapError::UnknownNode(parent))?;
        let parent_text = parent_node.content.response.plain_text();
        let parent_collapsed = parent_node.collapsed;
        if parent_collapsed {
            // A new child must be visible; expanding first keeps the
            // insertion rule based on the visible subtree.
            if let Some(p) = self.store.get_mut(parent) {
                p.collapsed = false;
            }
            self.reflow_around(parent);
        }

        let position = layout::insertion_position(&self.store, parent, &self.cfg.layout)
            .ok_or(MapError::UnknownNode(parent))?;
        let child = self.store.create_child(parent, excerpt, prompt_text, attachment.clone())?;
        if let Some(n) = self.store.get_mut(child) {
            n.position = position;
            n.phase = BranchPhase::AwaitingResponse;
        }
        self.refresh_estimate(child);
        self.reflow_around(child);
        self.pan_to(child);
        self.redraw.request();
        tracing::info!(node = %child, parent = %parent, "branch created");

        let context = prompt::branch_context(&parent_text, excerpt);
        let context = prompt::compose(&context, prompt::effective_prompt(prompt_text));
        Ok(self.issue(child, RequestKind::Branch, context, attachment))
    }

    /// Follow-up typed into a node's inline box: the whole response is the
    /// excerpt. Blank input does nothing.
    pub fn quick_follow_up(&mut self, node: NodeHandle, prompt_text: &str) -> Result<Option<GenerationTicket>, MapError> {
        let prompt_text = prompt_text.trim();
        if prompt_text.is_empty() {
            return Ok(None);
        }
        let full = self
            .store
            .get(node)
            .ok_or(MapError::UnknownNode(node))?
            .content
            .response
            .plain_text();
        self.create_branch(node, &full, Some(prompt_text), None).map(Some)
    }

    /// Replaces the node's prompt and regenerates its response in place. The
    /// prior content is kept for a single undo.
    pub fn reprompt(&mut self, node: NodeHandle, prompt_text: &str) -> Result<GenerationTicket, MapError> {
        let prompt_text = prompt_text.trim();
        if prompt_text.is_empty() {
            return Err(MapError::EmptyPrompt);
        }
        let n = self.store.get(node).ok_or(MapError::UnknownNode(node))?;
        let context = match n.parent.and_then(|p| self.store.get(p)) {
            Some(parent) => prompt::branch_context(&parent.content.response.plain_text(), &n.context_text),
            None => n.context_text.clone(),
        };

        // A newer request on the same node supersedes the older one.
        self.pending.cancel_node(node);
        if let Some(n) = self.store.get_mut(node) {
            if !n.content.response.is_placeholder() {
                n.previous_state = Some(n.content.clone());
            }
            n.content.prompt_text = prompt_text.to_string();
            n.content.response = Response::Regenerating;
            n.phase = BranchPhase::AwaitingResponse;
        }
        self.refresh_estimate(node);
        self.reflow_around(node);
        self.redraw.request();
        tracing::info!(%node, "re-prompt");

        Ok(self.issue(node, RequestKind::Reprompt, prompt::compose(&context, prompt_text), None))
    }

    /// Restores the content captured by the last re-prompt. Cancels a
    /// re-prompt still in flight.
    pub fn undo(&mut self, node: NodeHandle) -> Result<(), MapError> {
        let n = self.store.get_mut(node).ok_or(MapError::UnknownNode(node))?;
        let prev = n.previous_state.take().ok_or(MapError::NothingToUndo(node))?;
        n.phase = match prev.response {
            Response::Failed(_) => BranchPhase::Failed,
            _ => BranchPhase::Complete,
        };
        n.content = prev;
        self.pending.cancel_node(node);
        self.refresh_estimate(node);
        self.reflow_around(node);
        self.redraw.request();
        Ok(())
    }

    // ---- async completion ------------------------------------------------

    /// Applies a generation reply. Returns false (and changes nothing) when
    /// the request is unknown or its node has been removed.
    pub fn complete(&mut self, request_id: u64, reply: GenerateReply) -> bool {
        let Some(req) = self.pending.take(request_id) else {
            tracing::debug!(request_id, "dropping stale completion");
            return false;
        };
        tracing::debug!(request_id, node = %req.node, kind = ?req.kind, "generation finished");
        self.apply_reply(req.node, reply)
    }

    /// Fails every awaiting node, e.g. after the service went away.
    pub fn fail_all_pending(&mut self, reason: &str) -> usize {
        let drained = self.pending.drain();
        let mut failed = 0;
        for (_, req) in drained {
            if self.apply_reply(req.node, GenerateReply::Error(reason.to_string())) {
                failed += 1;
            }
        }
        failed
    }

    fn apply_reply(&mut self, node: NodeHandle, reply: GenerateReply) -> bool {
        let Some(n) = self.store.get_mut(node) else {
            tracing::debug!(%node, "completion for removed node");
            return false;
        };
        match reply {
            GenerateReply::Text(text) => {
                n.content.response = Response::Ready(text);
                n.phase = BranchPhase::Complete;
            }
            GenerateReply::Error(msg) => {
                tracing::warn!(%node, error = %msg, "generation failed");
                n.content.response = Response::Failed(msg);
                n.phase = BranchPhase::Failed;
            }
        }
        self.refresh_estimate(node);
        self.reflow_around(node);
        self.redraw.request();
        true
    }

    // ---- structure and navigation ---------------------------------------

    /// Flips the collapsed flag. Returns the new state.
    pub fn toggle_collapse(&mut self, node: NodeHandle) -> Result<bool, MapError> {
        let n = self.store.get_mut(node).ok_or(MapError::UnknownNode(node))?;
        n.collapsed = !n.collapsed;
        let collapsed = n.collapsed;
        self.reflow_around(node);
        self.redraw.request();
        Ok(collapsed)
    }

    /// Drills into `node`, making it the view-root.
    pub fn focus(&mut self, node: NodeHandle) -> Result<(), MapError> {
        if !self.store.contains(node) {
            return Err(MapError::UnknownNode(node));
        }
        if self.history.push(node) {
            self.render_view();
        }
        Ok(())
    }

    /// Breadcrumb click. Returns whether the view changed.
    pub fn navigate_to(&mut self, node: NodeHandle) -> bool {
        let changed = self.history.truncate_to(node);
        if changed {
            self.render_view();
        }
        changed
    }

    /// Deletes `node` and its whole subtree, dropping any requests, popup or
    /// history entries that referred to them. Returns the number of nodes
    /// removed.
    pub fn remove(&mut self, node: NodeHandle) -> Result<usize, MapError> {
        if !self.store.contains(node) {
            return Err(MapError::UnknownNode(node));
        }
        let parent = self.store.parent(node);
        let removed: HashSet<NodeHandle> = self.store.remove_subtree(node).into_iter().collect();
        let cancelled = self.pending.cancel_removed(&removed);
        self.flow.forget(&removed);
        tracing::info!(%node, count = removed.len(), cancelled, "removed subtree");

        if self.history.prune(&removed) {
            self.render_view();
        } else if let Some(p) = parent {
            self.reflow_around(p);
        }
        self.redraw.request();
        Ok(removed.len())
    }

    /// Measured box size from the renderer. Reflows only on change.
    pub fn report_size(&mut self, node: NodeHandle, size: Size) -> bool {
        let Some(n) = self.store.get_mut(node) else {
            return false;
        };
        if n.size == size {
            return false;
        }
        n.size = size;
        self.reflow_around(node);
        self.redraw.request();
        true
    }

    // ---- camera ----------------------------------------------------------

    pub fn set_screen_size(&mut self, width: f32, height: f32) {
        self.viewport.set_screen_size(width, height);
    }

    pub fn press(&mut self, pos: Point, region: HitRegion) -> bool {
        self.viewport.press(pos, region)
    }

    pub fn drag_to(&mut self, pos: Point) {
        if self.viewport.drag_to(pos) {
            self.redraw.request();
        }
    }

    /// A click on bare canvas also closes the popup.
    pub fn release(&mut self) -> DragOutcome {
        let outcome = self.viewport.release();
        if outcome == DragOutcome::Click {
            self.dismiss_popup();
        }
        outcome
    }

    pub fn wheel(&mut self, cursor: Point, delta: Point, zoom_modifier: bool) {
        if self.viewport.wheel(cursor, delta, zoom_modifier) {
            self.redraw.request();
        }
    }

    pub fn pan_to(&mut self, node: NodeHandle) {
        if let Some(n) = self.store.get(node) {
            self.viewport.pan_to(n.position, n.size);
        }
    }

    pub fn tick(&mut self, dt: Duration) {
        if self.viewport.tick(dt) {
            self.redraw.request();
        }
    }

    /// Consumes the redraw flag.
    pub fn take_redraw(&self) -> bool {
        self.redraw.take()
    }

    // ---- output ----------------------------------------------------------

    pub fn visibility(&self) -> Visibility {
        Visibility::compute(&self.store, self.history.current())
    }

    pub fn snapshot(&self) -> MapSnapshot {
        let vis = self.visibility();
        let view_root = self.history.current();
        let nodes = self
            .store
            .iter()
            .filter(|n| vis.is_visible(n.handle))
            .map(|n| NodeView {
                handle: n.handle,
                label: n.label.clone(),
                position: n.position,
                size: n.size,
                collapsed: n.collapsed,
                has_children: self.store.has_children(n.handle),
                is_root: n.is_root(),
                is_view_root: Some(n.handle) == view_root,
                prompt_title: n.content.prompt_kind.title(),
                prompt_text: n.content.prompt_text.clone(),
                response: n.content.response.clone(),
                body: match &n.content.response {
                    Response::Ready(text) => format_reply(text),
                    other => format_reply(&other.display_text()),
                },
                attachment: n.content.attachment.clone(),
                phase: n.phase,
                can_undo: n.can_undo(),
            })
            .collect();
        MapSnapshot {
            transform: self.viewport.transform(),
            nodes,
            connectors: compute_connectors(&self.store, &vis),
            breadcrumbs: breadcrumbs(&self.history, &self.store),
            flow: self.flow.phase(),
            popup: self.flow.draft().cloned(),
        }
    }

    // ---- internals -------------------------------------------------------

    fn issue(&mut self, node: NodeHandle, kind: RequestKind, prompt_context: String, attachment: Option<Attachment>) -> GenerationTicket {
        let request_id = self.pending.allocate(node, kind);
        GenerationTicket {
            request_id,
            node,
            request: GenerateRequest {
                model: self.cfg.model.clone(),
                prompt_context,
                attachment,
            },
        }
    }

    fn refresh_estimate(&mut self, h: NodeHandle) {
        let width = self.cfg.layout.node_width;
        if let Some(n) = self.store.get_mut(h) {
            n.size = n.content.estimated_size(width);
        }
    }

    fn is_root_view(&self) -> bool {
        self.history.current().is_none() || self.history.current() == self.store.root()
    }

    /// Reflow after `node` changed, scoped by the current view.
    fn reflow_around(&mut self, node: NodeHandle) {
        match self.history.current() {
            Some(view_root) if !self.is_root_view() => {
                layout::reflow_focused(&mut self.store, view_root, &self.cfg.layout);
            }
            _ => {
                if self.store.get(node).is_some_and(|n| !n.collapsed) {
                    layout::restack_children(&mut self.store, node, &self.cfg.layout);
                }
                layout::reflow_local(&mut self.store, node, &self.cfg.layout);
            }
        }
    }

    /// Re-lays out and re-anchors the camera after the view-root changed.
    fn render_view(&mut self) {
        let Some(view_root) = self.history.current() else {
            self.viewport.reset_to_anchor(None);
            self.redraw.request();
            return;
        };
        if self.is_root_view() {
            layout::reflow_full(&mut self.store, &self.cfg.layout);
        } else {
            layout::reflow_focused(&mut self.store, view_root, &self.cfg.layout);
        }
        let anchor = self.store.get(view_root).map(|n| (n.position, n.is_root()));
        self.viewport.reset_to_anchor(anchor);
        self.redraw.request();
    }
}

impl Default for MapSession {
    fn default() -> Self {
        Self::new(MapConfig::default())
    }
}
