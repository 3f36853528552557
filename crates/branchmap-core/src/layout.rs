//! Recursive, non-overlapping positioning of node boxes.
//!
//! Children sit one column to the right of their parent. The first child is
//! level with the parent; each later sibling starts `sibling_gap` below the
//! previous sibling's subtree max-bottom. Moving a child always moves its
//! whole subtree, so relative placement inside a subtree survives restacks.

use serde::{Deserialize, Serialize};

use crate::geom::Position;
use crate::node::{NodeHandle, DEFAULT_NODE_WIDTH};
use crate::store::NodeStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub sibling_gap: i32,
    pub column_gap: i32,
    pub node_width: i32,
    pub root_position: Position,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            sibling_gap: 20,
            column_gap: 100,
            node_width: DEFAULT_NODE_WIDTH,
            root_position: Position::new(100, 150),
        }
    }
}

/// Lowest extent of `h` and its visible descendants. A collapsed node only
/// contributes its own box.
pub fn subtree_max_bottom(store: &NodeStore, h: NodeHandle) -> Option<i32> {
    store
        .visible_subtree(h)
        .filter_map(|id| store.get(id))
        .map(|n| n.bottom())
        .max()
}

/// Where a new last child of `parent` goes: first child level with the
/// parent, otherwise below the deepest existing sibling subtree.
pub fn insertion_position(store: &NodeStore, parent: NodeHandle, cfg: &LayoutConfig) -> Option<Position> {
    let p = store.get(parent)?;
    let left = p.right() + cfg.column_gap;
    let top = store
        .children(parent)
        .iter()
        .filter_map(|c| subtree_max_bottom(store, *c))
        .max()
        .map_or(p.position.top, |bottom| bottom + cfg.sibling_gap);
    Some(Position::new(left, top))
}

/// Restacks the direct children of `parent`, moving each child's subtree as a
/// unit. Missing references are skipped.
pub fn restack_children(store: &mut NodeStore, parent: NodeHandle, cfg: &LayoutConfig) {
    let Some(p) = store.get(parent) else {
        return;
    };
    let anchor_top = p.position.top;
    let left = p.right() + cfg.column_gap;
    let kids = store.children(parent).to_vec();

    let mut prev_bottom: Option<i32> = None;
    for kid in kids {
        let Some(node) = store.get(kid) else {
            continue;
        };
        let top = prev_bottom.map_or(anchor_top, |b| b + cfg.sibling_gap);
        let dx = left - node.position.left;
        let dy = top - node.position.top;
        if dx != 0 || dy != 0 {
            shift_subtree(store, kid, dx, dy);
        }
        prev_bottom = subtree_max_bottom(store, kid).or(prev_bottom);
    }
}

fn shift_subtree(store: &mut NodeStore, h: NodeHandle, dx: i32, dy: i32) {
    let ids: Vec<NodeHandle> = store.subtree(h).collect();
    for id in ids {
        if let Some(n) = store.get_mut(id) {
            n.position.left += dx;
            n.position.top += dy;
        }
    }
}

/// Top-level pass: stacks the root's direct children (one per branch) in
/// ordinal order, anchored at the root's top.
pub fn stack_branches(store: &mut NodeStore, cfg: &LayoutConfig) {
    let Some(root) = store.root() else {
        return;
    };
    restack_children(store, root, cfg);
}

/// Full-tree reflow: every internal node is restacked bottom-up, then the
/// branches are stacked.
pub fn reflow_full(store: &mut NodeStore, cfg: &LayoutConfig) {
    let Some(root) = store.root() else {
        return;
    };
    let order: Vec<NodeHandle> = store.subtree(root).collect();
    // Reverse pre-order visits every node after all of its descendants.
    for h in order.iter().rev() {
        if *h != root && store.has_children(*h) {
            restack_children(store, *h, cfg);
        }
    }
    stack_branches(store, cfg);
    tracing::debug!(nodes = order.len(), "full reflow");
}

/// Focused-view reflow: the same stacking rule restricted to the visible
/// subtree under `focus`, which keeps its own position as the anchor. The
/// whole visible subtree is restacked bottom-up, not only the focus node's
/// direct children.
pub fn reflow_focused(store: &mut NodeStore, focus: NodeHandle, cfg: &LayoutConfig) {
    let order: Vec<NodeHandle> = store.visible_subtree(focus).collect();
    for h in order.iter().rev() {
        let expanded = store.get(*h).map(|n| !n.collapsed).unwrap_or(false);
        if expanded && store.has_children(*h) {
            restack_children(store, *h, cfg);
        }
    }
    tracing::debug!(nodes = order.len(), "focused reflow");
}

/// Local reflow after a single node changed: restack along its ancestor chain
/// (stopping below the absolute root), then one top-level pass.
pub fn reflow_local(store: &mut NodeStore, changed: NodeHandle, cfg: &LayoutConfig) {
    let root = store.root();
    let chain: Vec<NodeHandle> = store
        .ancestors(changed)
        .take_while(|a| Some(*a) != root)
        .collect();
    for parent in &chain {
        restack_children(store, *parent, cfg);
    }
    stack_branches(store, cfg);
}
