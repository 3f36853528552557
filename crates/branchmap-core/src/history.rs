//! Drill-down focus history and the visibility set derived from it.

use std::collections::HashSet;

use crate::node::NodeHandle;
use crate::store::NodeStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStack {
    entries: Vec<NodeHandle>,
}

impl HistoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, root: NodeHandle) {
        self.entries.clear();
        self.entries.push(root);
    }

    /// Focus action. Focusing the current view-root again is a no-op.
    pub fn push(&mut self, h: NodeHandle) -> bool {
        if self.current() == Some(h) {
            return false;
        }
        self.entries.push(h);
        true
    }

    /// Breadcrumb click: drops everything after `h`. Returns false when `h`
    /// is not in the history or is already the last entry.
    pub fn truncate_to(&mut self, h: NodeHandle) -> bool {
        match self.entries.iter().position(|e| *e == h) {
            Some(i) if i + 1 < self.entries.len() => {
                self.entries.truncate(i + 1);
                true
            }
            _ => false,
        }
    }

    /// The current view-root.
    pub fn current(&self) -> Option<NodeHandle> {
        self.entries.last().copied()
    }

    pub fn entries(&self) -> &[NodeHandle] {
        &self.entries
    }

    /// Cuts the history at the first removed entry. Returns whether the
    /// view-root changed.
    pub fn prune(&mut self, removed: &HashSet<NodeHandle>) -> bool {
        match self.entries.iter().position(|e| removed.contains(e)) {
            Some(i) => {
                self.entries.truncate(i);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
    pub node: NodeHandle,
    pub label: String,
    /// The last crumb is the current view and cannot be clicked.
    pub interactive: bool,
}

pub fn breadcrumbs(history: &HistoryStack, store: &NodeStore) -> Vec<Breadcrumb> {
    let last = history.entries.len().saturating_sub(1);
    history
        .entries
        .iter()
        .enumerate()
        .filter_map(|(i, h)| {
            let node = store.get(*h)?;
            let label = if node.is_root() { "Root".to_string() } else { format!("Node {}", node.label) };
            Some(Breadcrumb { node: *h, label, interactive: i < last })
        })
        .collect()
}

/// Nodes currently shown: the view-root's subtree, not descending below
/// collapsed nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Visibility {
    visible: HashSet<NodeHandle>,
}

impl Visibility {
    pub fn compute(store: &NodeStore, view_root: Option<NodeHandle>) -> Self {
        let visible = match view_root {
            Some(v) => store.visible_subtree(v).collect(),
            None => HashSet::new(),
        };
        Self { visible }
    }

    pub fn is_visible(&self, h: NodeHandle) -> bool {
        self.visible.contains(&h)
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }
}
