use std::collections::HashMap;

use crate::attachment::Attachment;
use crate::error::MapError;
use crate::geom::Position;
use crate::node::{BranchPhase, Node, NodeContent, NodeHandle, PromptKind, DEFAULT_NODE_WIDTH};
use crate::prompt::START_CONTEXT;

const ROOT_LABEL: &str = "A";

/// Owns the node tree. Nodes live in an append-only arena; a parent → children
/// index is maintained on every insert/remove so child lookups never scan.
#[derive(Debug, Clone, Default)]
pub struct NodeStore {
    slots: Vec<Option<Node>>,
    children: HashMap<NodeHandle, Vec<NodeHandle>>,
    root: Option<NodeHandle>,
    live: usize,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<NodeHandle> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn contains(&self, h: NodeHandle) -> bool {
        self.get(h).is_some()
    }

    pub fn get(&self, h: NodeHandle) -> Option<&Node> {
        self.slots.get(h.0 as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, h: NodeHandle) -> Option<&mut Node> {
        self.slots.get_mut(h.0 as usize).and_then(Option::as_mut)
    }

    pub fn parent(&self, h: NodeHandle) -> Option<NodeHandle> {
        self.get(h).and_then(|n| n.parent)
    }

    /// Children in ascending ordinal order (allocation order).
    pub fn children(&self, h: NodeHandle) -> &[NodeHandle] {
        self.children.get(&h).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_children(&self, h: NodeHandle) -> bool {
        !self.children(h).is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn create_root(
        &mut self,
        prompt_text: &str,
        attachment: Option<Attachment>,
    ) -> Result<NodeHandle, MapError> {
        if self.root.is_some() {
            return Err(MapError::RootExists);
        }
        let handle = self.next_handle();
        let content = NodeContent::new(prompt_text, PromptKind::Start).with_attachment(attachment);
        let size = content.estimated_size(DEFAULT_NODE_WIDTH);
        self.slots.push(Some(Node {
            handle,
            parent: None,
            branch: handle,
            ordinal: 0,
            child_counter: 0,
            label: ROOT_LABEL.to_string(),
            position: Position::default(),
            size,
            collapsed: false,
            content,
            context_text: START_CONTEXT.to_string(),
            previous_state: None,
            phase: BranchPhase::Submitting,
        }));
        self.root = Some(handle);
        self.live += 1;
        tracing::debug!(node = %handle, "created root");
        Ok(handle)
    }

    /// Allocates the next child of `parent`. A non-empty `prompt_text` makes a
    /// follow-up node; otherwise the highlighted text itself is the prompt.
    pub fn create_child(
        &mut self,
        parent: NodeHandle,
        highlighted_text: &str,
        prompt_text: Option<&str>,
        attachment: Option<Attachment>,
    ) -> Result<NodeHandle, MapError> {
        let handle = self.next_handle();
        let p = self.get_mut(parent).ok_or(MapError::UnknownNode(parent))?;
        p.child_counter += 1;
        let ordinal = p.child_counter;
        let label = if p.is_root() {
            format!("{}{}", p.label, ordinal)
        } else {
            format!("{}-{}", p.label, ordinal)
        };
        let branch = if p.is_root() { handle } else { p.branch };

        let content = match prompt_text.map(str::trim).filter(|t| !t.is_empty()) {
            Some(prompt) => NodeContent::new(prompt, PromptKind::FollowUp),
            None => NodeContent::new(highlighted_text, PromptKind::Highlighted),
        }
        .with_attachment(attachment);
        let size = content.estimated_size(DEFAULT_NODE_WIDTH);

        self.slots.push(Some(Node {
            handle,
            parent: Some(parent),
            branch,
            ordinal,
            child_counter: 0,
            label,
            position: Position::default(),
            size,
            collapsed: false,
            content,
            context_text: highlighted_text.to_string(),
            previous_state: None,
            phase: BranchPhase::Submitting,
        }));
        // Ordinals only grow, so appending keeps the list sorted.
        self.children.entry(parent).or_default().push(handle);
        self.live += 1;
        Ok(handle)
    }

    /// Removes `h` and every descendant. Returns the removed handles in
    /// pre-order; empty if `h` does not exist.
    pub fn remove_subtree(&mut self, h: NodeHandle) -> Vec<NodeHandle> {
        let removed: Vec<NodeHandle> = self.subtree(h).collect();
        if removed.is_empty() {
            return removed;
        }
        if let Some(parent) = self.parent(h) {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.retain(|s| *s != h);
            }
        }
        for id in &removed {
            self.children.remove(id);
            if let Some(slot) = self.slots.get_mut(id.0 as usize) {
                *slot = None;
            }
        }
        if self.root == Some(h) {
            self.root = None;
        }
        self.live -= removed.len();
        tracing::debug!(node = %h, count = removed.len(), "removed subtree");
        removed
    }

    /// Lazy pre-order walk over `h` and all its descendants.
    pub fn subtree(&self, h: NodeHandle) -> Subtree<'_> {
        Subtree::new(self, h, false)
    }

    /// Like [`NodeStore::subtree`] but does not descend below collapsed nodes
    /// (the collapsed node itself is still yielded).
    pub fn visible_subtree(&self, h: NodeHandle) -> Subtree<'_> {
        Subtree::new(self, h, true)
    }

    /// Parent chain of `h`, nearest first, excluding `h`.
    pub fn ancestors(&self, h: NodeHandle) -> impl Iterator<Item = NodeHandle> + '_ {
        std::iter::successors(self.parent(h), move |p| self.parent(*p))
    }

    pub fn is_in_subtree(&self, h: NodeHandle, ancestor: NodeHandle) -> bool {
        self.contains(h) && (h == ancestor || self.ancestors(h).any(|a| a == ancestor))
    }

    fn next_handle(&self) -> NodeHandle {
        NodeHandle(self.slots.len() as u32)
    }
}

/// Finite, restartable (via `Clone`) pre-order sequence.
#[derive(Clone)]
pub struct Subtree<'a> {
    store: &'a NodeStore,
    stack: Vec<NodeHandle>,
    prune_collapsed: bool,
}

impl<'a> Subtree<'a> {
    fn new(store: &'a NodeStore, start: NodeHandle, prune_collapsed: bool) -> Self {
        let stack = if store.contains(start) {
            vec![start]
        } else {
            Vec::new()
        };
        Self {
            store,
            stack,
            prune_collapsed,
        }
    }
}

impl Iterator for Subtree<'_> {
    type Item = NodeHandle;

    fn next(&mut self) -> Option<NodeHandle> {
        let h = self.stack.pop()?;
        let collapsed = self.store.get(h).map(|n| n.collapsed).unwrap_or(false);
        if !(self.prune_collapsed && collapsed) {
            self.stack
                .extend(self.store.children(h).iter().rev().copied());
        }
        Some(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(store: &NodeStore, hs: impl IntoIterator<Item = NodeHandle>) -> Vec<String> {
        hs.into_iter()
            .map(|h| store.get(h).expect("live node").label.clone())
            .collect()
    }

    #[test]
    fn ids_encode_lineage_and_branches() {
        let mut s = NodeStore::new();
        let a = s.create_root("Plan a trip to Japan", None).expect("root");
        let a1 = s.create_child(a, "Tokyo", None, None).expect("a1");
        let a2 = s.create_child(a, "Kyoto", Some("Where should I stay?"), None).expect("a2");
        let a21 = s.create_child(a2, "ryokan", None, None).expect("a2-1");

        assert_eq!(labels(&s, [a, a1, a2, a21]), ["A", "A1", "A2", "A2-1"]);
        assert_eq!(s.get(a1).unwrap().branch, a1);
        assert_eq!(s.get(a21).unwrap().branch, a2);
        assert_eq!(s.get(a2).unwrap().content.prompt_kind, PromptKind::FollowUp);
        assert_eq!(s.get(a2).unwrap().context_text, "Kyoto");
        assert_eq!(s.get(a1).unwrap().content.prompt_text, "Tokyo");
        assert!(matches!(s.create_root("again", None), Err(MapError::RootExists)));
    }

    #[test]
    fn children_are_in_numeric_order() {
        let mut s = NodeStore::new();
        let a = s.create_root("root", None).unwrap();
        for i in 0..11 {
            s.create_child(a, &format!("c{i}"), None, None).unwrap();
        }
        let ordinals: Vec<u32> = s
            .children(a)
            .iter()
            .map(|h| s.get(*h).unwrap().ordinal)
            .collect();
        assert_eq!(ordinals, (1..=11).collect::<Vec<_>>());
        assert_eq!(s.get(*s.children(a).last().unwrap()).unwrap().label, "A11");
    }

    #[test]
    fn subtree_is_preorder_and_restartable() {
        let mut s = NodeStore::new();
        let a = s.create_root("root", None).unwrap();
        let a1 = s.create_child(a, "x", None, None).unwrap();
        let a11 = s.create_child(a1, "y", None, None).unwrap();
        let a2 = s.create_child(a, "z", None, None).unwrap();

        let walk = s.subtree(a);
        let again = walk.clone();
        assert_eq!(walk.collect::<Vec<_>>(), vec![a, a1, a11, a2]);
        assert_eq!(again.count(), 4);

        s.get_mut(a1).unwrap().collapsed = true;
        assert_eq!(s.visible_subtree(a).collect::<Vec<_>>(), vec![a, a1, a2]);
    }

    #[test]
    fn remove_subtree_cascades_and_never_reuses_handles() {
        let mut s = NodeStore::new();
        let a = s.create_root("root", None).unwrap();
        let a1 = s.create_child(a, "x", None, None).unwrap();
        let a11 = s.create_child(a1, "y", None, None).unwrap();
        s.create_child(a11, "w", None, None).unwrap();
        let a2 = s.create_child(a, "z", None, None).unwrap();

        let removed = s.remove_subtree(a1);

        assert_eq!(removed.len(), 3);
        assert_eq!(s.len(), 2);
        assert!(!s.contains(a11));
        assert_eq!(s.children(a), &[a2]);
        let a3 = s.create_child(a, "v", None, None).unwrap();
        assert!(!removed.contains(&a3));
        assert_eq!(s.get(a3).unwrap().label, "A3");
        assert!(s.remove_subtree(a1).is_empty());
    }

    #[test]
    fn removing_root_empties_the_map() {
        let mut s = NodeStore::new();
        let a = s.create_root("root", None).unwrap();
        s.create_child(a, "x", None, None).unwrap();
        assert_eq!(s.remove_subtree(a).len(), 2);
        assert!(s.is_empty());
        assert_eq!(s.root(), None);
    }
}
