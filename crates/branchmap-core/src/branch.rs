//! Selection to popup flow and the table of in-flight generation requests.

use std::collections::{HashMap, HashSet};

use crate::attachment::Attachment;
use crate::node::{BranchPhase, NodeHandle};
use crate::protocol::GenerateRequest;

/// Where a text selection was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRegion {
    Response,
    Prompt,
    Outside,
}

/// The floating input shown after a selection is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupDraft {
    pub parent: NodeHandle,
    pub excerpt: String,
    pub prompt: String,
    pub attachment: Option<Attachment>,
}

/// Pre-submission part of branch creation. Anything after submit is tracked
/// per node (see [`BranchPhase`]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BranchFlow {
    #[default]
    Idle,
    Selecting {
        node: NodeHandle,
        excerpt: String,
    },
    PopupOpen(PopupDraft),
}

impl BranchFlow {
    /// Tracks the live selection. Empty text or a selection outside a
    /// response region aborts back to idle.
    pub fn select(&mut self, node: NodeHandle, region: SelectionRegion, text: &str) {
        let excerpt = text.trim();
        *self = if region == SelectionRegion::Response && !excerpt.is_empty() {
            BranchFlow::Selecting { node, excerpt: excerpt.to_string() }
        } else {
            BranchFlow::Idle
        };
    }

    /// Pointer released over a selection: opens the popup with an empty
    /// prompt. Returns whether the popup opened.
    pub fn release(&mut self) -> bool {
        match std::mem::take(self) {
            BranchFlow::Selecting { node, excerpt } => {
                *self = BranchFlow::PopupOpen(PopupDraft {
                    parent: node,
                    excerpt,
                    prompt: String::new(),
                    attachment: None,
                });
                true
            }
            other => {
                *self = other;
                false
            }
        }
    }

    pub fn dismiss(&mut self) {
        *self = BranchFlow::Idle;
    }

    pub fn draft(&self) -> Option<&PopupDraft> {
        match self {
            BranchFlow::PopupOpen(d) => Some(d),
            _ => None,
        }
    }

    pub fn draft_mut(&mut self) -> Option<&mut PopupDraft> {
        match self {
            BranchFlow::PopupOpen(d) => Some(d),
            _ => None,
        }
    }

    /// Closes the popup and hands out its contents for submission.
    pub fn take_draft(&mut self) -> Option<PopupDraft> {
        match std::mem::take(self) {
            BranchFlow::PopupOpen(d) => Some(d),
            other => {
                *self = other;
                None
            }
        }
    }

    /// Drops the flow if it refers to a removed node.
    pub fn forget(&mut self, removed: &HashSet<NodeHandle>) {
        let stale = match self {
            BranchFlow::Idle => false,
            BranchFlow::Selecting { node, .. } => removed.contains(node),
            BranchFlow::PopupOpen(d) => removed.contains(&d.parent),
        };
        if stale {
            *self = BranchFlow::Idle;
        }
    }

    pub fn phase(&self) -> BranchPhase {
        match self {
            BranchFlow::Idle => BranchPhase::Idle,
            BranchFlow::Selecting { .. } => BranchPhase::Selecting,
            BranchFlow::PopupOpen(_) => BranchPhase::PopupOpen,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Root,
    Branch,
    Reprompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    pub node: NodeHandle,
    pub kind: RequestKind,
}

/// In-flight generation requests keyed by request id. A completion whose id
/// is no longer here is stale and must be dropped.
#[derive(Debug, Default)]
pub struct PendingRequests {
    next_id: u64,
    by_id: HashMap<u64, PendingRequest>,
}

impl PendingRequests {
    pub fn allocate(&mut self, node: NodeHandle, kind: RequestKind) -> u64 {
        self.next_id += 1;
        self.by_id.insert(self.next_id, PendingRequest { node, kind });
        self.next_id
    }

    pub fn take(&mut self, request_id: u64) -> Option<PendingRequest> {
        self.by_id.remove(&request_id)
    }

    /// Forgets every request targeting `node`.
    pub fn cancel_node(&mut self, node: NodeHandle) -> usize {
        let before = self.by_id.len();
        self.by_id.retain(|_, p| p.node != node);
        before - self.by_id.len()
    }

    pub fn cancel_removed(&mut self, removed: &HashSet<NodeHandle>) -> usize {
        let before = self.by_id.len();
        self.by_id.retain(|_, p| !removed.contains(&p.node));
        before - self.by_id.len()
    }

    /// Empties the table, oldest request first.
    pub fn drain(&mut self) -> Vec<(u64, PendingRequest)> {
        let mut all: Vec<_> = self.by_id.drain().collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// What the host must send to the generation service. The reply comes back
/// through `MapSession::complete` with the same `request_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTicket {
    pub request_id: u64,
    pub node: NodeHandle,
    pub request: GenerateRequest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_selection_aborts() {
        let n = NodeHandle(0);
        let mut flow = BranchFlow::default();
        flow.select(n, SelectionRegion::Response, "   ");
        assert_eq!(flow, BranchFlow::Idle);
        flow.select(n, SelectionRegion::Prompt, "text");
        assert_eq!(flow, BranchFlow::Idle);
        assert!(!flow.release());

        flow.select(n, SelectionRegion::Response, " Lisbon ");
        assert_eq!(flow.phase(), BranchPhase::Selecting);
        flow.select(n, SelectionRegion::Outside, "");
        assert_eq!(flow.phase(), BranchPhase::Idle);
    }

    #[test]
    fn release_opens_popup_with_trimmed_excerpt() {
        let n = NodeHandle(3);
        let mut flow = BranchFlow::default();
        flow.select(n, SelectionRegion::Response, " Lisbon ");
        assert!(flow.release());
        assert!(!flow.release());
        flow.draft_mut().unwrap().prompt = "Where should I stay?".into();

        let draft = flow.take_draft().unwrap();
        assert_eq!(draft.parent, n);
        assert_eq!(draft.excerpt, "Lisbon");
        assert_eq!(flow, BranchFlow::Idle);
        assert!(flow.take_draft().is_none());
    }

    #[test]
    fn forget_drops_flow_on_removed_parent() {
        let n = NodeHandle(1);
        let mut flow = BranchFlow::default();
        flow.select(n, SelectionRegion::Response, "x");
        flow.release();
        flow.forget(&[NodeHandle(2)].into_iter().collect());
        assert_eq!(flow.phase(), BranchPhase::PopupOpen);
        flow.forget(&[n].into_iter().collect());
        assert_eq!(flow.phase(), BranchPhase::Idle);
    }

    #[test]
    fn pending_table_cancels_by_node() {
        let mut p = PendingRequests::default();
        let a = p.allocate(NodeHandle(1), RequestKind::Branch);
        let b = p.allocate(NodeHandle(2), RequestKind::Branch);
        let c = p.allocate(NodeHandle(2), RequestKind::Reprompt);
        assert!(a < b && b < c);
        assert_eq!(p.cancel_node(NodeHandle(2)), 2);
        assert!(p.take(b).is_none());
        assert_eq!(
            p.take(a),
            Some(PendingRequest { node: NodeHandle(1), kind: RequestKind::Branch })
        );
        assert!(p.is_empty());
    }
}
