//! Parent to child edge geometry and redraw coalescing.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::geom::Point;
use crate::history::Visibility;
use crate::node::{Node, NodeHandle};
use crate::store::NodeStore;

/// Orthogonal elbow in canvas space: parent right-middle, across to the
/// horizontal midpoint, down (or up) to the child's row, then into the
/// child's left-middle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connector {
    pub parent: NodeHandle,
    pub child: NodeHandle,
    pub points: [Point; 4],
}

impl Connector {
    pub fn between(parent: &Node, child: &Node) -> Self {
        let start = Point::new(
            parent.right() as f32,
            parent.position.top as f32 + parent.size.height as f32 / 2.0,
        );
        let end = Point::new(
            child.position.left as f32,
            child.position.top as f32 + child.size.height as f32 / 2.0,
        );
        let mid_x = (start.x + end.x) / 2.0;
        Self {
            parent: parent.handle,
            child: child.handle,
            points: [start, Point::new(mid_x, start.y), Point::new(mid_x, end.y), end],
        }
    }
}

/// One connector per visible non-root node whose parent is also visible.
pub fn compute_connectors(store: &NodeStore, vis: &Visibility) -> Vec<Connector> {
    store
        .iter()
        .filter(|n| vis.is_visible(n.handle))
        .filter_map(|child| {
            let parent = store.get(child.parent?)?;
            vis.is_visible(parent.handle).then(|| Connector::between(parent, child))
        })
        .collect()
}

/// Dirty flag set by any geometry change and consumed once per render tick,
/// so bursts of drag/zoom events cost a single redraw.
#[derive(Debug)]
pub struct RedrawGate {
    needs_redraw: AtomicBool,
}

impl Default for RedrawGate {
    fn default() -> Self {
        Self { needs_redraw: AtomicBool::new(true) }
    }
}

impl RedrawGate {
    pub fn request(&self) {
        self.needs_redraw.store(true, Ordering::Relaxed);
    }

    pub fn take(&self) -> bool {
        self.needs_redraw.swap(false, Ordering::Relaxed)
    }
}
