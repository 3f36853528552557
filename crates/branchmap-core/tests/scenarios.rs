use std::time::Duration;

use branchmap_core::{
    BranchPhase, GenerateReply, MapConfig, MapSession, NodeHandle, Point, Position, SelectionRegion, Size,
};

fn session_with_root(reply: &str) -> (MapSession, NodeHandle) {
    let mut s = MapSession::new(MapConfig::default());
    s.set_screen_size(1280.0, 720.0);
    let t = s.start("Plan a week in Portugal", None).expect("start");
    assert!(s.complete(t.request_id, GenerateReply::Text(reply.into())));
    (s, t.node)
}

fn top(s: &MapSession, h: NodeHandle) -> i32 {
    s.node(h).expect("node").position.top
}

#[test]
fn highlight_and_follow_up_creates_first_child_beside_root() {
    let (mut s, root) = session_with_root("Start in Lisbon, then take the train to Porto.");
    assert_eq!(s.node(root).unwrap().position, Position::new(100, 150));

    s.selection_changed(root, SelectionRegion::Response, "Lisbon");
    assert!(s.selection_released());
    s.set_popup_prompt("Where should I stay?");
    let ticket = s.submit_popup().expect("submit").expect("ticket");

    let child = s.node(ticket.node).unwrap();
    assert_eq!(child.label, "A1");
    assert_eq!(child.parent, Some(root));
    assert_eq!(child.position.top, 150);
    assert_eq!(child.position.left, 100 + 400 + 100);
    assert!(ticket.request.prompt_context.contains("User Prompt: Where should I stay?"));
    assert!(s.viewport().is_animating());

    let (pos, size) = (child.position, child.size);
    s.tick(Duration::from_millis(600));
    let expected = s.viewport().focus_offset(pos, size);
    assert_eq!(s.viewport().transform().translate, expected);
    assert_eq!(expected.x, 100.0 - 600.0);
}

#[test]
fn collapsed_sibling_alone_sets_stacking_height() {
    let (mut s, root) = session_with_root("Lisbon or Porto");
    let a1 = s.create_branch(root, "Lisbon", None, None).unwrap().node;
    let a2 = s.create_branch(root, "Porto", None, None).unwrap().node;
    let a11 = s.create_branch(a1, "x", None, None).unwrap().node;
    s.report_size(a11, Size::new(400, 900));
    assert!(top(&s, a2) > 150 + 900);

    assert!(s.toggle_collapse(a1).unwrap());
    let a1_bottom = s.node(a1).unwrap().bottom();
    assert_eq!(top(&s, a2), a1_bottom + 20);
    assert!(s.snapshot().nodes.iter().any(|n| n.handle == a1 && n.collapsed));
    assert!(!s.snapshot().nodes.iter().any(|n| n.handle == a11));
}

#[test]
fn cascading_remove_closes_the_gap() {
    let (mut s, root) = session_with_root("three ideas");
    let a1 = s.create_branch(root, "one", None, None).unwrap().node;
    let a2 = s.create_branch(root, "two", None, None).unwrap().node;
    let a3 = s.create_branch(root, "three", None, None).unwrap().node;
    let mut last = a2;
    for _ in 0..3 {
        last = s.create_branch(last, "deeper", None, None).unwrap().node;
    }
    let before = s.store().len();

    assert_eq!(s.remove(a2).unwrap(), 4);
    assert_eq!(s.store().len(), before - 4);
    assert_eq!(top(&s, a3), s.node(a1).unwrap().bottom() + 20);
    assert_eq!(s.snapshot().connectors.len(), 2);
}

#[test]
fn completion_for_removed_node_is_dropped() {
    let (mut s, root) = session_with_root("reply");
    let t = s.create_branch(root, "reply", None, None).unwrap();
    s.remove(t.node).unwrap();
    assert!(!s.complete(t.request_id, GenerateReply::Text("late".into())));
    assert_eq!(s.store().len(), 1);
    assert_eq!(s.pending_count(), 0);
}

#[test]
fn concurrent_completions_in_any_order_converge() {
    let (mut s, root) = session_with_root("a b c");
    let tickets: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|e| s.create_branch(root, e, None, None).unwrap())
        .collect();
    for t in tickets.iter().rev() {
        assert!(s.complete(t.request_id, GenerateReply::Text("line\n".repeat(12))));
    }
    let tops: Vec<i32> = tickets.iter().map(|t| top(&s, t.node)).collect();
    for (i, t) in tickets.iter().enumerate().skip(1) {
        let prev = s.node(tickets[i - 1].node).unwrap();
        assert_eq!(tops[i], prev.bottom() + 20, "sibling {}", s.node(t.node).unwrap().label);
    }
    assert!(s.snapshot().nodes.iter().all(|n| n.phase == BranchPhase::Complete));
}

#[test]
fn drill_down_history_and_breadcrumbs() {
    let (mut s, root) = session_with_root("root reply");
    let a1 = s.create_branch(root, "x", None, None).unwrap().node;
    s.create_branch(a1, "y", None, None).unwrap();
    let a12 = s.create_branch(a1, "y", None, None).unwrap().node;
    s.create_branch(a12, "z", None, None).unwrap();
    s.create_branch(a12, "z", None, None).unwrap();
    let a123 = s.create_branch(a12, "z", None, None).unwrap().node;

    for n in [a1, a12, a123] {
        s.focus(n).unwrap();
    }
    let labels: Vec<String> = s.snapshot().breadcrumbs.into_iter().map(|b| b.label).collect();
    assert_eq!(labels, ["Root", "Node A1", "Node A1-2", "Node A1-2-3"]);

    assert!(s.navigate_to(a1));
    assert_eq!(s.history().entries(), &[root, a1]);
    let visible: Vec<NodeHandle> = s.snapshot().nodes.iter().map(|n| n.handle).collect();
    assert_eq!(visible.len(), s.store().subtree(a1).count());
    assert!(!visible.contains(&root));

    // Removing the view-root falls back to its parent view.
    s.remove(a1).unwrap();
    assert_eq!(s.history().entries(), &[root]);
    assert_eq!(s.snapshot().transform.translate, Point::ZERO);
}
