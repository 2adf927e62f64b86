use crate::node::{MAX_DEPTH, Node, NodeKind};

/// Validates parser output invariants.
///
/// Asserts that:
/// - Every node kind has a non-empty name
/// - No node sits deeper than the walk bound
/// - Lists contain only list items
/// - Headings are level 1-5 and carry an id once parsing is done
/// - Error nodes carry a message
///
/// # Panics
/// Panics with a descriptive message if any invariant is violated.
pub fn check(nodes: &[Node]) {
    for node in nodes {
        node.walk(&mut |n, depth| {
            assert!(!n.kind.name().is_empty(), "empty kind name: {n:?}");
            assert!(depth <= MAX_DEPTH, "node at depth {depth}");
            match &n.kind {
                NodeKind::List { .. } => assert!(
                    n.children().iter().all(|c| c.kind == NodeKind::ListItem),
                    "list with non-item child: {n:?}"
                ),
                NodeKind::Heading(level) => {
                    assert!((1..=5).contains(level), "heading level {level}");
                    assert!(n.heading_id().is_some(), "heading without id: {n:?}");
                }
                NodeKind::Error { message, .. } => {
                    assert!(!message.is_empty(), "error node without message")
                }
                _ => {}
            }
        });
    }
}
