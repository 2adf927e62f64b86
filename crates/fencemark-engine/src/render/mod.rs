//! # Rendering
//!
//! HTML output and table-of-contents extraction over a node forest. Both walk
//! the tree with the same [`MAX_DEPTH`](crate::node::MAX_DEPTH) guard, so
//! pathological nesting ends in a finite result rather than a stack overflow.

pub mod html;
pub mod toc;

pub use html::HtmlRenderer;
pub use toc::{Toc, TocEntry, extract_toc};

use crate::node::Node;

/// Renders one node without document context.
pub fn render(node: &Node) -> String {
    HtmlRenderer::new().render(node)
}

/// One HTML string per top-level node.
pub fn render_nodes(nodes: &[Node]) -> Vec<String> {
    let renderer = HtmlRenderer::new();
    nodes.iter().map(|n| renderer.render(n)).collect()
}

/// Renders a whole forest, filling TOC markers from the extracted headings.
pub fn render_document(nodes: &[Node]) -> String {
    let toc = extract_toc(nodes);
    let renderer = HtmlRenderer::with_toc(&toc);
    nodes
        .iter()
        .map(|n| renderer.render(n))
        .collect::<Vec<_>>()
        .join("\n")
}
