//! # Node Model
//!
//! The intermediate tree produced by the parser and consumed by the renderer
//! and TOC extractor.
//!
//! ## Invariants
//!
//! - A node's kind always has a non-empty name ([`Node::element`] refuses an
//!   empty tag and produces an error node instead)
//! - Every tree walk is bounded by [`MAX_DEPTH`]
//! - Compound nodes are built by the keyword factory in a fixed outer-to-inner
//!   order, never in input order
//! - Nodes are not mutated after parsing except for the one-time heading id

use std::sync::OnceLock;

use indexmap::IndexMap;

/// Maximum nesting depth honoured by every tree-walking operation.
pub const MAX_DEPTH: usize = 100;

/// Ordered attribute map. Inserting an existing key overrides its value.
pub type Attributes = IndexMap<String, String>;

/// The semantic kind of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Paragraph,
    Strong,
    Emphasis,
    /// Heading level 1 to 5.
    Heading(u8),
    /// `div.box` container.
    Box,
    /// `div.highlight` container.
    Highlight,
    /// Collapsible `details` container; the summary lives in the attributes.
    Details,
    List {
        ordered: bool,
    },
    ListItem,
    /// Image; `src` and `alt` live in the attributes.
    Image,
    TocMarker,
    /// Inline highlight (`mark`).
    Mark,
    Underline,
    Code,
    Strikethrough,
    Ruby {
        reading: String,
    },
    /// Any other tag, typically from a registry override. Rendered by the
    /// generic tag-wrapping fallback.
    Element(String),
    /// A recoverable failure embedded in the tree.
    Error {
        message: String,
        line: Option<usize>,
        suggestion: Option<String>,
    },
}

impl NodeKind {
    /// Stable, never-empty name for this kind.
    pub fn name(&self) -> &str {
        match self {
            NodeKind::Paragraph => "paragraph",
            NodeKind::Strong => "strong",
            NodeKind::Emphasis => "emphasis",
            NodeKind::Heading(1) => "heading1",
            NodeKind::Heading(2) => "heading2",
            NodeKind::Heading(3) => "heading3",
            NodeKind::Heading(4) => "heading4",
            NodeKind::Heading(_) => "heading5",
            NodeKind::Box => "box",
            NodeKind::Highlight => "highlight",
            NodeKind::Details => "details",
            NodeKind::List { ordered: true } => "ordered-list",
            NodeKind::List { ordered: false } => "unordered-list",
            NodeKind::ListItem => "list-item",
            NodeKind::Image => "image",
            NodeKind::TocMarker => "toc-marker",
            NodeKind::Mark => "mark",
            NodeKind::Underline => "underline",
            NodeKind::Code => "code",
            NodeKind::Strikethrough => "strikethrough",
            NodeKind::Ruby { .. } => "ruby",
            NodeKind::Element(tag) => tag,
            NodeKind::Error { .. } => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, NodeKind::Error { .. })
    }
}

/// One piece of a mixed content sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Node(Node),
}

/// What a node contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Raw text (may be empty).
    Text(String),
    /// Exactly one child node.
    Node(Box<Node>),
    /// An ordered sequence mixing text and child nodes.
    Mixed(Vec<Fragment>),
}

impl Content {
    pub fn empty() -> Self {
        Content::Text(String::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text(t) => t.is_empty(),
            Content::Node(_) => false,
            Content::Mixed(parts) => parts.is_empty(),
        }
    }

    /// Collapses a fragment list into the simplest equivalent content.
    pub fn from_fragments(mut parts: Vec<Fragment>) -> Self {
        match parts.len() {
            0 => Content::empty(),
            1 => match parts.remove(0) {
                Fragment::Text(t) => Content::Text(t),
                Fragment::Node(n) => Content::Node(Box::new(n)),
            },
            _ => Content::Mixed(parts),
        }
    }

    /// The inverse of [`Content::from_fragments`]. Empty text yields nothing.
    pub fn into_fragments(self) -> Vec<Fragment> {
        match self {
            Content::Text(t) if t.is_empty() => vec![],
            Content::Text(t) => vec![Fragment::Text(t)],
            Content::Node(n) => vec![Fragment::Node(*n)],
            Content::Mixed(parts) => parts,
        }
    }

    /// Direct child nodes, in order.
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Content::Text(_) => vec![],
            Content::Node(n) => vec![n.as_ref()],
            Content::Mixed(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    Fragment::Node(n) => Some(n),
                    Fragment::Text(_) => None,
                })
                .collect(),
        }
    }

    fn children_mut(&mut self) -> Vec<&mut Node> {
        match self {
            Content::Text(_) => vec![],
            Content::Node(n) => vec![n.as_mut()],
            Content::Mixed(parts) => parts
                .iter_mut()
                .filter_map(|p| match p {
                    Fragment::Node(n) => Some(n),
                    Fragment::Text(_) => None,
                })
                .collect(),
        }
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<Node> for Content {
    fn from(node: Node) -> Self {
        Content::Node(Box::new(node))
    }
}

/// A semantic node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub content: Content,
    pub attributes: Attributes,
    heading_id: OnceLock<String>,
}

impl Node {
    pub fn new(kind: NodeKind, content: impl Into<Content>) -> Self {
        Self {
            kind,
            content: content.into(),
            attributes: Attributes::new(),
            heading_id: OnceLock::new(),
        }
    }

    /// Creates a generic element node. An empty tag yields an error node.
    pub fn element(tag: &str, content: impl Into<Content>) -> Self {
        if tag.trim().is_empty() {
            return Node::error("empty tag name", None, None);
        }
        Node::new(NodeKind::Element(tag.to_string()), content)
    }

    pub fn error(message: impl Into<String>, line: Option<usize>, suggestion: Option<String>) -> Self {
        Node::new(
            NodeKind::Error {
                message: message.into(),
                line,
                suggestion,
            },
            Content::empty(),
        )
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: &Attributes) -> Self {
        for (k, v) in attributes {
            self.attributes.insert(k.clone(), v.clone());
        }
        self
    }

    pub fn heading_level(&self) -> Option<u8> {
        match self.kind {
            NodeKind::Heading(level) => Some(level),
            _ => None,
        }
    }

    /// The heading id if one has been assigned (explicit `id` attribute wins).
    pub fn heading_id(&self) -> Option<&str> {
        self.heading_level()?;
        if let Some(id) = self.attributes.get("id") {
            return Some(id);
        }
        self.heading_id.get().map(String::as_str)
    }

    /// Assigns an auto id once. Returns false if an id was already present.
    pub fn assign_heading_id(&self, id: String) -> bool {
        if self.heading_level().is_none() || self.attributes.contains_key("id") {
            return false;
        }
        self.heading_id.set(id).is_ok()
    }

    /// Returns the heading id, deriving and caching one from the title if the
    /// parser never assigned it.
    ///
    /// Parse runs always number their headings; the derived id covers nodes
    /// built directly through this API and then rendered or put in a TOC.
    pub fn ensure_heading_id(&self) -> &str {
        if let Some(id) = self.attributes.get("id") {
            return id;
        }
        self.heading_id
            .get_or_init(|| format!("heading-{:08x}", fnv1a(&self.plain_text())))
    }

    /// True when this heading's id came from the parser rather than the author.
    pub fn has_auto_heading_id(&self) -> bool {
        self.heading_level().is_some()
            && !self.attributes.contains_key("id")
            && self.heading_id.get().is_some()
    }

    /// Removes the auto id so it can be renumbered.
    pub(crate) fn take_heading_id(&mut self) -> Option<String> {
        self.heading_id.take()
    }

    pub fn children(&self) -> Vec<&Node> {
        self.content.children()
    }

    /// Concatenated text of this node and its descendants, bounded by [`MAX_DEPTH`].
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        collect_text(self, 0, &mut out);
        out
    }

    /// Visits this node and its descendants in document order with their depth.
    ///
    /// Returns false if the walk was cut short by [`MAX_DEPTH`].
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node, usize)) -> bool {
        walk_at(self, 0, visit)
    }

    /// Mutable counterpart of [`Node::walk`].
    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut Node, usize)) -> bool {
        walk_mut_at(self, 0, visit)
    }

    /// Number of nodes in this subtree (bounded by [`MAX_DEPTH`]).
    pub fn count(&self) -> usize {
        let mut n = 0;
        self.walk(&mut |_, _| n += 1);
        n
    }
}

fn walk_at<'a>(node: &'a Node, depth: usize, visit: &mut impl FnMut(&'a Node, usize)) -> bool {
    if depth > MAX_DEPTH {
        return false;
    }
    visit(node, depth);
    let mut complete = true;
    for child in node.content.children() {
        complete &= walk_at(child, depth + 1, visit);
    }
    complete
}

fn walk_mut_at(node: &mut Node, depth: usize, visit: &mut impl FnMut(&mut Node, usize)) -> bool {
    if depth > MAX_DEPTH {
        return false;
    }
    visit(node, depth);
    let mut complete = true;
    for child in node.content.children_mut() {
        complete &= walk_mut_at(child, depth + 1, visit);
    }
    complete
}

fn collect_text(node: &Node, depth: usize, out: &mut String) {
    if depth > MAX_DEPTH {
        return;
    }
    match &node.content {
        Content::Text(t) => out.push_str(t),
        Content::Node(n) => collect_text(n, depth + 1, out),
        Content::Mixed(parts) => {
            for part in parts {
                match part {
                    Fragment::Text(t) => out.push_str(t),
                    Fragment::Node(n) => collect_text(n, depth + 1, out),
                }
            }
        }
    }
}

/// FNV-1a over the title bytes, so a hand-built heading keeps the same id
/// across runs.
fn fnv1a(s: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for b in s.bytes() {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}
