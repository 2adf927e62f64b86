use crate::node::{Attributes, Content, Node, NodeKind};

use super::registry::{KeywordRegistry, TagSpec};

/// Builds the node for one registered keyword.
///
/// An unknown keyword yields an error-kind node, never a panic.
pub fn create_single(
    registry: &KeywordRegistry,
    keyword: &str,
    content: Content,
    attributes: &Attributes,
) -> Node {
    let Some(spec) = registry.lookup(keyword) else {
        return unknown_keyword_node(registry, keyword);
    };
    let highlight = matches!(spec.tag.node_kind(), NodeKind::Highlight);
    let node = node_for(spec, content);
    apply_caller_attributes(node, attributes, highlight)
}

/// Builds a strict ancestor chain for a compound keyword.
///
/// Keywords are ordered by the fixed outer-to-inner table (collapsible >
/// box/highlight > heading > strong > emphasis > anything else), so the result
/// does not depend on input order. Caller attributes land on the outermost
/// node only and the content on the innermost node only.
pub fn create_compound(
    registry: &KeywordRegistry,
    keywords: &[String],
    content: Content,
    attributes: &Attributes,
) -> Node {
    let mut specs: Vec<(&str, &TagSpec)> = Vec::with_capacity(keywords.len());
    for keyword in keywords {
        match registry.lookup(keyword) {
            Some(spec) => specs.push((registry.canonical(keyword), spec)),
            None => return unknown_keyword_node(registry, keyword),
        }
    }
    // Stable sort, so equal ranks keep a deterministic order by keyword.
    specs.sort_by(|(ka, a), (kb, b)| a.tag.rank().cmp(&b.tag.rank()).then(ka.cmp(kb)));
    specs.dedup_by(|(ka, _), (kb, _)| ka == kb);

    let highlight = specs
        .iter()
        .any(|(_, s)| matches!(s.tag.node_kind(), NodeKind::Highlight));

    let Some(((_, innermost), outer)) = specs.split_last() else {
        return Node::error("no keywords to build", None, None);
    };
    let mut node = node_for(innermost, content);
    for (_, spec) in outer.iter().rev() {
        node = node_for(spec, Content::from(node));
    }
    apply_caller_attributes(node, attributes, highlight)
}

/// Creates a node with the keyword's fixed defaults (class, summary).
fn node_for(spec: &TagSpec, content: Content) -> Node {
    let mut node = match spec.tag.node_kind() {
        NodeKind::Element(tag) => Node::element(&tag, content),
        kind => Node::new(kind, content),
    };
    if let Some(class) = &spec.class {
        node = node.with_attr("class", class.clone());
    }
    if let Some(summary) = &spec.summary {
        node = node.with_attr("summary", summary.clone());
    }
    node
}

/// Applies author attributes to a node.
///
/// `color` becomes a style: a background colour when a highlight is involved,
/// a text colour otherwise. `class` is appended to any default class.
pub fn apply_caller_attributes(mut node: Node, attributes: &Attributes, highlight: bool) -> Node {
    for (key, value) in attributes {
        match key.as_str() {
            "color" => {
                let property = if highlight { "background-color" } else { "color" };
                let style = format!("{property}: {}", normalize_color(value));
                node = node.with_attr("style", style);
            }
            "class" => {
                let merged = match node.attributes.get("class") {
                    Some(existing) if !existing.is_empty() => format!("{existing} {value}"),
                    _ => value.clone(),
                };
                node = node.with_attr("class", merged);
            }
            _ => node = node.with_attr(key.clone(), value.clone()),
        }
    }
    node
}

/// Bare hex colours get a leading `#`; anything else is kept as written.
pub fn normalize_color(value: &str) -> String {
    let v = value.trim();
    let is_hex = matches!(v.len(), 3 | 4 | 6 | 8) && v.chars().all(|c| c.is_ascii_hexdigit());
    if is_hex { format!("#{v}") } else { v.to_string() }
}

fn unknown_keyword_node(registry: &KeywordRegistry, keyword: &str) -> Node {
    let suggestions = registry.suggest(keyword);
    let suggestion =
        (!suggestions.is_empty()).then(|| format!("did you mean: {}", suggestions.join(", ")));
    Node::error(format!("unknown keyword `{keyword}`"), None, suggestion)
}
