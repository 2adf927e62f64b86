use serde::Serialize;

use crate::node::{MAX_DEPTH, Node};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub level: u8,
    pub id: String,
    pub title: String,
}

/// Table of contents extracted from a node forest.
///
/// A document without headings gives `has_toc: false` and no entries; that
/// is a normal result, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Toc {
    pub has_toc: bool,
    pub heading_count: usize,
    pub entries: Vec<TocEntry>,
}

impl Toc {
    pub fn push(&mut self, entry: TocEntry) {
        self.entries.push(entry);
        self.heading_count = self.entries.len();
        self.has_toc = true;
    }
}

/// Collects `{level, id, title}` for every heading, in document order.
///
/// Headings deeper than [`MAX_DEPTH`] are not visited.
pub fn extract_toc(nodes: &[Node]) -> Toc {
    let mut toc = Toc::default();
    for node in nodes {
        let complete = node.walk(&mut |n, _| {
            if let Some(level) = n.heading_level() {
                toc.push(TocEntry {
                    level,
                    id: n.ensure_heading_id().to_string(),
                    title: n.plain_text().trim().to_string(),
                });
            }
        });
        if !complete {
            log::warn!("toc extraction stopped at depth {MAX_DEPTH}");
        }
    }
    toc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{node::NodeKind, parsing::parse_str};
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_has_no_toc() {
        let toc = extract_toc(&[]);
        assert_eq!(toc, Toc::default());
        assert!(!toc.has_toc);
    }

    #[test]
    fn collects_headings_in_order() {
        let doc = parse_str(
            ";;;見出し1;;; Intro ;;;\ntext\n;;;見出し2 id=deep;;; #太字#Deep## dive ;;;",
        );
        let toc = extract_toc(&doc.nodes);
        assert_eq!(
            toc,
            Toc {
                has_toc: true,
                heading_count: 2,
                entries: vec![
                    TocEntry {
                        level: 1,
                        id: "heading-1".into(),
                        title: "Intro".into()
                    },
                    TocEntry {
                        level: 2,
                        id: "deep".into(),
                        title: "Deep dive".into()
                    },
                ],
            }
        );
    }

    #[test]
    fn deep_nesting_terminates() {
        let mut node = Node::new(NodeKind::Heading(1), "bottom");
        for _ in 0..(MAX_DEPTH * 3) {
            node = Node::new(NodeKind::Box, node);
        }
        let toc = extract_toc(&[node]);
        assert!(!toc.has_toc);
    }

    #[test]
    fn serializes_to_json() {
        let mut toc = Toc::default();
        toc.push(TocEntry {
            level: 3,
            id: "heading-1".into(),
            title: "T".into(),
        });
        let json = serde_json::to_string(&toc).unwrap();
        assert_eq!(
            json,
            r#"{"has_toc":true,"heading_count":1,"entries":[{"level":3,"id":"heading-1","title":"T"}]}"#
        );
    }
}
