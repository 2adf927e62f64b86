use std::fmt::Write as _;

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::node::{Attributes, Content, Fragment, MAX_DEPTH, Node, NodeKind};

use super::toc::Toc;

/// Summary shown for a collapsible block that carries none.
pub const DEFAULT_SUMMARY: &str = "詳細を表示";

/// Renders nodes to HTML.
///
/// Dispatch is a closed match over [`NodeKind`]; [`NodeKind::Element`] is the
/// generic tag-wrapping arm for tags the renderer has no special case for.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlRenderer<'t> {
    /// Table used for TOC markers. Without one they render an empty `nav`.
    toc: Option<&'t Toc>,
}

impl<'t> HtmlRenderer<'t> {
    pub fn new() -> Self {
        Self { toc: None }
    }

    pub fn with_toc(toc: &'t Toc) -> Self {
        Self { toc: Some(toc) }
    }

    pub fn render(&self, node: &Node) -> String {
        let mut out = String::new();
        self.render_at(node, 0, &mut out);
        out
    }

    fn render_at(&self, node: &Node, depth: usize, out: &mut String) {
        if depth > MAX_DEPTH {
            out.push_str(r#"<span class="render-error">nesting too deep</span>"#);
            return;
        }

        match &node.kind {
            NodeKind::Paragraph => self.wrap("p", node, &[], depth, out),
            NodeKind::Strong => self.wrap("strong", node, &[], depth, out),
            NodeKind::Emphasis => self.wrap("em", node, &[], depth, out),
            NodeKind::Heading(level) => {
                let tag = format!("h{}", (*level).clamp(1, 5));
                let _ = write!(
                    out,
                    r#"<{tag} id="{}""#,
                    encode_double_quoted_attribute(node.ensure_heading_id())
                );
                write_attributes(out, &node.attributes, &["id"]);
                out.push('>');
                self.render_content(&node.content, depth, out);
                let _ = write!(out, "</{tag}>");
            }
            NodeKind::Box => self.wrap_classed("div", "box", node, depth, out),
            NodeKind::Highlight => self.wrap_classed("div", "highlight", node, depth, out),
            NodeKind::Details => {
                out.push_str("<details");
                write_attributes(out, &node.attributes, &["summary"]);
                out.push('>');
                let summary = node
                    .attributes
                    .get("summary")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_SUMMARY);
                let _ = write!(out, "<summary>{}</summary>", encode_text(summary));
                self.render_content(&node.content, depth, out);
                out.push_str("</details>");
            }
            NodeKind::List { ordered } => {
                self.wrap(if *ordered { "ol" } else { "ul" }, node, &[], depth, out)
            }
            NodeKind::ListItem => self.wrap("li", node, &[], depth, out),
            NodeKind::Image => {
                out.push_str("<img");
                write_attributes(out, &node.attributes, &[]);
                out.push('>');
            }
            NodeKind::TocMarker => self.render_toc(out),
            NodeKind::Mark => self.wrap("mark", node, &[], depth, out),
            NodeKind::Underline => self.wrap("u", node, &[], depth, out),
            NodeKind::Code => self.wrap("code", node, &[], depth, out),
            NodeKind::Strikethrough => self.wrap("del", node, &[], depth, out),
            NodeKind::Ruby { reading } => {
                out.push_str("<ruby");
                write_attributes(out, &node.attributes, &[]);
                out.push('>');
                self.render_content(&node.content, depth, out);
                let _ = write!(out, "<rt>{}</rt></ruby>", encode_text(reading));
            }
            NodeKind::Element(tag) => self.wrap(tag, node, &[], depth, out),
            NodeKind::Error {
                message,
                line,
                suggestion,
            } => {
                out.push_str(r#"<div class="marker-error""#);
                if let Some(line) = line {
                    let _ = write!(out, r#" data-line="{line}""#);
                }
                let _ = write!(out, ">{}", encode_text(message));
                if let Some(suggestion) = suggestion {
                    let _ = write!(
                        out,
                        r#" <span class="marker-suggestion">{}</span>"#,
                        encode_text(suggestion)
                    );
                }
                out.push_str("</div>");
            }
        }
    }

    fn wrap(&self, tag: &str, node: &Node, skip: &[&str], depth: usize, out: &mut String) {
        let _ = write!(out, "<{tag}");
        write_attributes(out, &node.attributes, skip);
        out.push('>');
        self.render_content(&node.content, depth, out);
        let _ = write!(out, "</{tag}>");
    }

    /// Like `wrap`, adding `class` when the node has none of its own.
    fn wrap_classed(&self, tag: &str, class: &str, node: &Node, depth: usize, out: &mut String) {
        if node.attributes.contains_key("class") {
            return self.wrap(tag, node, &[], depth, out);
        }
        let _ = write!(out, r#"<{tag} class="{class}""#);
        write_attributes(out, &node.attributes, &[]);
        out.push('>');
        self.render_content(&node.content, depth, out);
        let _ = write!(out, "</{tag}>");
    }

    fn render_content(&self, content: &Content, depth: usize, out: &mut String) {
        match content {
            Content::Text(text) => write_text(out, text),
            Content::Node(child) => self.render_at(child, depth + 1, out),
            Content::Mixed(parts) => {
                for part in parts {
                    match part {
                        Fragment::Text(text) => write_text(out, text),
                        Fragment::Node(child) => self.render_at(child, depth + 1, out),
                    }
                }
            }
        }
    }

    fn render_toc(&self, out: &mut String) {
        out.push_str(r#"<nav class="toc">"#);
        if let Some(toc) = self.toc.filter(|t| t.has_toc) {
            out.push_str("<ul>");
            for entry in &toc.entries {
                let _ = write!(
                    out,
                    r##"<li class="toc-level-{}"><a href="#{}">{}</a></li>"##,
                    entry.level,
                    encode_double_quoted_attribute(&entry.id),
                    encode_text(&entry.title)
                );
            }
            out.push_str("</ul>");
        }
        out.push_str("</nav>");
    }
}

/// Escaped text with newlines turned into `<br>`.
fn write_text(out: &mut String, text: &str) {
    let mut lines = text.split('\n');
    if let Some(first) = lines.next() {
        out.push_str(&encode_text(first));
    }
    for line in lines {
        out.push_str("<br>");
        out.push_str(&encode_text(line));
    }
}

fn write_attributes(out: &mut String, attributes: &Attributes, skip: &[&str]) {
    for (key, value) in attributes {
        if skip.contains(&key.as_str()) {
            continue;
        }
        let _ = write!(out, r#" {key}="{}""#, encode_double_quoted_attribute(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse_str;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    fn html(source: &str) -> String {
        let doc = parse_str(source);
        let renderer = HtmlRenderer::new();
        doc.nodes
            .iter()
            .map(|n| renderer.render(n))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn strong_block() {
        assert_snapshot!(html(";;;太字\n内容\n;;;"), @"<strong>内容</strong>");
    }

    #[test]
    fn compound_block() {
        assert_snapshot!(html(";;;太字+イタリック\n複合\n;;;"), @"<strong><em>複合</em></strong>");
    }

    #[test]
    fn text_is_escaped_and_newlines_break() {
        assert_snapshot!(
            html(";;;枠線\na < b\n\"c\" & d\n;;;"),
            @r#"<div class="box">a &lt; b<br>"c" &amp; d</div>"#
        );
    }

    #[test]
    fn heading_gets_id() {
        assert_snapshot!(
            html(";;;見出し2;;; Title ;;;"),
            @r#"<h2 id="heading-1">Title</h2>"#
        );
    }

    #[test]
    fn details_with_summary() {
        assert_snapshot!(
            html(";;;ネタバレ\n犯人は執事\n;;;"),
            @"<details><summary>ネタバレを表示</summary>犯人は執事</details>"
        );
    }

    #[test]
    fn highlight_with_color() {
        assert_snapshot!(
            html(";;;ハイライト color=ff0\n注目\n;;;"),
            @r#"<div class="highlight" style="background-color: #ff0">注目</div>"#
        );
    }

    #[test]
    fn list_and_inline() {
        assert_snapshot!(
            html("- #太字#a## b\n  - #ルビ#漢字(かんじ)##\n- c"),
            @"<ul><li><strong>a</strong> b<ul><li><ruby>漢字<rt>かんじ</rt></ruby></li></ul></li><li>c</li></ul>"
        );
    }

    #[test]
    fn image() {
        assert_snapshot!(
            html(";;;cat.png alt=猫 の写真;;;"),
            @r#"<img src="images/cat.png" alt="猫 の写真">"#
        );
    }

    #[test]
    fn error_nodes_carry_line_and_suggestion() {
        assert_eq!(
            html("ok\n;;;"),
            concat!(
                "<p>ok</p>\n",
                r#"<div class="marker-error" data-line="2">unmatched closing marker "#,
                r#"<span class="marker-suggestion">remove it or add a `;;;keyword` line above</span></div>"#,
            )
        );
    }

    #[test]
    fn unknown_kind_uses_generic_wrapper() {
        let node = Node::element("aside", "x").with_attr("class", "note");
        assert_eq!(HtmlRenderer::new().render(&node), r#"<aside class="note">x</aside>"#);
    }

    #[test]
    fn depth_guard_short_circuits() {
        let mut node = Node::new(NodeKind::Strong, "leaf");
        for _ in 0..(MAX_DEPTH * 10) {
            node = Node::new(NodeKind::Emphasis, node);
        }
        let out = HtmlRenderer::new().render(&node);
        assert!(out.contains(r#"<span class="render-error">"#));
        assert!(!out.contains("leaf"));
    }

    #[test]
    fn toc_marker_without_table_is_empty_nav() {
        assert_snapshot!(html(";;;目次;;;"), @r#"<nav class="toc"></nav>"#);
    }
}
