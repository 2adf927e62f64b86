//! # List Parsing
//!
//! Ordered and unordered lists with indentation-derived nesting.
//!
//! An item is its marker line plus any following continuation lines
//! (indented deeper than the marker, not themselves list markers) and nested
//! lists (list lines indented deeper than the marker, grouped recursively).
//! A blank line, a fence line or a line at or above the item's own indent ends
//! the item.

use crate::node::{Content, Fragment, Node, NodeKind};

use super::{context::ParseContext, inline::process_inline, markers::fence::is_marker_line};

/// Indent width of a tab.
pub const TAB_WIDTH: usize = 4;

const UNORDERED_MARKERS: &[&str] = &["- ", "* ", "+ "];
/// Bullet that needs no trailing space.
const BARE_BULLET: char = '・';

/// A recognised list marker line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListMarker<'a> {
    pub ordered: bool,
    pub indent: usize,
    /// Item text after the marker.
    pub content: &'a str,
}

/// Leading whitespace width, tabs counted as [`TAB_WIDTH`].
pub fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
        .sum()
}

/// Recognises `- `, `* `, `+ `, `・` and `<digits>. ` list markers.
///
/// A bare `-` with nothing after it is not a marker.
pub fn detect(line: &str) -> Option<ListMarker<'_>> {
    let indent = indent_width(line);
    let body = line.trim_start_matches([' ', '\t']);

    for marker in UNORDERED_MARKERS {
        if let Some(rest) = body.strip_prefix(marker) {
            return Some(ListMarker {
                ordered: false,
                indent,
                content: rest.trim(),
            });
        }
    }
    if let Some(rest) = body.strip_prefix(BARE_BULLET) {
        return Some(ListMarker {
            ordered: false,
            indent,
            content: rest.trim(),
        });
    }

    let digits = body.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 {
        if let Some(rest) = body[digits..].strip_prefix(". ") {
            return Some(ListMarker {
                ordered: true,
                indent,
                content: rest.trim(),
            });
        }
    }
    None
}

pub fn is_list_line(line: &str) -> bool {
    detect(line).is_some()
}

/// Parses the list starting at `ctx.cursor`, which must be a list line.
///
/// Consumes contiguous items of the same type at the first item's indent.
pub fn parse_list(lines: &[&str], ctx: &mut ParseContext) -> Option<Node> {
    let first = detect(lines.get(ctx.cursor)?)?;
    let mut items = vec![];

    while let Some(line) = lines.get(ctx.cursor) {
        match detect(line) {
            Some(m) if m.indent == first.indent && m.ordered == first.ordered => {
                items.push(Fragment::Node(parse_list_item(lines, ctx, m)));
            }
            _ => break,
        }
    }

    Some(Node::new(
        NodeKind::List {
            ordered: first.ordered,
        },
        Content::from_fragments(items),
    ))
}

pub fn parse_unordered(lines: &[&str], ctx: &mut ParseContext) -> Option<Node> {
    let m = detect(lines.get(ctx.cursor)?)?;
    if m.ordered { None } else { parse_list(lines, ctx) }
}

pub fn parse_ordered(lines: &[&str], ctx: &mut ParseContext) -> Option<Node> {
    let m = detect(lines.get(ctx.cursor)?)?;
    if m.ordered { parse_list(lines, ctx) } else { None }
}

/// Collects one item: its first line, continuation lines and nested lists.
pub fn parse_list_item(lines: &[&str], ctx: &mut ParseContext, marker: ListMarker<'_>) -> Node {
    ctx.cursor += 1;
    let mut text = vec![marker.content.to_string()];
    let mut nested = vec![];

    while let Some(line) = lines.get(ctx.cursor) {
        if line.trim().is_empty() || is_marker_line(line) {
            break;
        }
        match detect(line) {
            Some(m) if m.indent > marker.indent => {
                if !ctx.enter() {
                    // Too deep: keep the line as text rather than recurse.
                    text.push(line.trim().to_string());
                    ctx.cursor += 1;
                    continue;
                }
                let list = parse_list(lines, ctx);
                ctx.leave();
                match list {
                    Some(list) => nested.push(Fragment::Node(list)),
                    None => break,
                }
            }
            Some(_) => break,
            None if indent_width(line) > marker.indent => {
                text.push(line.trim().to_string());
                ctx.cursor += 1;
            }
            None => break,
        }
    }

    let joined = text
        .into_iter()
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let mut fragments = process_inline(&joined).into_fragments();
    fragments.extend(nested);
    Node::new(NodeKind::ListItem, Content::from_fragments(fragments))
}
