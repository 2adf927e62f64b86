use crate::{
    node::{Attributes, Content, Fragment, Node, NodeKind},
    parsing::keywords::{factory::apply_caller_attributes, normalize, phrase::split_phrase},
};

use super::{
    cursor::Cursor,
    kinds::{InlineFence, InlineKeyword, ruby},
};

/// How many markers may nest inside one another. Markers deeper than this
/// are kept as literal text.
pub const MAX_INLINE_NESTING: usize = 1;

/// Processes the inline markers in `text` into node content.
///
/// Text between markers is kept raw; escaping happens at render time.
pub fn process_inline(text: &str) -> Content {
    Content::from_fragments(parse_fragments(text, 0))
}

/// An opened `#phrase#` marker.
struct Opener {
    keyword: InlineKeyword,
    attributes: Attributes,
    /// Byte index just past the second `#`.
    content_start: usize,
}

/// Parses `s` into fragments. `depth` counts enclosing markers.
pub fn parse_fragments(s: &str, depth: usize) -> Vec<Fragment> {
    if depth > MAX_INLINE_NESTING {
        return text_fragment(s);
    }

    let closers = Closers::new(s);
    let mut cur = Cursor::new(s);
    let mut out = vec![];
    let mut text_start = 0;

    fn flush_text(out: &mut Vec<Fragment>, s: &str, start: usize, end: usize) {
        if end <= start {
            return;
        }
        match out.last_mut() {
            Some(Fragment::Text(prev)) => prev.push_str(&s[start..end]),
            _ => out.push(Fragment::Text(s[start..end].to_string())),
        }
    }

    while !cur.eof() {
        let start = cur.i;
        if let Some((node, end)) = try_parse_marker(&cur, depth, &closers) {
            flush_text(&mut out, s, text_start, start);
            out.push(Fragment::Node(node));
            cur.i = end;
            text_start = end;
            continue;
        }
        cur.bump();
    }

    flush_text(&mut out, s, text_start, s.len());
    out
}

fn text_fragment(s: &str) -> Vec<Fragment> {
    if s.is_empty() {
        vec![]
    } else {
        vec![Fragment::Text(s.to_string())]
    }
}

/// Recognizes `#phrase#` at the cursor. The phrase must stay on one line and
/// name exactly one inline keyword.
fn try_open(cur: &Cursor<'_>) -> Option<Opener> {
    if cur.peek() != Some(InlineFence::OPEN) || cur.starts_with(InlineFence::CLOSE) {
        return None;
    }
    let mut after = cur.clone();
    after.bump();
    let phrase_end = after.find_on_line(InlineFence::OPEN)?;
    let phrase = normalize(after.slice(after.i, phrase_end));
    if phrase.is_empty() {
        return None;
    }
    let (keyword_part, attributes, _stray) = split_phrase(&phrase);
    let keyword = InlineKeyword::from_keyword(keyword_part)?;
    Some(Opener {
        keyword,
        attributes,
        content_start: phrase_end + 1,
    })
}

/// Where the `##` closing a marker lies, for every possible content start.
///
/// `close[i]` is the closer a scan from byte `i` stops at with no marker open.
/// Nested openers skip their own closer, and no scan crosses a newline. Each
/// entry depends only on entries to its right, so one right-to-left pass
/// fills the table.
struct Closers {
    close: Vec<Option<usize>>,
}

impl Closers {
    fn new(s: &str) -> Self {
        let bytes = s.as_bytes();
        if !bytes.windows(2).any(|w| w == InlineFence::CLOSE) {
            return Self { close: vec![] };
        }

        let mut close = vec![None; bytes.len() + 1];
        for i in (0..bytes.len()).rev() {
            let cur = Cursor::at(s, i);
            close[i] = if bytes[i] == b'\n' {
                None
            } else if cur.starts_with(InlineFence::CLOSE) {
                Some(i)
            } else if let Some(nested) = try_open(&cur) {
                close[nested.content_start]
                    .and_then(|inner| close[inner + InlineFence::CLOSE.len()])
            } else {
                close[i + 1]
            };
        }
        Self { close }
    }

    fn find(&self, from: usize) -> Option<usize> {
        self.close.get(from).copied().flatten()
    }
}

/// Attempts a whole marker at the cursor, returning the node and the index
/// just past its closer. The cursor itself is never moved.
fn try_parse_marker(
    cur: &Cursor<'_>,
    depth: usize,
    closers: &Closers,
) -> Option<(Node, usize)> {
    let opener = try_open(cur)?;
    let close = closers.find(opener.content_start)?;
    let inner = cur.slice(opener.content_start, close);
    let end = close + InlineFence::CLOSE.len();

    let node = match opener.keyword.node_kind() {
        Some(kind) => {
            let content = if opener.keyword.is_raw() {
                Content::from(inner)
            } else {
                Content::from_fragments(parse_fragments(inner, depth + 1))
            };
            Node::new(kind, content)
        }
        None => {
            let (base, reading) = ruby::split(inner)?;
            Node::new(
                NodeKind::Ruby {
                    reading: reading.to_string(),
                },
                base,
            )
        }
    };

    let mark = matches!(node.kind, NodeKind::Mark);
    Some((apply_caller_attributes(node, &opener.attributes, mark), end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Fragment {
        Fragment::Text(s.to_string())
    }

    fn node(kind: NodeKind, content: impl Into<Content>) -> Fragment {
        Fragment::Node(Node::new(kind, content))
    }

    #[test]
    fn plain_text_is_one_fragment() {
        assert_eq!(process_inline("hello world"), Content::Text("hello world".into()));
        assert_eq!(process_inline(""), Content::empty());
    }

    #[test]
    fn simple_marker() {
        assert_eq!(
            parse_fragments("a #太字#b## c", 0),
            vec![text("a "), node(NodeKind::Strong, "b"), text(" c")]
        );
    }

    #[test]
    fn whole_text_marker_collapses_to_node() {
        let content = process_inline("#下線#u##");
        assert_eq!(
            content,
            Content::Node(Box::new(Node::new(NodeKind::Underline, "u")))
        );
    }

    #[test]
    fn one_level_of_nesting_is_parsed() {
        let frags = parse_fragments("#太字#x #イタリック#y## z##", 0);
        assert_eq!(
            frags,
            vec![node(
                NodeKind::Strong,
                Content::Mixed(vec![
                    text("x "),
                    node(NodeKind::Emphasis, "y"),
                    text(" z"),
                ])
            )]
        );
    }

    #[test]
    fn second_level_of_nesting_stays_literal() {
        let frags = parse_fragments("#太字#a #イタリック#b #下線#c## d## e##", 0);
        assert_eq!(
            frags,
            vec![node(
                NodeKind::Strong,
                Content::Mixed(vec![
                    text("a "),
                    node(NodeKind::Emphasis, "b #下線#c## d"),
                    text(" e"),
                ])
            )]
        );
    }

    #[test]
    fn unknown_keyword_is_literal() {
        assert_eq!(
            process_inline("#枠線#x## and #tag"),
            Content::Text("#枠線#x## and #tag".into())
        );
    }

    #[test]
    fn unclosed_marker_is_literal() {
        assert_eq!(process_inline("#太字#open"), Content::Text("#太字#open".into()));
    }

    #[test]
    fn marker_does_not_cross_lines() {
        assert_eq!(
            process_inline("#太字#a\nb##"),
            Content::Text("#太字#a\nb##".into())
        );
    }

    #[test]
    fn ruby_marker() {
        assert_eq!(
            parse_fragments("#ルビ#漢字(かんじ)##", 0),
            vec![node(
                NodeKind::Ruby {
                    reading: "かんじ".into()
                },
                "漢字"
            )]
        );
    }

    #[test]
    fn malformed_ruby_falls_back_to_literal() {
        assert_eq!(
            process_inline("x #ルビ#漢字## y"),
            Content::Text("x #ルビ#漢字## y".into())
        );
    }

    #[test]
    fn code_content_is_raw() {
        assert_eq!(
            parse_fragments("#コード##太字#x####", 0),
            vec![node(NodeKind::Code, "#太字#x##")],
        );
    }

    #[test]
    fn mark_color_becomes_background() {
        let frags = parse_fragments("#ハイライト color=ff0#hi##", 0);
        let Fragment::Node(n) = &frags[0] else {
            panic!("expected node");
        };
        assert_eq!(n.kind, NodeKind::Mark);
        assert_eq!(
            n.attributes.get("style").map(String::as_str),
            Some("background-color: #ff0")
        );
    }

    #[test]
    fn closer_table_skips_nested_pairs() {
        let s = "#太字#a #イタリック#b## c## d##";
        let closers = Closers::new(s);
        let outer = s.find("a ").unwrap();
        let inner = s.find("b##").unwrap();
        assert_eq!(closers.find(inner), Some(inner + 1));
        assert_eq!(closers.find(outer), s.find("## d"));
    }

    #[test]
    fn later_opener_closes_after_earlier_one_fails() {
        assert_eq!(
            parse_fragments("#太字#a #太字#b##", 0),
            vec![text("#太字#a "), node(NodeKind::Strong, "b")]
        );
    }

    #[test]
    fn text_without_closers_has_empty_table() {
        assert!(Closers::new("#太字#open #イタリック#x").close.is_empty());
    }

    #[test]
    fn consecutive_markers() {
        assert_eq!(
            parse_fragments("#太字#a###イタリック#b##", 0),
            vec![node(NodeKind::Strong, "a"), node(NodeKind::Emphasis, "b")]
        );
    }
}
