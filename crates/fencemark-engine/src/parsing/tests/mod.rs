//! Whole-document parsing tests.
//!
//! Each case parses a small document, checks the tree invariants and
//! snapshots a one-line shape of the result.

mod invariants;

use insta::assert_snapshot;
use pretty_assertions::assert_eq;

use crate::parsing::{ParsedDoc, context::DiagnosticKind, parse_str};

fn parsed(source: &str) -> ParsedDoc {
    let doc = parse_str(source);
    invariants::check(&doc.nodes);
    doc
}

fn shape_of(source: &str) -> String {
    shape::forest(&parsed(source).nodes)
}

fn diagnostic_kinds(source: &str) -> Vec<DiagnosticKind> {
    parsed(source).diagnostics.iter().map(|d| d.kind).collect()
}

// Shapes

#[test]
fn single_block() {
    assert_snapshot!(shape_of(";;;太字\n内容\n;;;"), @r#"strong("内容")"#);
}

#[test]
fn compound_block_nests_in_fixed_order() {
    assert_snapshot!(shape_of(";;;太字+イタリック\n複合\n;;;"), @r#"strong(emphasis("複合"))"#);
    assert_snapshot!(shape_of(";;;イタリック+太字\n複合\n;;;"), @r#"strong(emphasis("複合"))"#);
}

#[test]
fn nested_unordered_list() {
    assert_snapshot!(
        shape_of("- a\n  - b\n- c"),
        @r#"unordered-list(list-item("a", unordered-list(list-item("b"))), list-item("c"))"#
    );
}

#[test]
fn ordered_list() {
    assert_snapshot!(
        shape_of("1. a\n2. b"),
        @r#"ordered-list(list-item("a"), list-item("b"))"#
    );
}

#[test]
fn paragraph_with_inline_marker() {
    assert_snapshot!(
        shape_of("plain #太字#bold## end"),
        @r#"paragraph("plain ", strong("bold"), " end")"#
    );
}

#[test]
fn ruby_inline() {
    assert_snapshot!(shape_of("#ルビ#漢字(かんじ)##"), @r#"paragraph(ruby<かんじ>("漢字"))"#);
}

#[test]
fn block_inside_box() {
    assert_snapshot!(
        shape_of(";;;枠線\n;;;太字\nx\n;;;\n;;;"),
        @r#"box[class=box](strong("x"))"#
    );
}

#[test]
fn spoiler_summary() {
    assert_snapshot!(
        shape_of(";;;ネタバレ\n犯人\n;;;"),
        @r#"details[summary=ネタバレを表示]("犯人")"#
    );
}

#[test]
fn single_line_heading_and_image() {
    assert_snapshot!(
        shape_of(";;;見出し1;;; T ;;;\n;;;cat.png alt=猫;;;"),
        @r#"heading1("T") | image[src=images/cat.png, alt=猫]"#
    );
}

#[test]
fn stray_closer_becomes_error_node() {
    assert_snapshot!(shape_of("ok\n;;;"), @r#"paragraph("ok") | error@2"#);
}

// Behaviour

#[test]
fn empty_document() {
    assert!(parsed("").nodes.is_empty());
}

#[test]
fn blank_lines_only() {
    assert!(parsed("\n\n\n").nodes.is_empty());
}

#[test]
fn unclosed_inline_marker_stays_text() {
    assert_snapshot!(shape_of("#太字#never closed"), @r##"paragraph("#太字#never closed")"##);
}

#[test]
fn unknown_keyword_is_reported_with_suggestion() {
    let doc = parsed(";;;太時\nx\n;;;");
    let first = &doc.diagnostics[0];
    assert_eq!(first.kind, DiagnosticKind::UnknownKeyword);
    assert_eq!(first.line, 1);
    assert!(first.suggestion.as_deref().is_some_and(|s| s.contains("太字")));
    assert!(doc.nodes[0].kind.is_error());
}

#[test]
fn unterminated_block_keeps_its_content() {
    let doc = parsed(";;;枠線\nstill here");
    assert_eq!(diagnostic_kinds(";;;枠線\nstill here"), vec![DiagnosticKind::UnterminatedBlock]);
    assert!(doc.nodes.iter().any(|n| n.plain_text().contains("still here")));
}

#[test]
fn ten_thousand_stray_closers_terminate() {
    let source = vec![";;;"; 10_000].join("\n");
    let kinds = diagnostic_kinds(&source);
    assert_eq!(kinds.len(), 10_000);
    assert!(kinds.iter().all(|k| *k == DiagnosticKind::UnmatchedCloser));
}

#[test]
fn headings_numbered_in_document_order() {
    let doc = parsed(";;;見出し1;;; a ;;;\n;;;枠線\n;;;見出し2;;; b ;;;\n;;;\n;;;見出し3 id=own;;; c ;;;");
    let mut ids = vec![];
    for node in &doc.nodes {
        node.walk(&mut |n, _| {
            if let Some(id) = n.heading_id() {
                ids.push(id.to_string());
            }
        });
    }
    assert_eq!(ids, vec!["heading-1", "heading-2", "own"]);
}

#[test]
fn long_paragraph_of_unclosed_markers_parses_in_linear_time() {
    let lines = 20_000;
    let source = vec!["#太字#x"; lines].join("\n");
    let started = std::time::Instant::now();
    let doc = parsed(&source);
    let elapsed = started.elapsed();

    assert_eq!(doc.nodes.len(), 1);
    assert_eq!(doc.nodes[0].kind, crate::node::NodeKind::Paragraph);
    assert_eq!(doc.nodes[0].plain_text().matches("#太字#x").count(), lines);
    // A rescan per opener takes minutes at this size.
    assert!(elapsed.as_secs() < 20, "took {elapsed:?}");
}

#[test]
fn markers_after_unclosed_ones_still_close() {
    assert_snapshot!(
        shape_of("#太字#a\n#太字#b\n#イタリック#c## d"),
        @r##"paragraph("#太字#a #太字#b ", emphasis("c"), " d")"##
    );
}

#[test]
fn invalid_nested_opener_points_at_the_closer_it_loses() {
    let doc = parsed(";;;枠線\na\n;;;zzzbogus\nb\n;;;\nc\n;;;");
    let lines: Vec<(usize, DiagnosticKind)> =
        doc.diagnostics.iter().map(|d| (d.line, d.kind)).collect();
    assert_eq!(
        lines,
        vec![
            (3, DiagnosticKind::UnknownKeyword),
            (7, DiagnosticKind::UnmatchedCloser),
        ]
    );
    let hint = doc.diagnostics[0].suggestion.as_deref().unwrap_or_default();
    assert!(hint.contains("the `;;;` on line 5 closes the enclosing block"), "{hint}");
}

#[test]
fn invalid_top_level_opener_has_no_enclosing_hint() {
    let doc = parsed(";;;zzzbogus\nb\n;;;");
    let hint = doc.diagnostics[0].suggestion.as_deref().unwrap_or_default();
    assert!(!hint.contains("enclosing block"));
}
