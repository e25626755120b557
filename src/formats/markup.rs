//! Structured document tree and its line renderer.
//!
//! [`DocNode`] is the intermediate form for content that carries structure
//! (headings, lists, emphasis, tables). Word documents are parsed into it by
//! [`crate::readers::word`], OCR Markdown by [`parse_markdown`].
//!
//! [`render_lines`] is the single visitor that flattens a tree into
//! [`StyledLine`]s for the PDF painter and for plain-text output. The
//! rendering state ([`RenderCursor`]) is passed by value down the recursion,
//! so list numbering and indentation cannot leak between siblings.

use crate::formats::grid::parse_text_to_grid;
use once_cell::sync::Lazy;
use regex::Regex;

/// One node of a structured document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocNode {
    /// Heading of level 1..=6.
    Heading { level: u8, children: Vec<DocNode> },
    Paragraph(Vec<DocNode>),
    /// Each item is its own node list; nested lists live inside items.
    List { ordered: bool, items: Vec<Vec<DocNode>> },
    Strong(Vec<DocNode>),
    Emphasis(Vec<DocNode>),
    Text(String),
    /// Rows of cell text.
    Table(Vec<Vec<String>>),
    LineBreak,
    PageBreak,
    /// A container this crate does not model (hyperlink, content control,
    /// ...). Children are rendered in place so no text is lost.
    Unknown(Vec<DocNode>),
}

impl DocNode {
    pub fn text(s: impl Into<String>) -> Self {
        DocNode::Text(s.into())
    }

    /// A paragraph holding a single text run.
    pub fn paragraph(s: impl Into<String>) -> Self {
        DocNode::Paragraph(vec![DocNode::text(s)])
    }

    pub fn heading(level: u8, s: impl Into<String>) -> Self {
        DocNode::Heading {
            level: level.clamp(1, 6),
            children: vec![DocNode::text(s)],
        }
    }

    fn is_inline(&self) -> bool {
        match self {
            DocNode::Text(_) | DocNode::Strong(_) | DocNode::Emphasis(_) | DocNode::LineBreak => {
                true
            }
            DocNode::Unknown(children) => children.iter().all(DocNode::is_inline),
            _ => false,
        }
    }
}

// ── Styled lines ─────────────────────────────────────────────────────────────

/// A run of text sharing one style.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyledRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

/// What a rendered line represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Heading(u8),
    Body,
    ListItem,
    TableRow,
    /// Forces the following lines onto a new page.
    PageBreak,
}

/// One output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledLine {
    pub kind: LineKind,
    /// Nesting depth (0 = top level).
    pub depth: usize,
    pub runs: Vec<StyledRun>,
}

impl StyledLine {
    /// Concatenated run text.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// Rendering state threaded through the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderCursor {
    /// List nesting depth.
    pub depth: usize,
    /// 1-based position within the current ordered list; 0 outside lists.
    pub counter: usize,
}

impl RenderCursor {
    fn nested(self) -> Self {
        RenderCursor {
            depth: self.depth + 1,
            counter: 0,
        }
    }

    fn next_item(self) -> Self {
        RenderCursor {
            counter: self.counter + 1,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct InlineStyle {
    bold: bool,
    italic: bool,
}

/// Flatten a node tree into styled lines.
pub fn render_lines(nodes: &[DocNode]) -> Vec<StyledLine> {
    let mut out = Vec::new();
    render_blocks(nodes, RenderCursor::default(), &mut out);
    out
}

/// Plain text of a node tree, one line per rendered line.
pub fn to_plain_text(nodes: &[DocNode]) -> String {
    render_lines(nodes)
        .into_iter()
        .filter(|l| l.kind != LineKind::PageBreak)
        .map(|l| {
            let indent = "  ".repeat(l.depth);
            format!("{indent}{}", l.text())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_blocks(nodes: &[DocNode], cursor: RenderCursor, out: &mut Vec<StyledLine>) {
    let mut pending_inline: Vec<&DocNode> = Vec::new();
    for node in nodes {
        if node.is_inline() {
            pending_inline.push(node);
            continue;
        }
        flush_inline(&mut pending_inline, LineKind::Body, cursor.depth, out);
        render_block(node, cursor, out);
    }
    flush_inline(&mut pending_inline, LineKind::Body, cursor.depth, out);
}

fn flush_inline(
    pending: &mut Vec<&DocNode>,
    kind: LineKind,
    depth: usize,
    out: &mut Vec<StyledLine>,
) {
    if pending.is_empty() {
        return;
    }
    let owned: Vec<DocNode> = pending.drain(..).cloned().collect();
    push_inline_lines(&owned, kind, depth, None, out);
}

fn render_block(node: &DocNode, cursor: RenderCursor, out: &mut Vec<StyledLine>) {
    match node {
        DocNode::Heading { level, children } => {
            push_inline_lines(children, LineKind::Heading(*level), cursor.depth, None, out);
        }
        DocNode::Paragraph(children) => {
            if children.iter().all(DocNode::is_inline) {
                push_inline_lines(children, LineKind::Body, cursor.depth, None, out);
            } else {
                render_blocks(children, cursor, out);
            }
        }
        DocNode::List { ordered, items } => {
            let mut item_cursor = RenderCursor {
                depth: cursor.depth,
                counter: 0,
            };
            for item in items {
                item_cursor = item_cursor.next_item();
                render_list_item(item, *ordered, item_cursor, out);
            }
        }
        DocNode::Table(rows) => {
            for row in rows {
                out.push(StyledLine {
                    kind: LineKind::TableRow,
                    depth: cursor.depth,
                    runs: vec![StyledRun {
                        text: row.join(" | "),
                        ..StyledRun::default()
                    }],
                });
            }
        }
        DocNode::PageBreak => out.push(StyledLine {
            kind: LineKind::PageBreak,
            depth: cursor.depth,
            runs: Vec::new(),
        }),
        DocNode::Unknown(children) => render_blocks(children, cursor, out),
        DocNode::Text(_) | DocNode::Strong(_) | DocNode::Emphasis(_) | DocNode::LineBreak => {
            push_inline_lines(std::slice::from_ref(node), LineKind::Body, cursor.depth, None, out);
        }
    }
}

fn render_list_item(
    item: &[DocNode],
    ordered: bool,
    cursor: RenderCursor,
    out: &mut Vec<StyledLine>,
) {
    let marker = if ordered {
        format!("{}. ", cursor.counter)
    } else {
        "• ".to_string()
    };

    let split = item.iter().position(|n| !n.is_inline()).unwrap_or(item.len());
    let (inline, rest) = item.split_at(split);

    // A paragraph directly inside an item acts as its first line.
    let (head, rest): (Vec<DocNode>, &[DocNode]) = match (inline.is_empty(), rest.first()) {
        (true, Some(DocNode::Paragraph(children))) if children.iter().all(DocNode::is_inline) => {
            (children.clone(), &rest[1..])
        }
        _ => (inline.to_vec(), rest),
    };

    push_inline_lines(&head, LineKind::ListItem, cursor.depth, Some(marker), out);
    render_blocks(rest, cursor.nested(), out);
}

/// Emit one line per `LineBreak`-separated segment of inline nodes.
fn push_inline_lines(
    nodes: &[DocNode],
    kind: LineKind,
    depth: usize,
    marker: Option<String>,
    out: &mut Vec<StyledLine>,
) {
    let mut lines: Vec<Vec<StyledRun>> = vec![Vec::new()];
    collect_runs(nodes, InlineStyle::default(), &mut lines);

    for (i, mut runs) in lines.into_iter().enumerate() {
        if i == 0 {
            if let Some(m) = &marker {
                runs.insert(
                    0,
                    StyledRun {
                        text: m.clone(),
                        ..StyledRun::default()
                    },
                );
            }
        }
        out.push(StyledLine { kind, depth, runs });
    }
}

fn collect_runs(nodes: &[DocNode], style: InlineStyle, lines: &mut Vec<Vec<StyledRun>>) {
    for node in nodes {
        match node {
            DocNode::Text(t) => {
                if t.is_empty() {
                    continue;
                }
                if let Some(current) = lines.last_mut() {
                    match current.last_mut() {
                        Some(last) if last.bold == style.bold && last.italic == style.italic => {
                            last.text.push_str(t)
                        }
                        _ => current.push(StyledRun {
                            text: t.clone(),
                            bold: style.bold,
                            italic: style.italic,
                        }),
                    }
                }
            }
            DocNode::Strong(children) => collect_runs(
                children,
                InlineStyle {
                    bold: true,
                    ..style
                },
                lines,
            ),
            DocNode::Emphasis(children) => collect_runs(
                children,
                InlineStyle {
                    italic: true,
                    ..style
                },
                lines,
            ),
            DocNode::LineBreak => lines.push(Vec::new()),
            DocNode::Heading { children, .. }
            | DocNode::Paragraph(children)
            | DocNode::Unknown(children) => collect_runs(children, style, lines),
            DocNode::List { items, .. } => {
                for item in items {
                    collect_runs(item, style, lines);
                }
            }
            DocNode::Table(rows) => {
                for row in rows {
                    collect_runs(&[DocNode::text(row.join(" | ")), DocNode::LineBreak], style, lines);
                }
            }
            DocNode::PageBreak => {}
        }
    }
}

// ── Builders ─────────────────────────────────────────────────────────────────

/// One paragraph per input line; blank lines become empty paragraphs.
pub fn text_to_nodes(text: &str) -> Vec<DocNode> {
    text.split('\n')
        .map(|line| {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                DocNode::Paragraph(Vec::new())
            } else {
                DocNode::paragraph(line)
            }
        })
        .collect()
}

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.*)$").unwrap());
static RE_LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)([-*+•]|\d+[.)])\s+(.*)$").unwrap());
static RE_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\*{3,}|-{3,}|_{3,})$").unwrap());
static RE_INLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__|\*([^*\s][^*]*?)\*").unwrap());

/// Parse Markdown-lite (as produced by OCR engines) into a node tree.
///
/// Recognises ATX headings, `-`/`*`/`1.` lists (nested by indentation),
/// pipe tables, `**bold**`, `__bold__` and `*italic*`. Consecutive text lines
/// form one paragraph with line breaks preserved.
pub fn parse_markdown(md: &str) -> Vec<DocNode> {
    let lines: Vec<&str> = md.lines().collect();
    let mut nodes = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();

        if trimmed.is_empty() || RE_RULE.is_match(trimmed) {
            flush_paragraph(&mut paragraph, &mut nodes);
            i += 1;
            continue;
        }

        if let Some(caps) = RE_HEADING.captures(trimmed) {
            flush_paragraph(&mut paragraph, &mut nodes);
            nodes.push(DocNode::Heading {
                level: caps[1].len() as u8,
                children: parse_inline(caps[2].trim()),
            });
            i += 1;
            continue;
        }

        if trimmed.starts_with('|') || (trimmed.contains('|') && next_is_pipe(&lines, i)) {
            let start = i;
            while i < lines.len() && lines[i].contains('|') && !lines[i].trim().is_empty() {
                i += 1;
            }
            if i - start > 1 {
                flush_paragraph(&mut paragraph, &mut nodes);
                let block = lines[start..i].join("\n");
                nodes.push(DocNode::Table(parse_text_to_grid(&block)));
                continue;
            }
            i = start;
        }

        if RE_LIST_ITEM.is_match(line) {
            flush_paragraph(&mut paragraph, &mut nodes);
            let start = i;
            while i < lines.len() && RE_LIST_ITEM.is_match(lines[i]) {
                i += 1;
            }
            let items: Vec<ListEntry> = lines[start..i]
                .iter()
                .filter_map(|l| {
                    RE_LIST_ITEM.captures(l).map(|c| {
                        let indent = c.get(1).map_or(0, |m| m.as_str().len());
                        let ordered = c[2].starts_with(|ch: char| ch.is_ascii_digit());
                        let text = c.get(3).map_or("", |m| m.as_str());
                        ListEntry {
                            level: indent,
                            ordered,
                            children: parse_inline(text),
                        }
                    })
                })
                .collect();
            nodes.extend(build_list(items));
            continue;
        }

        paragraph.push(trimmed);
        i += 1;
    }
    flush_paragraph(&mut paragraph, &mut nodes);
    nodes
}

fn next_is_pipe(lines: &[&str], i: usize) -> bool {
    lines.get(i + 1).is_some_and(|l| l.contains('|'))
}

fn flush_paragraph(paragraph: &mut Vec<&str>, nodes: &mut Vec<DocNode>) {
    if paragraph.is_empty() {
        return;
    }
    let mut children = Vec::new();
    for (i, line) in paragraph.drain(..).enumerate() {
        if i > 0 {
            children.push(DocNode::LineBreak);
        }
        children.extend(parse_inline(line));
    }
    nodes.push(DocNode::Paragraph(children));
}

/// One list paragraph before nesting is resolved.
#[derive(Debug, Clone)]
pub struct ListEntry {
    /// Indentation or list level; larger means deeper.
    pub level: usize,
    pub ordered: bool,
    pub children: Vec<DocNode>,
}

/// Nest a flat run of list entries into a list node; deeper entries become
/// sublists of the preceding item.
pub fn build_list(entries: Vec<ListEntry>) -> Option<DocNode> {
    if entries.is_empty() {
        return None;
    }
    let mut iter = entries.into_iter().peekable();
    Some(build_list_level(&mut iter))
}

fn build_list_level<I>(iter: &mut std::iter::Peekable<I>) -> DocNode
where
    I: Iterator<Item = ListEntry>,
{
    let (base_level, ordered) = match iter.peek() {
        Some(first) => (first.level, first.ordered),
        None => (0, false),
    };
    let mut items: Vec<Vec<DocNode>> = Vec::new();

    while let Some(next) = iter.peek() {
        if next.level < base_level {
            break;
        }
        if next.level > base_level {
            let sub = build_list_level(iter);
            match items.last_mut() {
                Some(last) => last.push(sub),
                None => items.push(vec![sub]),
            }
            continue;
        }
        if let Some(entry) = iter.next() {
            items.push(entry.children);
        }
    }

    DocNode::List { ordered, items }
}

/// Split a line into text, strong and emphasis nodes.
pub fn parse_inline(text: &str) -> Vec<DocNode> {
    let mut nodes = Vec::new();
    let mut last = 0;
    for caps in RE_INLINE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            nodes.push(DocNode::text(&text[last..whole.start()]));
        }
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
            nodes.push(DocNode::Strong(vec![DocNode::text(m.as_str())]));
        } else if let Some(m) = caps.get(3) {
            nodes.push(DocNode::Emphasis(vec![DocNode::text(m.as_str())]));
        }
        last = whole.end();
    }
    if last < text.len() {
        nodes.push(DocNode::text(&text[last..]));
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &[StyledLine]) -> Vec<String> {
        lines.iter().map(StyledLine::text).collect()
    }

    #[test]
    fn ordered_numbering_resets_per_list() {
        let list = |n: usize| DocNode::List {
            ordered: true,
            items: (0..n).map(|i| vec![DocNode::text(format!("item {i}"))]).collect(),
        };
        let lines = render_lines(&[list(2), DocNode::paragraph("between"), list(2)]);
        assert_eq!(
            texts(&lines),
            vec!["1. item 0", "2. item 1", "between", "1. item 0", "2. item 1"]
        );
    }

    #[test]
    fn nested_lists_increase_depth() {
        let nested = DocNode::List {
            ordered: false,
            items: vec![vec![DocNode::text("inner")]],
        };
        let outer = DocNode::List {
            ordered: true,
            items: vec![vec![DocNode::text("outer"), nested], vec![DocNode::text("next")]],
        };
        let lines = render_lines(&[outer]);
        assert_eq!(texts(&lines), vec!["1. outer", "• inner", "2. next"]);
        assert_eq!(lines[0].depth, 0);
        assert_eq!(lines[1].depth, 1);
        assert_eq!(lines[2].depth, 0);
    }

    #[test]
    fn unknown_nodes_keep_their_text() {
        let para = DocNode::Paragraph(vec![
            DocNode::text("see "),
            DocNode::Unknown(vec![DocNode::text("the link")]),
            DocNode::text(" here"),
        ]);
        assert_eq!(to_plain_text(&[para]), "see the link here");
    }

    #[test]
    fn styles_split_runs() {
        let para = DocNode::Paragraph(vec![
            DocNode::text("a "),
            DocNode::Strong(vec![DocNode::text("b")]),
            DocNode::Emphasis(vec![DocNode::Strong(vec![DocNode::text("c")])]),
        ]);
        let lines = render_lines(&[para]);
        assert_eq!(lines.len(), 1);
        let runs = &lines[0].runs;
        assert_eq!(runs.len(), 3);
        assert!(runs[1].bold && !runs[1].italic);
        assert!(runs[2].bold && runs[2].italic);
    }

    #[test]
    fn line_breaks_and_tables() {
        let nodes = vec![
            DocNode::Paragraph(vec![DocNode::text("x"), DocNode::LineBreak, DocNode::text("y")]),
            DocNode::Table(vec![vec!["a".into(), "b".into()]]),
            DocNode::PageBreak,
        ];
        let lines = render_lines(&nodes);
        assert_eq!(texts(&lines), vec!["x", "y", "a | b", ""]);
        assert_eq!(lines[2].kind, LineKind::TableRow);
        assert_eq!(lines[3].kind, LineKind::PageBreak);
    }

    #[test]
    fn parse_markdown_structures() {
        let md = "# Title\n\nIntro **bold** and *it*\nsecond line\n\n- a\n- b\n  1. b1\n\n| h1 | h2 |\n|---|---|\n| 1 | 2 |\n";
        let nodes = parse_markdown(md);
        assert_eq!(nodes[0], DocNode::heading(1, "Title"));
        match &nodes[1] {
            DocNode::Paragraph(children) => {
                assert!(children.contains(&DocNode::Strong(vec![DocNode::text("bold")])));
                assert!(children.contains(&DocNode::Emphasis(vec![DocNode::text("it")])));
                assert!(children.contains(&DocNode::LineBreak));
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
        match &nodes[2] {
            DocNode::List { ordered, items } => {
                assert!(!ordered);
                assert_eq!(items.len(), 2);
                assert!(matches!(items[1].last(), Some(DocNode::List { ordered: true, .. })));
            }
            other => panic!("expected list, got {other:?}"),
        }
        assert_eq!(
            nodes[3],
            DocNode::Table(vec![
                vec!["h1".to_string(), "h2".to_string()],
                vec!["1".to_string(), "2".to_string()]
            ])
        );
    }

    #[test]
    fn text_to_nodes_keeps_blank_lines() {
        let nodes = text_to_nodes("a\n\nb");
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[1], DocNode::Paragraph(Vec::new()));
        assert_eq!(to_plain_text(&nodes), "a\n\nb");
    }
}
