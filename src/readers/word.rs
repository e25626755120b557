//! DOCX reader.
//!
//! `word/document.xml` is streamed with quick-xml into a flat list of blocks
//! (paragraphs and tables). Two views are derived from the blocks:
//!
//! * [`WordDocument::raw_text`]: paragraphs joined by `\n`, table rows as
//!   tab-joined cells so the grid normaliser can recover them.
//! * [`WordDocument::into_nodes`]: a [`DocNode`] tree. Heading levels come
//!   from `word/styles.xml`, list kinds from `word/numbering.xml`.
//!
//! Containers the reader does not model (hyperlinks, content controls,
//! smart tags, tracked insertions) become [`DocNode::Unknown`] so their text
//! survives.

use crate::error::DocMatrixError;
use crate::format::{SourceDocument, SourceFormat};
use crate::formats::markup::{build_list, DocNode, ListEntry};
use crate::formats::ooxml::{attr_value, local_name, open_package, read_part, require_part};
use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use std::collections::HashMap;
use std::io::Cursor;
use tracing::debug;

/// A parsed `.docx`.
#[derive(Debug, Clone, Default)]
pub struct WordDocument {
    blocks: Vec<Block>,
    heading_styles: HashMap<String, u8>,
    numbering: HashMap<(String, usize), bool>,
}

#[derive(Debug, Clone)]
enum Block {
    Paragraph(Para),
    Table(Vec<Vec<String>>),
}

#[derive(Debug, Clone, Default)]
struct Para {
    style_id: Option<String>,
    num_id: Option<String>,
    level: usize,
    page_break_before: bool,
    children: Vec<DocNode>,
}

/// Read the structured node tree of a Word document.
pub fn extract_markup(doc: &SourceDocument) -> Result<Vec<DocNode>, DocMatrixError> {
    Ok(parse_docx(&doc.name, &doc.bytes)?.into_nodes())
}

/// Read the raw text of a Word document.
pub fn extract_text(doc: &SourceDocument) -> Result<String, DocMatrixError> {
    Ok(parse_docx(&doc.name, &doc.bytes)?.raw_text())
}

/// Parse a `.docx` package from memory.
pub fn parse_docx(name: &str, bytes: &[u8]) -> Result<WordDocument, DocMatrixError> {
    let fail = |detail: String| DocMatrixError::extraction(name, SourceFormat::Word, detail);

    let mut archive = open_package(bytes).map_err(fail)?;
    let document = require_part(&mut archive, "word/document.xml").map_err(fail)?;
    let styles = read_part(&mut archive, "word/styles.xml").map_err(fail)?;
    let numbering = read_part(&mut archive, "word/numbering.xml").map_err(fail)?;

    let blocks = parse_document_xml(&document).map_err(fail)?;
    let heading_styles = styles
        .map(|s| parse_heading_styles(&s))
        .transpose()
        .map_err(fail)?
        .unwrap_or_default();
    let numbering = numbering
        .map(|s| parse_numbering(&s))
        .transpose()
        .map_err(fail)?
        .unwrap_or_default();

    debug!(
        "'{}': {} blocks, {} heading styles, {} numbering levels",
        name,
        blocks.len(),
        heading_styles.len(),
        numbering.len()
    );

    Ok(WordDocument {
        blocks,
        heading_styles,
        numbering,
    })
}

impl WordDocument {
    /// Number of paragraphs and tables.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Paragraph text joined by newlines; table rows tab-joined.
    pub fn raw_text(&self) -> String {
        let mut lines = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Paragraph(p) => lines.push(inline_text(&p.children)),
                Block::Table(rows) => {
                    lines.extend(rows.iter().map(|row| row.join("\t")));
                }
            }
        }
        lines.join("\n").trim().to_string()
    }

    /// Structured view of the document.
    pub fn into_nodes(self) -> Vec<DocNode> {
        let mut nodes = Vec::new();
        let mut list_run: Vec<ListEntry> = Vec::new();

        for block in self.blocks {
            let para = match block {
                Block::Table(rows) => {
                    nodes.extend(build_list(std::mem::take(&mut list_run)));
                    nodes.push(DocNode::Table(rows));
                    continue;
                }
                Block::Paragraph(p) => p,
            };

            if para.page_break_before {
                nodes.extend(build_list(std::mem::take(&mut list_run)));
                nodes.push(DocNode::PageBreak);
            }

            if let Some(num_id) = para.num_id.as_ref().filter(|id| id.as_str() != "0") {
                let ordered = self
                    .numbering
                    .get(&(num_id.clone(), para.level))
                    .copied()
                    .unwrap_or(false);
                list_run.push(ListEntry {
                    level: para.level,
                    ordered,
                    children: para.children,
                });
                continue;
            }

            nodes.extend(build_list(std::mem::take(&mut list_run)));

            let level = para
                .style_id
                .as_ref()
                .and_then(|id| self.heading_styles.get(id).copied().or_else(|| heading_level(id)));
            match level {
                Some(level) if !para.children.is_empty() => nodes.push(DocNode::Heading {
                    level,
                    children: para.children,
                }),
                _ => nodes.push(DocNode::Paragraph(para.children)),
            }
        }
        nodes.extend(build_list(list_run));
        nodes
    }
}

/// Text of inline nodes with line breaks as `\n`.
fn inline_text(nodes: &[DocNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            DocNode::Text(t) => out.push_str(t),
            DocNode::LineBreak => out.push('\n'),
            DocNode::Strong(c) | DocNode::Emphasis(c) | DocNode::Unknown(c) => {
                out.push_str(&inline_text(c))
            }
            _ => {}
        }
    }
    out
}

/// `Heading3` / `heading 3` → 3; `Title` → 1.
fn heading_level(name: &str) -> Option<u8> {
    let lower = name.to_ascii_lowercase().replace(' ', "");
    if lower == "title" {
        return Some(1);
    }
    lower
        .strip_prefix("heading")
        .and_then(|n| n.parse::<u8>().ok())
        .filter(|n| (1..=6).contains(n))
}

fn is_on(value: Option<String>) -> bool {
    !matches!(value.as_deref(), Some("0") | Some("false") | Some("off"))
}

// ── document.xml ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct DocState {
    blocks: Vec<Block>,
    para: Option<Para>,
    /// Open inline containers inside the current paragraph.
    containers: Vec<Vec<DocNode>>,
    in_run: bool,
    bold: bool,
    italic: bool,
    in_text: bool,
    table_depth: usize,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: Vec<String>,
}

impl DocState {
    fn push_inline(&mut self, node: DocNode) {
        if let Some(top) = self.containers.last_mut() {
            top.push(node);
        } else if let Some(p) = self.para.as_mut() {
            p.children.push(node);
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() || self.para.is_none() {
            return;
        }
        let mut node = DocNode::text(text);
        if self.italic {
            node = DocNode::Emphasis(vec![node]);
        }
        if self.bold {
            node = DocNode::Strong(vec![node]);
        }
        self.push_inline(node);
    }

    fn end_paragraph(&mut self) {
        while let Some(children) = self.containers.pop() {
            self.push_inline(DocNode::Unknown(children));
        }
        let Some(para) = self.para.take() else { return };
        if self.table_depth > 0 {
            let text = inline_text(&para.children);
            if !text.trim().is_empty() {
                self.cell.push(text.trim().to_string());
            }
        } else {
            self.blocks.push(Block::Paragraph(para));
        }
    }
}

fn is_inline_container(name: &[u8]) -> bool {
    matches!(
        name,
        b"hyperlink" | b"sdt" | b"smartTag" | b"ins" | b"fldSimple" | b"customXml"
    )
}

fn parse_document_xml(xml: &str) -> Result<Vec<Block>, String> {
    let mut reader = XmlReader::from_reader(Cursor::new(xml.as_bytes()));
    reader.trim_text(false);
    let mut buf = Vec::new();
    let mut st = DocState::default();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"p" => st.para = Some(Para::default()),
                b"r" => {
                    st.in_run = true;
                    st.bold = false;
                    st.italic = false;
                }
                b"t" if st.in_run => st.in_text = true,
                b"b" if st.in_run => st.bold = is_on(attr_value(&reader, e, b"val")),
                b"i" if st.in_run => st.italic = is_on(attr_value(&reader, e, b"val")),
                b"tbl" => {
                    if st.table_depth == 0 {
                        st.rows.clear();
                    }
                    st.table_depth += 1;
                }
                b"tr" if st.table_depth == 1 => st.row.clear(),
                b"tc" if st.table_depth == 1 => st.cell.clear(),
                name if st.para.is_some() && is_inline_container(name) => {
                    st.containers.push(Vec::new())
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match local_name(e.name().as_ref()) {
                b"pStyle" => {
                    let val = attr_value(&reader, e, b"val");
                    if let Some(p) = st.para.as_mut() {
                        p.style_id = val;
                    }
                }
                b"numId" => {
                    let val = attr_value(&reader, e, b"val");
                    if let Some(p) = st.para.as_mut() {
                        p.num_id = val;
                    }
                }
                b"ilvl" => {
                    let val = attr_value(&reader, e, b"val").and_then(|v| v.parse().ok());
                    if let Some(p) = st.para.as_mut() {
                        p.level = val.unwrap_or(0);
                    }
                }
                b"pageBreakBefore" => {
                    let on = is_on(attr_value(&reader, e, b"val"));
                    if let Some(p) = st.para.as_mut() {
                        p.page_break_before = on;
                    }
                }
                b"b" if st.in_run => st.bold = is_on(attr_value(&reader, e, b"val")),
                b"i" if st.in_run => st.italic = is_on(attr_value(&reader, e, b"val")),
                b"tab" if st.in_run => st.push_text("\t"),
                b"br" | b"cr" if st.in_run => {
                    if attr_value(&reader, e, b"type").as_deref() == Some("page") {
                        st.push_inline(DocNode::PageBreak);
                    } else {
                        st.push_inline(DocNode::LineBreak);
                    }
                }
                b"p" => {
                    st.para = Some(Para::default());
                    st.end_paragraph();
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if st.in_text {
                    let text = t
                        .unescape()
                        .unwrap_or_else(|_| String::from_utf8_lossy(t.as_ref()));
                    st.push_text(&text);
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"t" => st.in_text = false,
                b"r" => st.in_run = false,
                b"p" => st.end_paragraph(),
                b"tc" if st.table_depth == 1 => {
                    let cell = st.cell.join(" ");
                    st.row.push(cell);
                }
                b"tr" if st.table_depth == 1 => {
                    let row = std::mem::take(&mut st.row);
                    st.rows.push(row);
                }
                b"tbl" => {
                    st.table_depth = st.table_depth.saturating_sub(1);
                    if st.table_depth == 0 {
                        let rows = std::mem::take(&mut st.rows);
                        st.blocks.push(Block::Table(rows));
                    }
                }
                name if st.para.is_some() && is_inline_container(name) => {
                    if let Some(children) = st.containers.pop() {
                        st.push_inline(DocNode::Unknown(children));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => return Err(format!("document.xml parse failed: {err}")),
            _ => {}
        }
    }

    Ok(st.blocks)
}

// ── styles.xml / numbering.xml ───────────────────────────────────────────────

/// Map of style id → heading level for every heading-like style.
fn parse_heading_styles(xml: &str) -> Result<HashMap<String, u8>, String> {
    let mut reader = XmlReader::from_reader(Cursor::new(xml.as_bytes()));
    let mut buf = Vec::new();
    let mut map = HashMap::new();
    let mut current: Option<String> = None;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if local_name(e.name().as_ref()) == b"style" => {
                current = attr_value(&reader, e, b"styleId");
            }
            Ok(Event::Empty(ref e)) if local_name(e.name().as_ref()) == b"name" => {
                if let (Some(id), Some(name)) = (current.as_ref(), attr_value(&reader, e, b"val")) {
                    if let Some(level) = heading_level(&name) {
                        map.insert(id.clone(), level);
                    }
                }
            }
            Ok(Event::End(ref e)) if local_name(e.name().as_ref()) == b"style" => current = None,
            Ok(Event::Eof) => break,
            Err(err) => return Err(format!("styles.xml parse failed: {err}")),
            _ => {}
        }
    }
    Ok(map)
}

/// Map of (numId, ilvl) → ordered.
fn parse_numbering(xml: &str) -> Result<HashMap<(String, usize), bool>, String> {
    let mut reader = XmlReader::from_reader(Cursor::new(xml.as_bytes()));
    let mut buf = Vec::new();

    // abstractNumId → ilvl → ordered
    let mut abstract_levels: HashMap<String, HashMap<usize, bool>> = HashMap::new();
    // numId → abstractNumId
    let mut nums: Vec<(String, String)> = Vec::new();

    let mut current_abstract: Option<String> = None;
    let mut current_level: Option<usize> = None;
    let mut current_num: Option<String> = None;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"abstractNum" => current_abstract = attr_value(&reader, e, b"abstractNumId"),
                b"lvl" => {
                    current_level = attr_value(&reader, e, b"ilvl").and_then(|v| v.parse().ok())
                }
                b"num" => current_num = attr_value(&reader, e, b"numId"),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match local_name(e.name().as_ref()) {
                b"numFmt" => {
                    if let (Some(abs), Some(level)) = (current_abstract.as_ref(), current_level) {
                        let fmt = attr_value(&reader, e, b"val").unwrap_or_default();
                        let ordered = !matches!(fmt.as_str(), "bullet" | "none" | "");
                        abstract_levels
                            .entry(abs.clone())
                            .or_default()
                            .insert(level, ordered);
                    }
                }
                b"abstractNumId" => {
                    if let (Some(num), Some(abs)) =
                        (current_num.as_ref(), attr_value(&reader, e, b"val"))
                    {
                        nums.push((num.clone(), abs));
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"abstractNum" => current_abstract = None,
                b"lvl" => current_level = None,
                b"num" => current_num = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => return Err(format!("numbering.xml parse failed: {err}")),
            _ => {}
        }
    }

    let mut map = HashMap::new();
    for (num, abs) in nums {
        if let Some(levels) = abstract_levels.get(&abs) {
            for (level, ordered) in levels {
                map.insert((num.clone(), *level), *ordered);
            }
        }
    }
    Ok(map)
}
