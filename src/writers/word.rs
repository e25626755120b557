//! DOCX writer.
//!
//! Serialises a [`DocNode`] tree into a WordprocessingML package:
//!
//! * headings use the `Heading1`..`Heading6` paragraph styles defined in
//!   `word/styles.xml`;
//! * list items are indented paragraphs carrying a literal `1. ` or `• `
//!   prefix, so no numbering part is needed;
//! * tables get single-line borders and a bold first row;
//! * a [`DocNode::PageBreak`] becomes `pageBreakBefore` on the next
//!   paragraph.
//!
//! An empty tree produces one placeholder paragraph.

use crate::error::DocMatrixError;
use crate::format::TargetFormat;
use crate::formats::grid::rectangularize;
use crate::formats::markup::{to_plain_text, DocNode};
use crate::formats::ooxml::{escape_xml, PackageWriter, XML_DECLARATION};
use crate::formats::NO_EXTRACTED_TEXT;
use std::fmt::Write as _;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Text width of an A4 page with 1" margins, in twentieths of a point.
const TEXT_WIDTH_TWIPS: usize = 9026;
const LIST_INDENT_TWIPS: usize = 720;

/// Build a `.docx` from a node tree.
pub fn write_docx(nodes: &[DocNode]) -> Result<Vec<u8>, DocMatrixError> {
    let placeholder;
    let nodes = if to_plain_text(nodes).trim().is_empty() {
        placeholder = vec![DocNode::paragraph(NO_EXTRACTED_TEXT)];
        &placeholder[..]
    } else {
        nodes
    };

    let mut body = BodyWriter::default();
    body.blocks(nodes);
    let document = format!(
        r#"{XML_DECLARATION}<w:document xmlns:w="{W_NS}" xmlns:r="{R_NS}"><w:body>{}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#,
        body.xml
    );

    let fail = |e: String| DocMatrixError::encoding(TargetFormat::Word, e);
    let mut package = PackageWriter::new();
    package.add("[Content_Types].xml", &content_types()).map_err(fail)?;
    package.add("_rels/.rels", &package_rels()).map_err(fail)?;
    package
        .add("word/_rels/document.xml.rels", &document_rels())
        .map_err(fail)?;
    package.add("word/document.xml", &document).map_err(fail)?;
    package.add("word/styles.xml", &styles()).map_err(fail)?;
    package.finish().map_err(fail)
}

#[derive(Default)]
struct BodyWriter {
    xml: String,
    pending_break: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct RunStyle {
    bold: bool,
    italic: bool,
}

impl BodyWriter {
    fn blocks(&mut self, nodes: &[DocNode]) {
        let mut inline: Vec<&DocNode> = Vec::new();
        for node in nodes {
            if is_inline(node) {
                inline.push(node);
                continue;
            }
            self.flush_inline(&mut inline);
            self.block(node);
        }
        self.flush_inline(&mut inline);
    }

    fn flush_inline(&mut self, inline: &mut Vec<&DocNode>) {
        if inline.is_empty() {
            return;
        }
        let owned: Vec<DocNode> = inline.drain(..).cloned().collect();
        self.paragraph(None, None, &owned);
    }

    fn block(&mut self, node: &DocNode) {
        match node {
            DocNode::Heading { level, children } => {
                let style = format!("Heading{}", (*level).clamp(1, 6));
                self.paragraph(Some(&style), None, children);
            }
            DocNode::Paragraph(children) => {
                if children.iter().all(is_inline) {
                    self.paragraph(None, None, children);
                } else {
                    self.blocks(children);
                }
            }
            DocNode::List { ordered, items } => self.list(*ordered, items, 0),
            DocNode::Table(rows) => self.table(rows),
            DocNode::PageBreak => self.pending_break = true,
            DocNode::Unknown(children) => self.blocks(children),
            DocNode::Text(_) | DocNode::Strong(_) | DocNode::Emphasis(_) | DocNode::LineBreak => {
                self.paragraph(None, None, std::slice::from_ref(node));
            }
        }
    }

    fn list(&mut self, ordered: bool, items: &[Vec<DocNode>], depth: usize) {
        for (i, item) in items.iter().enumerate() {
            let marker = if ordered {
                format!("{}. ", i + 1)
            } else {
                "• ".to_string()
            };

            let split = item.iter().position(|n| !is_inline(n)).unwrap_or(item.len());
            let (head, rest) = item.split_at(split);
            let (mut head, rest): (Vec<DocNode>, &[DocNode]) = match (head.is_empty(), rest.first()) {
                (true, Some(DocNode::Paragraph(children))) if children.iter().all(is_inline) => {
                    (children.clone(), &rest[1..])
                }
                _ => (head.to_vec(), rest),
            };
            head.insert(0, DocNode::Text(marker));
            self.paragraph(None, Some(depth), &head);

            for node in rest {
                match node {
                    DocNode::List { ordered, items } => self.list(*ordered, items, depth + 1),
                    other => self.block(other),
                }
            }
        }
    }

    fn paragraph(&mut self, style: Option<&str>, list_depth: Option<usize>, children: &[DocNode]) {
        let mut props = String::new();
        if let Some(style) = style {
            let _ = write!(props, r#"<w:pStyle w:val="{style}"/>"#);
        }
        if std::mem::take(&mut self.pending_break) {
            props.push_str("<w:pageBreakBefore/>");
        }
        if let Some(depth) = list_depth {
            let _ = write!(
                props,
                r#"<w:ind w:left="{}" w:hanging="360"/>"#,
                LIST_INDENT_TWIPS * (depth + 1)
            );
        }

        self.xml.push_str("<w:p>");
        if !props.is_empty() {
            let _ = write!(self.xml, "<w:pPr>{props}</w:pPr>");
        }
        runs(children, RunStyle::default(), &mut self.xml);
        self.xml.push_str("</w:p>");
    }

    fn table(&mut self, rows: &[Vec<String>]) {
        let mut rows = rows.to_vec();
        let columns = rectangularize(&mut rows);
        if columns == 0 {
            return;
        }
        if std::mem::take(&mut self.pending_break) {
            self.xml
                .push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#);
        }

        let cell_width = TEXT_WIDTH_TWIPS / columns;
        let border = |side: &str| {
            format!(r#"<w:{side} w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#)
        };
        let borders: String = ["top", "left", "bottom", "right", "insideH", "insideV"]
            .iter()
            .map(|s| border(s))
            .collect();
        let _ = write!(
            self.xml,
            r#"<w:tbl><w:tblPr><w:tblW w:w="{TEXT_WIDTH_TWIPS}" w:type="dxa"/><w:tblBorders>{borders}</w:tblBorders></w:tblPr><w:tblGrid>"#
        );
        for _ in 0..columns {
            let _ = write!(self.xml, r#"<w:gridCol w:w="{cell_width}"/>"#);
        }
        self.xml.push_str("</w:tblGrid>");

        for (r, row) in rows.iter().enumerate() {
            self.xml.push_str("<w:tr>");
            for cell in row {
                let _ = write!(
                    self.xml,
                    r#"<w:tc><w:tcPr><w:tcW w:w="{cell_width}" w:type="dxa"/></w:tcPr><w:p>"#
                );
                if !cell.is_empty() {
                    run(cell, RunStyle { bold: r == 0, italic: false }, &mut self.xml);
                }
                self.xml.push_str("</w:p></w:tc>");
            }
            self.xml.push_str("</w:tr>");
        }
        self.xml.push_str("</w:tbl>");
    }
}

fn is_inline(node: &DocNode) -> bool {
    match node {
        DocNode::Text(_) | DocNode::Strong(_) | DocNode::Emphasis(_) | DocNode::LineBreak => true,
        DocNode::Unknown(children) => children.iter().all(is_inline),
        _ => false,
    }
}

fn runs(nodes: &[DocNode], style: RunStyle, out: &mut String) {
    for node in nodes {
        match node {
            DocNode::Text(text) => run(text, style, out),
            DocNode::Strong(children) => runs(children, RunStyle { bold: true, ..style }, out),
            DocNode::Emphasis(children) => runs(children, RunStyle { italic: true, ..style }, out),
            DocNode::LineBreak => out.push_str("<w:r><w:br/></w:r>"),
            DocNode::Heading { children, .. }
            | DocNode::Paragraph(children)
            | DocNode::Unknown(children) => runs(children, style, out),
            DocNode::List { items, .. } => {
                for item in items {
                    runs(item, style, out);
                }
            }
            DocNode::Table(rows) => {
                for row in rows {
                    run(&row.join("\t"), style, out);
                    out.push_str("<w:r><w:br/></w:r>");
                }
            }
            DocNode::PageBreak => {}
        }
    }
}

fn run(text: &str, style: RunStyle, out: &mut String) {
    if text.is_empty() {
        return;
    }
    out.push_str("<w:r>");
    if style.bold || style.italic {
        out.push_str("<w:rPr>");
        if style.bold {
            out.push_str("<w:b/>");
        }
        if style.italic {
            out.push_str("<w:i/>");
        }
        out.push_str("</w:rPr>");
    }
    let _ = write!(out, r#"<w:t xml:space="preserve">{}</w:t></w:r>"#, escape_xml(text));
}

fn content_types() -> String {
    format!(
        r#"{XML_DECLARATION}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#
    )
}

fn package_rels() -> String {
    format!(
        r#"{XML_DECLARATION}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#
    )
}

fn document_rels() -> String {
    format!(
        r#"{XML_DECLARATION}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#
    )
}

fn styles() -> String {
    // Half-point sizes per heading level.
    const HEADING_SIZES: [u32; 6] = [32, 28, 26, 24, 22, 22];
    let mut xml = format!(
        r#"{XML_DECLARATION}<w:styles xmlns:w="{W_NS}"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:cs="Calibri"/><w:sz w:val="22"/></w:rPr></w:rPrDefault><w:pPrDefault><w:pPr><w:spacing w:after="120"/></w:pPr></w:pPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>"#
    );
    for (i, size) in HEADING_SIZES.iter().enumerate() {
        let level = i + 1;
        let _ = write!(
            xml,
            r#"<w:style w:type="paragraph" w:styleId="Heading{level}"><w:name w:val="heading {level}"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="80"/><w:outlineLvl w:val="{i}"/></w:pPr><w:rPr><w:b/><w:sz w:val="{size}"/></w:rPr></w:style>"#
        );
    }
    xml.push_str("</w:styles>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::word::parse_docx;

    fn read_back(nodes: &[DocNode]) -> Vec<DocNode> {
        let bytes = write_docx(nodes).unwrap();
        parse_docx("out.docx", &bytes).unwrap().into_nodes()
    }

    #[test]
    fn headings_survive_a_round_trip() {
        let nodes = read_back(&[DocNode::heading(1, "Report"), DocNode::paragraph("Body text")]);
        assert_eq!(nodes[0], DocNode::heading(1, "Report"));
        assert_eq!(to_plain_text(&nodes[1..]), "Body text");
    }

    #[test]
    fn list_items_carry_prefixes() {
        let list = DocNode::List {
            ordered: true,
            items: vec![
                vec![DocNode::text("first")],
                vec![
                    DocNode::text("second"),
                    DocNode::List {
                        ordered: false,
                        items: vec![vec![DocNode::text("nested")]],
                    },
                ],
            ],
        };
        let bytes = write_docx(&[list]).unwrap();
        let text = parse_docx("l.docx", &bytes).unwrap().raw_text();
        assert_eq!(text, "1. first\n2. second\n• nested");
    }

    #[test]
    fn tables_are_rectangular() {
        let bytes = write_docx(&[DocNode::Table(vec![
            vec!["a".into(), "b".into()],
            vec!["c".into()],
        ])])
        .unwrap();
        let nodes = parse_docx("t.docx", &bytes).unwrap().into_nodes();
        assert_eq!(
            nodes,
            vec![DocNode::Table(vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string(), String::new()],
            ])]
        );
    }

    #[test]
    fn page_break_lands_on_next_paragraph() {
        let nodes = read_back(&[
            DocNode::paragraph("one"),
            DocNode::PageBreak,
            DocNode::paragraph("two"),
        ]);
        assert_eq!(nodes[1], DocNode::PageBreak);
        assert_eq!(to_plain_text(&nodes[2..]), "two");
    }

    #[test]
    fn markup_is_escaped() {
        let bytes = write_docx(&[DocNode::paragraph("a < b & \"c\"")]).unwrap();
        let text = parse_docx("e.docx", &bytes).unwrap().raw_text();
        assert_eq!(text, "a < b & \"c\"");
    }

    #[test]
    fn empty_tree_gets_placeholder() {
        let bytes = write_docx(&[]).unwrap();
        let text = parse_docx("p.docx", &bytes).unwrap().raw_text();
        assert_eq!(text, NO_EXTRACTED_TEXT);
    }
}
