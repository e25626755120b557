//! PPTX reader.
//!
//! Slides are the `ppt/slides/slideN.xml` parts, ordered by the number `N`
//! parsed from the part name. Archive enumeration order is lexicographic in
//! most producers (`slide1`, `slide10`, `slide11`, `slide2`, ...) and is never
//! used for ordering.
//!
//! Within a slide, `<a:t>` runs of one `<a:p>` paragraph are concatenated;
//! the first non-empty paragraph is the title, the rest is the body.

use crate::error::DocMatrixError;
use crate::format::{SourceDocument, SourceFormat};
use crate::formats::ooxml::{entry_names, local_name, open_package, require_part};
use crate::formats::Slide;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use regex::Regex;
use std::io::Cursor;
use tracing::debug;

static RE_SLIDE_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ppt/slides/slide(\d+)\.xml$").unwrap());

/// Read all slides of a presentation in slide order.
pub fn extract_slides(doc: &SourceDocument) -> Result<Vec<Slide>, DocMatrixError> {
    read_presentation(&doc.name, &doc.bytes)
}

/// Read all slides of a presentation from memory.
pub fn read_presentation(name: &str, bytes: &[u8]) -> Result<Vec<Slide>, DocMatrixError> {
    let fail = |detail: String| DocMatrixError::extraction(name, SourceFormat::Ppt, detail);
    let mut archive = open_package(bytes).map_err(fail)?;

    let parts = slide_parts(&entry_names(&mut archive));
    if parts.is_empty() {
        return Err(fail("no slides found".into()));
    }

    let mut slides = Vec::with_capacity(parts.len());
    for (position, (number, part)) in parts.into_iter().enumerate() {
        let xml = require_part(&mut archive, &part).map_err(fail)?;
        let paragraphs = slide_paragraphs(&xml).map_err(fail)?;
        debug!("'{}' slide {} (part {}): {} paragraphs", name, position + 1, number, paragraphs.len());

        let mut iter = paragraphs.into_iter();
        let title = iter.next().unwrap_or_default();
        slides.push(Slide {
            index: position + 1,
            title,
            body: iter.collect(),
        });
    }
    Ok(slides)
}

/// Slide part names sorted by their embedded number.
pub fn slide_parts(names: &[String]) -> Vec<(u32, String)> {
    let mut parts: Vec<(u32, String)> = names
        .iter()
        .filter_map(|n| {
            RE_SLIDE_PART
                .captures(n)
                .and_then(|c| c[1].parse::<u32>().ok())
                .map(|num| (num, n.clone()))
        })
        .collect();
    parts.sort_by_key(|(num, _)| *num);
    parts
}

/// Non-empty paragraph texts of one slide, in document order.
fn slide_paragraphs(xml: &str) -> Result<Vec<String>, String> {
    let mut reader = XmlReader::from_reader(Cursor::new(xml.as_bytes()));
    reader.trim_text(false);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_paragraph = false;
    let mut in_text = false;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"p" => {
                    in_paragraph = true;
                    current.clear();
                }
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) if local_name(e.name().as_ref()) == b"br" && in_paragraph => {
                current.push(' ');
            }
            Ok(Event::Text(t)) if in_text => {
                let text = t
                    .unescape()
                    .unwrap_or_else(|_| String::from_utf8_lossy(t.as_ref()));
                if in_paragraph {
                    current.push_str(&text);
                } else if !text.trim().is_empty() {
                    paragraphs.push(text.trim().to_string());
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"t" => in_text = false,
                b"p" => {
                    in_paragraph = false;
                    let text = current.trim();
                    if !text.is_empty() {
                        paragraphs.push(text.to_string());
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => return Err(format!("slide parse failed: {err}")),
            _ => {}
        }
    }
    Ok(paragraphs)
}
