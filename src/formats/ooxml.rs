//! OOXML package plumbing shared by the Word, Excel and PowerPoint code.
//!
//! Office documents are ZIP archives of XML parts. Readers open the archive
//! from memory and pull parts by name; writers assemble parts through
//! [`PackageWriter`]. XML event handling matches on local names so the
//! namespace prefixes a producer picked (`w:`, `a:`, none) do not matter.

use quick_xml::events::BytesStart;
use quick_xml::Reader as XmlReader;
use std::borrow::Cow;
use std::io::{Cursor, Read, Seek, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Open an in-memory OOXML package.
pub fn open_package(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>, String> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("not a valid OOXML package: {e}"))
}

/// Names of every entry in the archive, in archive order.
pub fn entry_names<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Vec<String> {
    (0..archive.len())
        .filter_map(|i| archive.by_index(i).ok().map(|f| f.name().to_string()))
        .collect()
}

/// Read one part as UTF-8; `Ok(None)` when the part does not exist.
pub fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, String> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(format!("{name}: {e}")),
    };
    let mut buf = String::new();
    entry
        .read_to_string(&mut buf)
        .map_err(|e| format!("{name}: {e}"))?;
    Ok(Some(buf))
}

/// Read a part that must exist.
pub fn require_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String, String> {
    read_part(archive, name)?.ok_or_else(|| format!("missing part {name}"))
}

fn split_tag_name(name: &[u8]) -> (Option<&[u8]>, &[u8]) {
    if let Some(idx) = name.iter().position(|b| *b == b':') {
        (Some(&name[..idx]), &name[idx + 1..])
    } else {
        (None, name)
    }
}

/// Tag or attribute name without its namespace prefix.
pub fn local_name(name: &[u8]) -> &[u8] {
    split_tag_name(name).1
}

/// Unescaped value of the attribute whose local name is `key`.
pub fn attr_value<B>(reader: &XmlReader<B>, element: &BytesStart, key: &[u8]) -> Option<String> {
    for attr in element.attributes().with_checks(false) {
        let attr = attr.ok()?;
        if local_name(attr.key.as_ref()) == key {
            if let Ok(value) = attr.decode_and_unescape_value(reader) {
                return Some(value.into_owned());
            }
        }
    }
    None
}

/// Escape text for element content or attribute values.
///
/// Control characters that XML 1.0 forbids are dropped.
pub fn escape_xml(text: &str) -> Cow<'_, str> {
    if text.chars().any(is_forbidden_char) {
        let cleaned: String = text.chars().filter(|c| !is_forbidden_char(*c)).collect();
        Cow::Owned(quick_xml::escape::escape(&cleaned).into_owned())
    } else {
        quick_xml::escape::escape(text)
    }
}

fn is_forbidden_char(c: char) -> bool {
    (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r')
}

/// Builds an OOXML (ZIP) package in memory.
pub struct PackageWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
}

impl Default for PackageWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageWriter {
    pub fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    /// Add a deflated part.
    pub fn add(&mut self, name: &str, content: &str) -> Result<(), String> {
        self.add_bytes(name, content.as_bytes())
    }

    /// Add a deflated binary entry.
    pub fn add_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<(), String> {
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        self.zip
            .start_file(name, options)
            .map_err(|e| format!("{name}: {e}"))?;
        self.zip.write_all(bytes).map_err(|e| format!("{name}: {e}"))
    }

    /// Finish the archive and return its bytes.
    pub fn finish(mut self) -> Result<Vec<u8>, String> {
        self.zip
            .finish()
            .map(Cursor::into_inner)
            .map_err(|e| format!("finalising package: {e}"))
    }
}

/// `<?xml ...?>` declaration used by every generated part.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_round_trip() {
        let mut w = PackageWriter::new();
        w.add("a/b.xml", "<x>1</x>").unwrap();
        w.add("c.xml", "<y/>").unwrap();
        let bytes = w.finish().unwrap();

        let mut archive = open_package(&bytes).unwrap();
        assert_eq!(entry_names(&mut archive), vec!["a/b.xml", "c.xml"]);
        assert_eq!(read_part(&mut archive, "a/b.xml").unwrap().as_deref(), Some("<x>1</x>"));
        assert_eq!(read_part(&mut archive, "missing.xml").unwrap(), None);
        assert!(require_part(&mut archive, "missing.xml").is_err());
    }

    #[test]
    fn garbage_is_not_a_package() {
        assert!(open_package(b"definitely not a zip").is_err());
    }

    #[test]
    fn local_name_strips_prefix() {
        assert_eq!(local_name(b"w:p"), b"p");
        assert_eq!(local_name(b"sheet"), b"sheet");
    }

    #[test]
    fn escape_handles_markup_and_control_chars() {
        assert_eq!(escape_xml("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
        assert_eq!(escape_xml("x\u{0001}y"), "xy");
        assert_eq!(escape_xml("tab\tok"), "tab\tok");
    }
}
