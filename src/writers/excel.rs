//! XLSX writer.
//!
//! Writes sheets as SpreadsheetML with inline strings, so no shared-string
//! table is needed. Grids are rectangularised before encoding. Column widths
//! follow the longest cell of each column: `min(50, max_len + 2)`, or a flat
//! 20 when the first row is empty.
//!
//! Sheet names are made valid for Excel: the characters `[ ] : * ? / \` are
//! removed, names are cut to 31 characters and duplicates get a ` (n)`
//! suffix.

use crate::error::DocMatrixError;
use crate::format::TargetFormat;
use crate::formats::grid::{is_blank_row, rectangularize};
use crate::formats::ooxml::{escape_xml, PackageWriter, XML_DECLARATION};
use crate::formats::{Sheet, NO_EXTRACTED_TEXT};
use std::collections::HashSet;
use std::fmt::Write as _;

pub const MAX_SHEET_NAME: usize = 31;
pub const MAX_COLUMN_WIDTH: usize = 50;
pub const DEFAULT_COLUMN_WIDTH: usize = 20;

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Build a `.xlsx` from sheets.
pub fn write_xlsx(sheets: &[Sheet]) -> Result<Vec<u8>, DocMatrixError> {
    let placeholder;
    let sheets = if sheets.is_empty() {
        placeholder = vec![Sheet::new("Sheet1", vec![vec![NO_EXTRACTED_TEXT.to_string()]])];
        &placeholder[..]
    } else {
        sheets
    };
    let names = unique_sheet_names(sheets.iter().map(|s| s.name.as_str()));

    let fail = |e: String| DocMatrixError::encoding(TargetFormat::Excel, e);
    let mut package = PackageWriter::new();
    package
        .add("[Content_Types].xml", &content_types(sheets.len()))
        .map_err(fail)?;
    package.add("_rels/.rels", &package_rels()).map_err(fail)?;
    package.add("xl/workbook.xml", &workbook(&names)).map_err(fail)?;
    package
        .add("xl/_rels/workbook.xml.rels", &workbook_rels(sheets.len()))
        .map_err(fail)?;
    package.add("xl/styles.xml", &styles()).map_err(fail)?;
    for (i, sheet) in sheets.iter().enumerate() {
        package
            .add(&format!("xl/worksheets/sheet{}.xml", i + 1), &worksheet(sheet))
            .map_err(fail)?;
    }
    package.finish().map_err(fail)
}

/// Strip characters Excel rejects and cut to 31 characters.
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'');
    let cut: String = cleaned.chars().take(MAX_SHEET_NAME).collect();
    if cut.trim().is_empty() {
        "Sheet".to_string()
    } else {
        cut
    }
}

/// Sanitised names, de-duplicated case-insensitively with ` (n)` suffixes.
pub fn unique_sheet_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    names
        .into_iter()
        .map(|raw| {
            let base = sanitize_sheet_name(raw);
            let mut candidate = base.clone();
            let mut n = 2;
            while seen.contains(&candidate.to_lowercase()) {
                let suffix = format!(" ({n})");
                let keep = MAX_SHEET_NAME.saturating_sub(suffix.chars().count());
                candidate = format!("{}{suffix}", base.chars().take(keep).collect::<String>());
                n += 1;
            }
            seen.insert(candidate.to_lowercase());
            candidate
        })
        .collect()
}

/// Column widths in characters for a rectangular grid.
pub fn column_widths(rows: &[Vec<String>]) -> Vec<usize> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let first_empty = rows.first().map_or(true, |r| is_blank_row(r));
    (0..columns)
        .map(|c| {
            if first_empty {
                return DEFAULT_COLUMN_WIDTH;
            }
            let longest = rows
                .iter()
                .filter_map(|r| r.get(c))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0);
            (longest + 2).min(MAX_COLUMN_WIDTH)
        })
        .collect()
}

/// `0` → `A`, `25` → `Z`, `26` → `AA`.
pub fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// The sheet's rows padded to its widest row.
fn padded_rows(sheet: &Sheet) -> Vec<Vec<String>> {
    let mut rows = sheet.rows.clone();
    rectangularize(&mut rows);
    rows
}

fn worksheet(sheet: &Sheet) -> String {
    let rows = padded_rows(sheet);

    let mut xml = format!(r#"{XML_DECLARATION}<worksheet xmlns="{MAIN_NS}" xmlns:r="{R_NS}">"#);
    let widths = column_widths(&rows);
    if !widths.is_empty() {
        xml.push_str("<cols>");
        for (i, width) in widths.iter().enumerate() {
            let _ = write!(
                xml,
                r#"<col min="{n}" max="{n}" width="{width}" customWidth="1"/>"#,
                n = i + 1
            );
        }
        xml.push_str("</cols>");
    }

    xml.push_str("<sheetData>");
    for (r, row) in rows.iter().enumerate() {
        let _ = write!(xml, r#"<row r="{}">"#, r + 1);
        for (c, cell) in row.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            let _ = write!(
                xml,
                r#"<c r="{}{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                column_letter(c),
                r + 1,
                escape_xml(cell)
            );
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn workbook(names: &[String]) -> String {
    let mut xml = format!(r#"{XML_DECLARATION}<workbook xmlns="{MAIN_NS}" xmlns:r="{R_NS}"><sheets>"#);
    for (i, name) in names.iter().enumerate() {
        let _ = write!(
            xml,
            r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
            escape_xml(name),
            n = i + 1
        );
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn workbook_rels(sheet_count: usize) -> String {
    let mut xml = format!(
        r#"{XML_DECLARATION}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#
    );
    for n in 1..=sheet_count {
        let _ = write!(
            xml,
            r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{n}.xml"/>"#
        );
    }
    let _ = write!(
        xml,
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#,
        sheet_count + 1
    );
    xml
}

fn content_types(sheet_count: usize) -> String {
    let mut xml = format!(
        r#"{XML_DECLARATION}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#
    );
    for n in 1..=sheet_count {
        let _ = write!(
            xml,
            r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        );
    }
    xml.push_str("</Types>");
    xml
}

fn package_rels() -> String {
    format!(
        r#"{XML_DECLARATION}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
    )
}

fn styles() -> String {
    format!(
        r#"{XML_DECLARATION}<styleSheet xmlns="{MAIN_NS}"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs></styleSheet>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::excel::read_workbook;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn round_trip_through_calamine() {
        let sheets = vec![
            Sheet::new("People", vec![row(&["Name", "Age"]), row(&["Alice", "30"]), row(&["Bob"])]),
            Sheet::new("Notes", vec![row(&["a < b & c"])]),
        ];
        let bytes = write_xlsx(&sheets).unwrap();
        let read = read_workbook("out.xlsx", &bytes).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].name, "People");
        assert_eq!(read[0].rows[1], row(&["Alice", "30"]));
        assert_eq!(read[0].rows[2], row(&["Bob"]));
        assert_eq!(read[1].rows, vec![row(&["a < b & c"])]);
    }

    #[test]
    fn widths_follow_longest_cell() {
        let rows = vec![row(&["id", "description"]), row(&["1", &"x".repeat(80)])];
        assert_eq!(column_widths(&rows), vec![4, MAX_COLUMN_WIDTH]);
    }

    #[test]
    fn widths_default_when_first_row_empty() {
        let rows = vec![row(&["", ""]), row(&["value", "other"])];
        assert_eq!(column_widths(&rows), vec![DEFAULT_COLUMN_WIDTH; 2]);
    }

    #[test]
    fn sheet_names_are_sanitised_and_unique() {
        let names = unique_sheet_names(["Q1/Q2: [draft]", "Data", "data", &"L".repeat(40), ""]);
        assert_eq!(names[0], "Q1Q2 draft");
        assert_eq!(names[1], "Data");
        assert_eq!(names[2], "data (2)");
        assert_eq!(names[3].chars().count(), MAX_SHEET_NAME);
        assert_eq!(names[4], "Sheet");
    }

    #[test]
    fn long_duplicates_stay_within_limit() {
        let long = "N".repeat(40);
        let names = unique_sheet_names([long.as_str(), long.as_str()]);
        assert_ne!(names[0], names[1]);
        assert!(names[1].ends_with(" (2)"));
        assert_eq!(names[1].chars().count(), MAX_SHEET_NAME);
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn short_first_row_is_padded_to_the_widest() {
        let sheet = Sheet::new(
            "Ragged",
            vec![row(&["Title"]), row(&["a", "b", "c"]), row(&["d", "e"])],
        );
        let rows = padded_rows(&sheet);
        assert!(rows.iter().all(|r| r.len() == 3));
        assert_eq!(rows[0], row(&["Title", "", ""]));

        let xml = worksheet(&sheet);
        assert_eq!(xml.matches("<col ").count(), 3);
        assert!(xml.contains(r#"<c r="C2""#));

        let bytes = write_xlsx(&[sheet]).unwrap();
        let read = read_workbook("r.xlsx", &bytes).unwrap();
        assert_eq!(read[0].rows[1], row(&["a", "b", "c"]));
    }

    #[test]
    fn empty_workbook_gets_placeholder() {
        let bytes = write_xlsx(&[]).unwrap();
        let read = read_workbook("p.xlsx", &bytes).unwrap();
        assert_eq!(read[0].rows, vec![row(&[NO_EXTRACTED_TEXT])]);
    }
}
