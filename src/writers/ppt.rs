//! PPTX writer.
//!
//! Produces a minimal PresentationML package: one slide master, one blank
//! layout, one theme and a 16:9 slide size (9144000 × 5143500 EMU). Slides
//! are either text (optional 24pt bold title, up to [`MAX_LINES_PER_SLIDE`]
//! body lines at 14pt) or tables.
//!
//! Table slides repeat the header row on every slide and mark continuation
//! slides with `(cont.)`. The font shrinks with the column count (12pt up to
//! six columns, 10pt up to ten, 8pt beyond) and the number of rows per
//! slide follows from the font size.

use crate::error::DocMatrixError;
use crate::format::TargetFormat;
use crate::formats::grid::{is_blank_row, rectangularize, Grid};
use crate::formats::ooxml::{escape_xml, PackageWriter, XML_DECLARATION};
use crate::formats::{Sheet, Slide, NO_EXTRACTED_TEXT};
use crate::writers::layout::EMPTY_SLIDE_TEXT;
use std::fmt::Write as _;

pub const SLIDE_WIDTH_EMU: u64 = 9_144_000;
pub const SLIDE_HEIGHT_EMU: u64 = 5_143_500;
pub const MAX_LINES_PER_SLIDE: usize = 15;

const EMU_PER_INCH: u64 = 914_400;
const EMU_PER_POINT: u64 = 12_700;
const MARGIN_EMU: u64 = EMU_PER_INCH / 2;
const TITLE_TOP_EMU: u64 = 228_600;
const TITLE_HEIGHT_EMU: u64 = 685_800;
const BODY_TOP_EMU: u64 = 1_005_840;
const BOTTOM_GAP_EMU: u64 = 342_900;
/// 9 inches.
const CONTENT_WIDTH_EMU: u64 = 8_229_600;

const TEXT_COLOR: &str = "363636";
const HEADER_FILL: &str = "DC2626";

const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const P_NS: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// One slide to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideSpec {
    pub title: Option<String>,
    pub body: SlideBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideBody {
    Lines(Vec<String>),
    /// First row is the header.
    Table { rows: Grid, font_size: u32 },
}

impl SlideSpec {
    pub fn text(title: Option<String>, lines: Vec<String>) -> Self {
        Self {
            title,
            body: SlideBody::Lines(lines),
        }
    }
}

/// Font size for a table with `columns` columns.
pub fn table_font_size(columns: usize) -> u32 {
    match columns {
        0..=6 => 12,
        7..=10 => 10,
        _ => 8,
    }
}

fn row_height_emu(font_size: u32) -> u64 {
    u64::from(font_size) * 2 * EMU_PER_POINT
}

/// Table rows (header included) that fit on one slide.
pub fn table_rows_per_slide(font_size: u32) -> usize {
    let available = SLIDE_HEIGHT_EMU - BODY_TOP_EMU - BOTTOM_GAP_EMU;
    ((available / row_height_emu(font_size)) as usize).max(2)
}

/// Text slides of at most [`MAX_LINES_PER_SLIDE`] non-blank lines each.
pub fn text_slides(text: &str) -> Vec<SlideSpec> {
    let lines: Vec<String> = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect();
    if lines.is_empty() {
        return vec![SlideSpec::text(None, vec![NO_EXTRACTED_TEXT.to_string()])];
    }
    lines
        .chunks(MAX_LINES_PER_SLIDE)
        .map(|chunk| SlideSpec::text(None, chunk.to_vec()))
        .collect()
}

/// One or more slides per source slide, keeping titles.
pub fn deck_slides(slides: &[Slide]) -> Vec<SlideSpec> {
    let mut out = Vec::new();
    for slide in slides {
        let title = slide.title.trim();
        let body: Vec<String> = slide
            .body
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        if slide.is_empty() {
            out.push(SlideSpec::text(None, vec![EMPTY_SLIDE_TEXT.to_string()]));
            continue;
        }
        let title = (!title.is_empty()).then(|| title.to_string());
        if body.is_empty() {
            out.push(SlideSpec::text(title, Vec::new()));
            continue;
        }
        for (i, chunk) in body.chunks(MAX_LINES_PER_SLIDE).enumerate() {
            let t = match (&title, i) {
                (Some(t), 0) => Some(t.clone()),
                (Some(t), _) => Some(format!("{t} (cont.)")),
                (None, _) => None,
            };
            out.push(SlideSpec::text(t, chunk.to_vec()));
        }
    }
    if out.is_empty() {
        out.push(SlideSpec::text(None, vec![NO_EXTRACTED_TEXT.to_string()]));
    }
    out
}

/// Table slides for each sheet, header repeated on every slide.
pub fn table_slides(sheets: &[Sheet]) -> Vec<SlideSpec> {
    let mut out = Vec::new();
    for sheet in sheets {
        let mut rows: Grid = sheet.rows.iter().filter(|r| !is_blank_row(r)).cloned().collect();
        if rows.is_empty() {
            out.push(SlideSpec::text(
                Some(sheet.name.clone()),
                vec![NO_EXTRACTED_TEXT.to_string()],
            ));
            continue;
        }
        let columns = rectangularize(&mut rows);
        let font_size = table_font_size(columns);
        let per_slide = table_rows_per_slide(font_size) - 1;

        let header = rows.remove(0);
        let chunks: Vec<&[Vec<String>]> = if rows.is_empty() {
            vec![&rows[..]]
        } else {
            rows.chunks(per_slide).collect()
        };
        for (i, chunk) in chunks.into_iter().enumerate() {
            let title = if i == 0 {
                sheet.name.clone()
            } else {
                format!("{} (cont.)", sheet.name)
            };
            let mut slide_rows = Vec::with_capacity(chunk.len() + 1);
            slide_rows.push(header.clone());
            slide_rows.extend(chunk.iter().cloned());
            out.push(SlideSpec {
                title: Some(title),
                body: SlideBody::Table {
                    rows: slide_rows,
                    font_size,
                },
            });
        }
    }
    if out.is_empty() {
        out.push(SlideSpec::text(None, vec![NO_EXTRACTED_TEXT.to_string()]));
    }
    out
}

/// Build a `.pptx` from slide specs.
pub fn write_pptx(slides: &[SlideSpec]) -> Result<Vec<u8>, DocMatrixError> {
    let placeholder;
    let slides = if slides.is_empty() {
        placeholder = vec![SlideSpec::text(None, vec![NO_EXTRACTED_TEXT.to_string()])];
        &placeholder[..]
    } else {
        slides
    };

    let fail = |e: String| DocMatrixError::encoding(TargetFormat::Ppt, e);
    let mut package = PackageWriter::new();
    package
        .add("[Content_Types].xml", &content_types(slides.len()))
        .map_err(fail)?;
    package.add("_rels/.rels", &package_rels()).map_err(fail)?;
    package
        .add("ppt/presentation.xml", &presentation(slides.len()))
        .map_err(fail)?;
    package
        .add("ppt/_rels/presentation.xml.rels", &presentation_rels(slides.len()))
        .map_err(fail)?;
    package
        .add("ppt/slideMasters/slideMaster1.xml", &slide_master())
        .map_err(fail)?;
    package
        .add(
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            &rels(&[
                ("slideLayout", "../slideLayouts/slideLayout1.xml"),
                ("theme", "../theme/theme1.xml"),
            ]),
        )
        .map_err(fail)?;
    package
        .add("ppt/slideLayouts/slideLayout1.xml", &slide_layout())
        .map_err(fail)?;
    package
        .add(
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            &rels(&[("slideMaster", "../slideMasters/slideMaster1.xml")]),
        )
        .map_err(fail)?;
    package.add("ppt/theme/theme1.xml", &theme()).map_err(fail)?;

    for (i, slide) in slides.iter().enumerate() {
        let n = i + 1;
        package
            .add(&format!("ppt/slides/slide{n}.xml"), &slide_xml(slide))
            .map_err(fail)?;
        package
            .add(
                &format!("ppt/slides/_rels/slide{n}.xml.rels"),
                &rels(&[("slideLayout", "../slideLayouts/slideLayout1.xml")]),
            )
            .map_err(fail)?;
    }
    package.finish().map_err(fail)
}

// ── Slide XML ───────────────────────────────────────────────────────────────

const EMPTY_GROUP: &str = r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#;

fn slide_xml(slide: &SlideSpec) -> String {
    let mut shapes = String::new();
    let mut next_id = 2;

    let body_top = if let Some(title) = &slide.title {
        let paragraph = text_paragraph(title, 2400, true);
        shapes.push_str(&text_shape(
            next_id,
            "Title",
            (MARGIN_EMU, TITLE_TOP_EMU, CONTENT_WIDTH_EMU, TITLE_HEIGHT_EMU),
            &paragraph,
        ));
        next_id += 1;
        BODY_TOP_EMU
    } else {
        MARGIN_EMU
    };
    let body_height = SLIDE_HEIGHT_EMU - body_top - BOTTOM_GAP_EMU;

    match &slide.body {
        SlideBody::Lines(lines) if !lines.is_empty() => {
            let paragraphs: String = lines.iter().map(|l| text_paragraph(l, 1400, false)).collect();
            shapes.push_str(&text_shape(
                next_id,
                "Body",
                (MARGIN_EMU, body_top, CONTENT_WIDTH_EMU, body_height),
                &paragraphs,
            ));
        }
        SlideBody::Lines(_) => {}
        SlideBody::Table { rows, font_size } => {
            shapes.push_str(&table_frame(next_id, rows, *font_size, body_top));
        }
    }

    format!(
        r#"{XML_DECLARATION}<p:sld xmlns:a="{A_NS}" xmlns:r="{R_NS}" xmlns:p="{P_NS}"><p:cSld><p:spTree>{EMPTY_GROUP}{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
    )
}

fn run_properties(size_hundredths: u32, bold: bool, color: &str) -> String {
    let bold = if bold { r#" b="1""# } else { "" };
    format!(
        r#"<a:rPr lang="en-US" sz="{size_hundredths}"{bold} dirty="0"><a:solidFill><a:srgbClr val="{color}"/></a:solidFill></a:rPr>"#
    )
}

fn text_paragraph(text: &str, size_hundredths: u32, bold: bool) -> String {
    format!(
        "<a:p><a:r>{}<a:t>{}</a:t></a:r></a:p>",
        run_properties(size_hundredths, bold, TEXT_COLOR),
        escape_xml(text)
    )
}

fn text_shape(id: u32, name: &str, (x, y, cx, cy): (u64, u64, u64, u64), paragraphs: &str) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name} {id}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr><p:txBody><a:bodyPr wrap="square" rtlCol="0"><a:normAutofit/></a:bodyPr><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#
    )
}

fn table_frame(id: u32, rows: &[Vec<String>], font_size: u32, top: u64) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(1).max(1);
    let column_width = CONTENT_WIDTH_EMU / columns as u64;
    let row_height = row_height_emu(font_size);
    let size = font_size * 100;

    let mut xml = format!(
        r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="{id}" name="Table {id}"/><p:cNvGraphicFramePr><a:graphicFrameLocks noGrp="1"/></p:cNvGraphicFramePr><p:nvPr/></p:nvGraphicFramePr><p:xfrm><a:off x="{MARGIN_EMU}" y="{top}"/><a:ext cx="{CONTENT_WIDTH_EMU}" cy="{}"/></p:xfrm><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table"><a:tbl><a:tblPr firstRow="1" bandRow="1"/><a:tblGrid>"#,
        row_height * rows.len() as u64
    );
    for _ in 0..columns {
        let _ = write!(xml, r#"<a:gridCol w="{column_width}"/>"#);
    }
    xml.push_str("</a:tblGrid>");

    for (r, row) in rows.iter().enumerate() {
        let header = r == 0;
        let _ = write!(xml, r#"<a:tr h="{row_height}">"#);
        for c in 0..columns {
            let cell = row.get(c).map(String::as_str).unwrap_or("");
            let paragraph = if cell.is_empty() {
                format!(r#"<a:p><a:endParaRPr lang="en-US" sz="{size}"/></a:p>"#)
            } else {
                let color = if header { "FFFFFF" } else { TEXT_COLOR };
                format!(
                    "<a:p><a:r>{}<a:t>{}</a:t></a:r></a:p>",
                    run_properties(size, header, color),
                    escape_xml(cell)
                )
            };
            let fill = if header {
                format!(r#"<a:solidFill><a:srgbClr val="{HEADER_FILL}"/></a:solidFill>"#)
            } else {
                String::new()
            };
            let _ = write!(
                xml,
                "<a:tc><a:txBody><a:bodyPr/><a:lstStyle/>{paragraph}</a:txBody><a:tcPr>{fill}</a:tcPr></a:tc>"
            );
        }
        xml.push_str("</a:tr>");
    }
    xml.push_str("</a:tbl></a:graphicData></a:graphic></p:graphicFrame>");
    xml
}

// ── Package parts ───────────────────────────────────────────────────────────

fn rels(targets: &[(&str, &str)]) -> String {
    let mut xml = format!(r#"{XML_DECLARATION}<Relationships xmlns="{REL_NS}">"#);
    for (i, (kind, target)) in targets.iter().enumerate() {
        let _ = write!(
            xml,
            r#"<Relationship Id="rId{}" Type="{R_NS}/{kind}" Target="{target}"/>"#,
            i + 1
        );
    }
    xml.push_str("</Relationships>");
    xml
}

fn package_rels() -> String {
    rels(&[("officeDocument", "ppt/presentation.xml")])
}

fn presentation_rels(slide_count: usize) -> String {
    let mut targets: Vec<(&str, String)> = vec![
        ("slideMaster", "slideMasters/slideMaster1.xml".to_string()),
        ("theme", "theme/theme1.xml".to_string()),
    ];
    for n in 1..=slide_count {
        targets.push(("slide", format!("slides/slide{n}.xml")));
    }
    let borrowed: Vec<(&str, &str)> = targets.iter().map(|(k, t)| (*k, t.as_str())).collect();
    rels(&borrowed)
}

fn presentation(slide_count: usize) -> String {
    let mut ids = String::new();
    for i in 0..slide_count {
        // rId1 and rId2 are the master and the theme.
        let _ = write!(ids, r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 3);
    }
    format!(
        r#"{XML_DECLARATION}<p:presentation xmlns:a="{A_NS}" xmlns:r="{R_NS}" xmlns:p="{P_NS}" saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{ids}</p:sldIdLst><p:sldSz cx="{SLIDE_WIDTH_EMU}" cy="{SLIDE_HEIGHT_EMU}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#
    )
}

fn content_types(slide_count: usize) -> String {
    let ml = "application/vnd.openxmlformats-officedocument";
    let mut xml = format!(
        r#"{XML_DECLARATION}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="{ml}.presentationml.presentation.main+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="{ml}.presentationml.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="{ml}.presentationml.slideLayout+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="{ml}.theme+xml"/>"#
    );
    for n in 1..=slide_count {
        let _ = write!(
            xml,
            r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="{ml}.presentationml.slide+xml"/>"#
        );
    }
    xml.push_str("</Types>");
    xml
}

fn slide_master() -> String {
    format!(
        r#"{XML_DECLARATION}<p:sldMaster xmlns:a="{A_NS}" xmlns:r="{R_NS}" xmlns:p="{P_NS}"><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree>{EMPTY_GROUP}</p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst><p:txStyles><p:titleStyle/><p:bodyStyle/><p:otherStyle/></p:txStyles></p:sldMaster>"#
    )
}

fn slide_layout() -> String {
    format!(
        r#"{XML_DECLARATION}<p:sldLayout xmlns:a="{A_NS}" xmlns:r="{R_NS}" xmlns:p="{P_NS}" type="blank" preserve="1"><p:cSld name="Blank"><p:spTree>{EMPTY_GROUP}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
    )
}

fn theme() -> String {
    let accents = ["4F81BD", "C0504D", "9BBB59", "8064A2", "4BACC6", "F79646"];
    let mut colors = String::from(
        r#"<a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="1F497D"/></a:dk2><a:lt2><a:srgbClr val="EEECE1"/></a:lt2>"#,
    );
    for (i, rgb) in accents.iter().enumerate() {
        let _ = write!(colors, r#"<a:accent{n}><a:srgbClr val="{rgb}"/></a:accent{n}>"#, n = i + 1);
    }
    colors.push_str(r#"<a:hlink><a:srgbClr val="0000FF"/></a:hlink><a:folHlink><a:srgbClr val="800080"/></a:folHlink>"#);

    let font = r#"<a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/>"#;
    let fill = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#.repeat(3);
    let line = r#"<a:ln w="9525"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>"#.repeat(3);
    let effect = "<a:effectStyle><a:effectLst/></a:effectStyle>".repeat(3);

    format!(
        r#"{XML_DECLARATION}<a:theme xmlns:a="{A_NS}" name="Office Theme"><a:themeElements><a:clrScheme name="Office">{colors}</a:clrScheme><a:fontScheme name="Office"><a:majorFont>{font}</a:majorFont><a:minorFont>{font}</a:minorFont></a:fontScheme><a:fmtScheme name="Office"><a:fillStyleLst>{fill}</a:fillStyleLst><a:lnStyleLst>{line}</a:lnStyleLst><a:effectStyleLst>{effect}</a:effectStyleLst><a:bgFillStyleLst>{fill}</a:bgFillStyleLst></a:fmtScheme></a:themeElements><a:objectDefaults/><a:extraClrSchemeLst/></a:theme>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::ooxml::{entry_names, open_package, require_part};
    use crate::readers::ppt::read_presentation;

    fn grid(n: usize, columns: usize) -> Grid {
        (0..n)
            .map(|r| (0..columns).map(|c| format!("r{r}c{c}")).collect())
            .collect()
    }

    #[test]
    fn text_slides_hold_fifteen_lines() {
        let text = (1..=40).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n\n");
        let slides = text_slides(&text);
        assert_eq!(slides.len(), 3);
        match &slides[2].body {
            SlideBody::Lines(lines) => assert_eq!(lines.len(), 10),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn written_deck_reads_back_in_order() {
        let slides = vec![
            SlideSpec::text(Some("Intro".into()), vec!["hello".into()]),
            SlideSpec::text(Some("Next".into()), vec!["a & b".into()]),
        ];
        let bytes = write_pptx(&slides).unwrap();
        let read = read_presentation("out.pptx", &bytes).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].title, "Intro");
        assert_eq!(read[1].body, vec!["a & b"]);
    }

    #[test]
    fn package_has_required_parts() {
        let bytes = write_pptx(&[]).unwrap();
        let mut archive = open_package(&bytes).unwrap();
        let names = entry_names(&mut archive);
        for part in [
            "[Content_Types].xml",
            "ppt/presentation.xml",
            "ppt/slideMasters/slideMaster1.xml",
            "ppt/slideLayouts/slideLayout1.xml",
            "ppt/theme/theme1.xml",
            "ppt/slides/slide1.xml",
        ] {
            assert!(names.iter().any(|n| n == part), "missing {part}");
        }
    }

    #[test]
    fn table_font_shrinks_with_columns() {
        assert_eq!(table_font_size(3), 12);
        assert_eq!(table_font_size(6), 12);
        assert_eq!(table_font_size(7), 10);
        assert_eq!(table_font_size(10), 10);
        assert_eq!(table_font_size(11), 8);
        assert!(table_rows_per_slide(8) > table_rows_per_slide(12));
    }

    #[test]
    fn table_slides_repeat_header() {
        let mut rows = vec![vec!["Name".to_string(), "Qty".to_string()]];
        rows.extend(grid(40, 2));
        let slides = table_slides(&[Sheet::new("Stock", rows)]);
        assert!(slides.len() > 1);
        assert_eq!(slides[0].title.as_deref(), Some("Stock"));
        assert_eq!(slides[1].title.as_deref(), Some("Stock (cont.)"));

        let mut body_rows = Vec::new();
        for slide in &slides {
            match &slide.body {
                SlideBody::Table { rows, font_size } => {
                    assert_eq!(*font_size, 12);
                    assert_eq!(rows[0], vec!["Name".to_string(), "Qty".to_string()]);
                    assert!(rows.len() <= table_rows_per_slide(12));
                    body_rows.extend(rows[1..].iter().cloned());
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(body_rows, grid(40, 2));
    }

    #[test]
    fn ragged_tables_are_padded_on_every_slide() {
        let mut rows = vec![vec!["Header".to_string()]];
        rows.extend(grid(30, 3));
        rows.push(vec!["tail".to_string(), "x".to_string()]);
        let slides = table_slides(&[Sheet::new("Ragged", rows)]);
        assert!(slides.len() > 1);

        for slide in &slides {
            match &slide.body {
                SlideBody::Table { rows, .. } => {
                    assert!(rows.iter().all(|r| r.len() == 3), "{rows:?}");
                    assert_eq!(rows[0], vec!["Header".to_string(), String::new(), String::new()]);
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        let bytes = write_pptx(&slides).unwrap();
        let mut archive = open_package(&bytes).unwrap();
        let xml = require_part(&mut archive, "ppt/slides/slide1.xml").unwrap();
        let table_rows = xml.matches("<a:tr ").count();
        assert!(table_rows > 1);
        assert_eq!(xml.matches("<a:tc>").count(), table_rows * 3);
        assert_eq!(xml.matches("<a:gridCol ").count(), 3);
    }

    #[test]
    fn empty_slides_get_marker() {
        let slides = deck_slides(&[Slide {
            index: 1,
            title: String::new(),
            body: vec![],
        }]);
        assert_eq!(slides, vec![SlideSpec::text(None, vec![EMPTY_SLIDE_TEXT.to_string()])]);
    }
}
