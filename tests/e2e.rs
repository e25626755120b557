//! End-to-end integration tests for edgequake-docmatrix.
//!
//! Everything here runs in-process. Image sources use a stub OCR engine
//! injected through the config, so no network access is needed. Tests that
//! write or rasterise PDFs need the pdfium shared library and skip when it
//! cannot be bound.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use async_trait::async_trait;
use edgequake_docmatrix::formats::ooxml::PackageWriter;
use edgequake_docmatrix::formats::{Sheet, Slide, NO_EXTRACTED_TEXT, NO_TEXT_FOUND};
use edgequake_docmatrix::pipeline::engine::pdfium_available;
use edgequake_docmatrix::readers;
use edgequake_docmatrix::writers::excel::write_xlsx;
use edgequake_docmatrix::writers::layout::{max_lines_per_page, plan_text, LayoutSettings, PageSize};
use edgequake_docmatrix::writers::ppt::{deck_slides, write_pptx};
use edgequake_docmatrix::{
    batch_archive_name, convert, convert_stream, merge, package_batch, ConversionConfig,
    ConversionProgressCallback, ConversionRegistry, ConversionResult, DocMatrixError,
    FileErrorKind, FileStatus, OcrEngine, OcrRequest, Orchestrator, Orientation, SourceDocument,
    SourceFormat, TargetFormat, Tool, TOOL_MATRIX,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

// ── Test helpers ─────────────────────────────────────────────────────────────

macro_rules! pdfium_or_skip {
    () => {
        if !pdfium_available() {
            println!("SKIP: pdfium library not available");
            return;
        }
    };
}

/// Returns fixed text, except for file names containing "bad", which get
/// text that fails the OCR quality check.
struct StubOcr {
    text: &'static str,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubOcr {
    fn new(text: &'static str) -> Arc<Self> {
        Self::slow(text, Duration::ZERO)
    }

    fn slow(text: &'static str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            text,
            delay,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl OcrEngine for StubOcr {
    async fn recognize(&self, request: &OcrRequest) -> Result<String, DocMatrixError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if request.name.contains("bad") {
            return Ok("~~ .. ~~".to_string());
        }
        Ok(self.text.to_string())
    }

    fn name(&self) -> &str {
        "stub"
    }
}

#[derive(Default)]
struct Recorder {
    batches: AtomicUsize,
    errors: AtomicUsize,
    progress: Mutex<HashMap<Uuid, Vec<u8>>>,
}

impl ConversionProgressCallback for Recorder {
    fn on_file_progress(&self, file_id: Uuid, percent: u8) {
        self.progress
            .lock()
            .unwrap()
            .entry(file_id)
            .or_default()
            .push(percent);
    }

    fn on_file_error(&self, _file_id: Uuid, _name: &str, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    fn on_batch_complete(&self, _batch_id: Uuid, _files: usize) {
        self.batches.fetch_add(1, Ordering::SeqCst);
    }
}

fn config_with(engine: Arc<dyn OcrEngine>, recorder: Option<Arc<Recorder>>) -> ConversionConfig {
    let mut builder = ConversionConfig::builder().ocr_engine(engine);
    if let Some(recorder) = recorder {
        builder = builder.progress_callback(recorder);
    }
    builder.build().unwrap()
}

fn png(name: &str) -> SourceDocument {
    let mut bytes = Vec::new();
    image::RgbImage::from_pixel(8, 8, image::Rgb([255, 255, 255]))
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    SourceDocument::new(name, SourceFormat::Image, bytes)
}

fn xlsx(name: &str, sheets: &[Sheet]) -> SourceDocument {
    SourceDocument::new(name, SourceFormat::Excel, write_xlsx(sheets).unwrap())
}

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

fn docx_text(result: &ConversionResult) -> String {
    let doc = SourceDocument::new("out.docx", SourceFormat::Word, result.as_bytes().unwrap().to_vec());
    readers::word::extract_text(&doc).unwrap()
}

// ── Registry ────────────────────────────────────────────────────────────────

#[test]
fn every_advertised_tool_has_a_route() {
    let registry = ConversionRegistry::standard();
    assert_eq!(TOOL_MATRIX.len(), 30);
    assert!(registry.validate(&TOOL_MATRIX).is_ok());
    for tool in TOOL_MATRIX {
        assert_ne!(tool.from as usize, tool.to as usize, "{} maps onto itself", tool.id());
        assert!(registry.supports(tool.from, tool.to), "missing {}", tool.id());
    }
}

#[tokio::test]
async fn same_format_conversion_is_rejected() {
    let doc = SourceDocument::text("a.txt", "hello");
    let err = convert(doc, TargetFormat::Text, &ConversionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DocMatrixError::UnsupportedConversion { .. }));
}

// ── Round trips through the office formats ──────────────────────────────────

#[tokio::test]
async fn tab_separated_text_round_trips_through_excel() {
    let config = ConversionConfig::default();
    let doc = SourceDocument::text("people.txt", "Name\tAge\nAlice\t30\nBob\t25");
    let workbook = convert(doc, TargetFormat::Excel, &config).await.unwrap();
    assert_eq!(workbook.filename(), "people_converted.xlsx");

    let back = SourceDocument::new(
        "people_converted.xlsx",
        SourceFormat::Excel,
        workbook.as_bytes().unwrap().to_vec(),
    );
    let text = convert(back, TargetFormat::Text, &config).await.unwrap();
    assert_eq!(
        text.as_text().unwrap(),
        "--- Sheet: Sheet1 ---\nName\tAge\nAlice\t30\nBob\t25"
    );
}

#[tokio::test]
async fn markdown_separator_rows_never_reach_the_workbook() {
    let doc = SourceDocument::text("t.txt", "a|b\n---|---\n1|2");
    let result = convert(doc, TargetFormat::Excel, &ConversionConfig::default())
        .await
        .unwrap();
    let sheets = readers::excel::read_workbook("t.xlsx", result.as_bytes().unwrap()).unwrap();
    assert_eq!(sheets[0].rows, vec![row(&["a", "b"]), row(&["1", "2"])]);
}

#[tokio::test]
async fn word_document_keeps_its_text_through_ppt() {
    let config = ConversionConfig::default();
    let doc = SourceDocument::text("notes.txt", "First line\nSecond line");
    let word = convert(doc, TargetFormat::Word, &config).await.unwrap();
    let word_doc = SourceDocument::new("notes.docx", SourceFormat::Word, word.as_bytes().unwrap().to_vec());
    let deck = convert(word_doc, TargetFormat::Ppt, &config).await.unwrap();
    let slides = readers::ppt::read_presentation("notes.pptx", deck.as_bytes().unwrap()).unwrap();
    let all: Vec<String> = slides
        .iter()
        .flat_map(|s| std::iter::once(s.title.clone()).chain(s.body.iter().cloned()))
        .collect();
    assert!(all.contains(&"First line".to_string()), "got {all:?}");
    assert!(all.contains(&"Second line".to_string()), "got {all:?}");
}

// ── Slide ordering ──────────────────────────────────────────────────────────

#[tokio::test]
async fn slides_follow_part_numbers_not_archive_order() {
    let mut package = PackageWriter::new();
    let mut numbers: Vec<u32> = (1..=11).collect();
    numbers.sort_by_key(|n| n.to_string());
    for n in numbers {
        let xml = format!(
            r#"<p:sld xmlns:p="p" xmlns:a="a"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>Title {n}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#
        );
        package.add(&format!("ppt/slides/slide{n}.xml"), &xml).unwrap();
    }
    let bytes = package.finish().unwrap();
    let doc = SourceDocument::new("deck.pptx", SourceFormat::Ppt, bytes);

    let text = convert(doc, TargetFormat::Text, &ConversionConfig::default())
        .await
        .unwrap();
    let titles: Vec<&str> = text
        .as_text()
        .unwrap()
        .lines()
        .filter(|l| l.starts_with("Title "))
        .collect();
    let expected: Vec<String> = (1..=11).map(|n| format!("Title {n}")).collect();
    assert_eq!(titles, expected);
}

#[test]
fn deck_slides_keep_titles_in_order() {
    let slides: Vec<Slide> = (1..=3)
        .map(|i| Slide {
            index: i,
            title: format!("T{i}"),
            body: vec![format!("body {i}")],
        })
        .collect();
    let bytes = write_pptx(&deck_slides(&slides)).unwrap();
    let back = readers::ppt::read_presentation("d.pptx", &bytes).unwrap();
    let titles: Vec<&str> = back.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["T1", "T2", "T3"]);
}

// ── PDF pagination ──────────────────────────────────────────────────────────

#[test]
fn long_text_fills_the_first_page_exactly() {
    let settings = LayoutSettings::default();
    let per_page = max_lines_per_page(&settings, PageSize::a4(Orientation::Portrait));
    let text: Vec<String> = (0..per_page + 5).map(|i| format!("line {i}")).collect();
    let plan = plan_text(&text.join("\n"), &settings);
    assert!(plan.page_count() >= 2);
    assert_eq!(plan.pages[0].texts().len(), per_page);
    assert_eq!(plan.pages[1].texts()[0], format!("line {per_page}"));
}

#[tokio::test]
async fn text_to_pdf_and_back() {
    pdfium_or_skip!();
    let config = ConversionConfig::default();
    let doc = SourceDocument::text("memo.txt", "Quarterly memo\nRevenue grew");
    let pdf = convert(doc, TargetFormat::Pdf, &config).await.unwrap();
    assert_eq!(pdf.filename(), "memo_converted.pdf");

    let back = SourceDocument::new("memo.pdf", SourceFormat::Pdf, pdf.as_bytes().unwrap().to_vec());
    let text = convert(back, TargetFormat::Text, &config).await.unwrap();
    assert!(text.as_text().unwrap().contains("Quarterly memo"));
}

// ── Empty documents ─────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_sources_yield_placeholders() {
    let config = ConversionConfig::default();
    let empty_text = || SourceDocument::text("empty.txt", "   \n");

    let word = convert(empty_text(), TargetFormat::Word, &config).await.unwrap();
    assert_eq!(docx_text(&word).trim(), NO_EXTRACTED_TEXT);

    let excel = convert(empty_text(), TargetFormat::Excel, &config).await.unwrap();
    let sheets = readers::excel::read_workbook("e.xlsx", excel.as_bytes().unwrap()).unwrap();
    assert_eq!(sheets[0].rows, vec![row(&[NO_EXTRACTED_TEXT])]);

    let ppt = convert(empty_text(), TargetFormat::Ppt, &config).await.unwrap();
    let slides = readers::ppt::read_presentation("e.pptx", ppt.as_bytes().unwrap()).unwrap();
    assert_eq!(slides.len(), 1);
    assert_eq!(slides[0].title, NO_EXTRACTED_TEXT);

    let book = xlsx("blank.xlsx", &[Sheet::new("Blank", Vec::new())]);
    let text = convert(book, TargetFormat::Text, &config).await.unwrap();
    assert_eq!(text.as_text().unwrap(), NO_TEXT_FOUND);
}

#[tokio::test]
async fn empty_sources_still_render_a_page() {
    pdfium_or_skip!();
    let config = ConversionConfig::default();

    let pdf = convert(SourceDocument::text("e.txt", ""), TargetFormat::Pdf, &config)
        .await
        .unwrap();
    let pages = readers::pdf::read_pages("e.pdf", pdf.as_bytes().unwrap()).unwrap();
    assert_eq!(pages.len(), 1);
    assert!(pages[0].text.contains(NO_EXTRACTED_TEXT));

    let images = convert(SourceDocument::text("e.txt", ""), TargetFormat::Image, &config)
        .await
        .unwrap();
    match images {
        ConversionResult::Images(set) => {
            assert_eq!(set.images.len(), 1);
            assert_eq!(set.images[0].filename, "e_page_1.png");
        }
        other => panic!("expected images, got {other:?}"),
    }
}

// ── Image sources through OCR ───────────────────────────────────────────────

#[tokio::test]
async fn scanned_table_becomes_a_corrected_sheet() {
    let engine = StubOcr::new("| Item | Qty |\n|---|---|\n| Bolts | 1O |\n| Nuts | 25 |");
    let config = config_with(engine.clone(), None);
    let result = convert(png("scan.png"), TargetFormat::Excel, &config).await.unwrap();
    let sheets = readers::excel::read_workbook("scan.xlsx", result.as_bytes().unwrap()).unwrap();
    assert_eq!(
        sheets[0].rows,
        vec![row(&["Item", "Qty"]), row(&["Bolts", "10"]), row(&["Nuts", "25"])]
    );
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn image_to_pdf_does_not_call_ocr() {
    pdfium_or_skip!();
    let engine = StubOcr::new("unused");
    let config = config_with(engine.clone(), None);
    let result = convert(png("photo.png"), TargetFormat::Pdf, &config).await.unwrap();
    assert_eq!(result.filename(), "photo_converted.pdf");
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn garbage_ocr_text_is_rejected() {
    let config = config_with(StubOcr::new("unused"), None);
    let err = convert(png("bad.png"), TargetFormat::Text, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, DocMatrixError::LowQualityOcr { .. }), "got {err:?}");
}

#[tokio::test(start_paused = true)]
async fn slow_ocr_times_out() {
    let engine = StubOcr::slow("Invoice 42", Duration::from_secs(3600));
    let config = ConversionConfig::builder()
        .ocr_engine(engine)
        .server_timeout_secs(30)
        .build()
        .unwrap();
    let err = convert(png("scan.png"), TargetFormat::Word, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, DocMatrixError::OcrTimeout { secs: 30, .. }), "got {err:?}");
}

// ── Batches ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_with_a_failure_never_completes() {
    let recorder = Arc::new(Recorder::default());
    let config = config_with(StubOcr::new("Invoice 42 total 100"), Some(recorder.clone()));
    let orchestrator = Orchestrator::new(config).unwrap();
    let tool = Tool::new(SourceFormat::Image, TargetFormat::Text);

    let docs = vec![png("one.png"), png("bad.png"), png("three.png")];
    let report = orchestrator.run_batch(tool, docs).await.unwrap();

    let statuses: Vec<FileStatus> = report.files.iter().map(|f| f.status).collect();
    assert_eq!(statuses, vec![FileStatus::Success, FileStatus::Error, FileStatus::Success]);
    assert_eq!(report.files[1].error.as_ref().unwrap().kind, FileErrorKind::Ocr);
    assert!(!report.all_succeeded());
    assert!(!report.notified);
    assert_eq!(recorder.batches.load(Ordering::SeqCst), 0);
    assert_eq!(recorder.errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn successful_batch_completes_once() {
    let recorder = Arc::new(Recorder::default());
    let config = config_with(StubOcr::new("Invoice 42 total 100"), Some(recorder.clone()));
    let orchestrator = Orchestrator::new(config).unwrap();
    let tool = Tool::new(SourceFormat::Image, TargetFormat::Text);

    let docs = vec![png("one.png"), png("two.png"), png("three.png")];
    let report = orchestrator.run_batch(tool, docs).await.unwrap();

    assert!(report.all_succeeded());
    assert!(report.notified);
    assert_eq!(recorder.batches.load(Ordering::SeqCst), 1);
    for file in &report.files {
        assert_eq!(file.progress, 100);
        assert_eq!(
            file.result.as_ref().and_then(|r| r.as_text()),
            Some("Invoice 42 total 100")
        );
    }
}

#[tokio::test]
async fn mismatched_files_fail_without_processing() {
    let recorder = Arc::new(Recorder::default());
    let config = ConversionConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let orchestrator = Orchestrator::new(config).unwrap();
    let tool = Tool::new(SourceFormat::Excel, TargetFormat::Text);

    let docs = vec![
        xlsx("good.xlsx", &[Sheet::new("S", vec![row(&["1"])])]),
        SourceDocument::text("notes.txt", "not a workbook"),
    ];
    let report = orchestrator.run_batch(tool, docs).await.unwrap();

    assert_eq!(report.files[0].status, FileStatus::Success);
    let rejected = &report.files[1];
    assert_eq!(rejected.status, FileStatus::Error);
    assert_eq!(rejected.progress, 0);
    assert_eq!(rejected.error.as_ref().unwrap().kind, FileErrorKind::Validation);
    assert!(!recorder.progress.lock().unwrap().contains_key(&rejected.id));
    assert!(!report.notified);
}

#[tokio::test(start_paused = true)]
async fn server_bound_progress_ticks_up_to_the_cap() {
    let recorder = Arc::new(Recorder::default());
    let config = ConversionConfig::builder()
        .ocr_engine(StubOcr::slow("Invoice 42 total 100", Duration::from_secs(2)))
        .progress_callback(recorder.clone())
        .progress_tick_ms(100)
        .progress_step(15)
        .progress_cap(90)
        .build()
        .unwrap();
    let orchestrator = Orchestrator::new(config).unwrap();
    let tool = Tool::new(SourceFormat::Image, TargetFormat::Text);
    let report = orchestrator.run_batch(tool, vec![png("slow.png")]).await.unwrap();
    assert_eq!(report.files[0].status, FileStatus::Success);

    let progress = recorder.progress.lock().unwrap();
    let seen = &progress[&report.files[0].id];
    assert_eq!(seen.first(), Some(&10));
    assert_eq!(seen.last(), Some(&100));
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "not increasing: {seen:?}");
    assert!(seen.contains(&90), "ticker never reached the cap: {seen:?}");
    assert!(seen[..seen.len() - 1].iter().all(|p| *p <= 90));
}

#[tokio::test]
async fn stream_yields_each_file_once() {
    let config = ConversionConfig::builder().concurrency(2).build().unwrap();
    let docs: Vec<SourceDocument> = (1..=4)
        .map(|i| SourceDocument::text(format!("f{i}.txt"), &format!("row {i}\tvalue")))
        .collect();
    let tool = Tool::new(SourceFormat::Text, TargetFormat::Excel);
    let states: Vec<_> = convert_stream(tool, docs, &config).unwrap().collect().await;
    assert_eq!(states.len(), 4);
    assert!(states.iter().all(|s| s.status == FileStatus::Success));
}

// ── Merging and packaging ───────────────────────────────────────────────────

#[tokio::test]
async fn corrupt_file_does_not_break_a_merge() {
    let docs = vec![
        xlsx("first.xlsx", &[Sheet::new("A", vec![row(&["alpha"])])]),
        SourceDocument::new("broken.xlsx", SourceFormat::Excel, b"not a zip".to_vec()),
        xlsx("last.xlsx", &[Sheet::new("B", vec![row(&["omega"])])]),
    ];
    let result = merge("Excel to Word", docs, TargetFormat::Word, &ConversionConfig::default())
        .await
        .unwrap();
    assert_eq!(result.filename(), "excel_to_word_merged.docx");

    let text = docx_text(&result);
    let alpha = text.find("alpha").expect("first file missing");
    let marker = text.find("Error processing broken.xlsx").expect("marker missing");
    let omega = text.find("omega").expect("last file missing");
    assert!(alpha < marker && marker < omega, "out of order: {text}");
}

#[tokio::test]
async fn merged_workbook_labels_each_file() {
    let docs = vec![
        xlsx("q1.xlsx", &[Sheet::new("Sales", vec![row(&["1"])])]),
        SourceDocument::text("notes.txt", "a\tb"),
        xlsx("q2.xlsx", &[Sheet::new("Sales", vec![row(&["2"])])]),
    ];
    let result = merge("Quarterly", docs, TargetFormat::Excel, &ConversionConfig::default())
        .await
        .unwrap();
    let sheets = readers::excel::read_workbook("m.xlsx", result.as_bytes().unwrap()).unwrap();
    let names: Vec<&str> = sheets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Sales", "File 2", "Sales (2)"]);
}

#[tokio::test]
async fn batch_results_zip_under_the_tool_title() {
    let orchestrator = Orchestrator::new(ConversionConfig::default()).unwrap();
    let tool = Tool::new(SourceFormat::Text, TargetFormat::Word);
    let docs = vec![
        SourceDocument::text("report.txt", "one"),
        SourceDocument::text("report.txt", "two"),
    ];
    let report = orchestrator.run_batch(tool, docs).await.unwrap();
    let results: Vec<&ConversionResult> = report.results().into_iter().map(|(_, r)| r).collect();
    let zip = package_batch(results).unwrap();
    assert_eq!(batch_archive_name(&tool.title()), "text_to_word_batch.zip");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(batch_archive_name(&tool.title()));
    std::fs::write(&path, &zip).unwrap();
    let file = std::fs::File::open(&path).unwrap();
    let archive = zip::ZipArchive::new(file).unwrap();
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort();
    assert_eq!(names, vec!["report_converted.docx", "report_converted_2.docx"]);
}
