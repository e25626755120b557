//! Post-processing: deterministic cleanup and validation of OCR output.
//!
//! The OCR collaborator returns Markdown-flavoured text that may contain
//! image references, embedded base64 payloads, runs of blank lines and
//! occasional digit/letter confusions. This module applies cheap,
//! deterministic string rules; each rule is independently testable.
//!
//! ## Rule Order
//!
//! Fences are stripped and line endings normalised before image removal so
//! the image patterns match on clean input; whitespace collapsing runs last.

use crate::formats::grid::Grid;
use once_cell::sync::Lazy;
use regex::Regex;

/// Quality thresholds for OCR text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcrThresholds {
    /// Minimum letters+digits share among non-whitespace characters.
    pub min_alnum_ratio: f32,
    /// Minimum absolute number of letters+digits.
    pub min_alnum_chars: usize,
}

impl OcrThresholds {
    pub fn from_config(config: &crate::config::ConversionConfig) -> Self {
        Self {
            min_alnum_ratio: config.min_alnum_ratio,
            min_alnum_chars: config.min_alnum_chars,
        }
    }
}

/// Character statistics of an accepted OCR text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcrQuality {
    pub alnum: usize,
    pub non_whitespace: usize,
    pub ratio: f32,
}

/// Apply all cleanup rules to raw OCR output.
///
/// 1. Strip outer markdown fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Remove image references, `<img>` tags and base64 data URIs
/// 4. Strip invisible Unicode
/// 5. Collapse runs of spaces/tabs and of blank lines
/// 6. Trim every line and drop empty ones
pub fn clean_ocr_output(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_image_artifacts(&s);
    let s = remove_invisible_chars(&s);
    let s = collapse_whitespace(&s);
    s.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md|text)?\n(.*)\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove image artefacts ───────────────────────────────────────────

static RE_MD_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
static RE_IMG_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\(img-\d+\.[a-z]+\)").unwrap());
static RE_IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<img[^>]*>").unwrap());
static RE_DATA_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"data:image/[^;]+;base64,\S+").unwrap());

fn remove_image_artifacts(input: &str) -> String {
    let s = RE_MD_IMAGE.replace_all(input, "");
    let s = RE_IMG_REF.replace_all(&s, "");
    let s = RE_IMG_TAG.replace_all(&s, "");
    RE_DATA_URI.replace_all(&s, "").to_string()
}

// ── Rule 4: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}

// ── Rule 5: Collapse whitespace ──────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());

fn collapse_whitespace(input: &str) -> String {
    let s = RE_BLANK_LINES.replace_all(input, "\n\n");
    RE_SPACES.replace_all(&s, " ").to_string()
}

// ── Validation ───────────────────────────────────────────────────────────────

/// Decide whether OCR text is usable.
///
/// Rejects empty text, text with fewer than `min_alnum_chars` letters or
/// digits (any script), text whose letters+digits share of non-whitespace
/// characters is below `min_alnum_ratio`, and text that is mostly image
/// references. Returns the reason on rejection.
pub fn assess_ocr_text(text: &str, thresholds: OcrThresholds) -> Result<OcrQuality, String> {
    if text.trim().is_empty() {
        return Err("no text found".into());
    }
    let non_whitespace = text.chars().filter(|c| !c.is_whitespace()).count();
    let alnum = text.chars().filter(|c| c.is_alphanumeric()).count();
    if alnum < thresholds.min_alnum_chars {
        return Err(format!(
            "only {alnum} letters or digits (need {})",
            thresholds.min_alnum_chars
        ));
    }
    let ratio = alnum as f32 / non_whitespace.max(1) as f32;
    if ratio < thresholds.min_alnum_ratio {
        return Err(format!(
            "{:.0}% of characters are letters or digits (need {:.0}%)",
            ratio * 100.0,
            thresholds.min_alnum_ratio * 100.0
        ));
    }
    let lines = text.lines().filter(|l| !l.trim().is_empty()).count();
    let images = RE_MD_IMAGE.find_iter(text).count();
    if images as f32 > lines as f32 * 0.5 {
        return Err("output consists mostly of image references".into());
    }
    Ok(OcrQuality {
        alnum,
        non_whitespace,
        ratio,
    })
}

// ── Numeric corrections ──────────────────────────────────────────────────────

static RE_THOUSANDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d),(\d{3})").unwrap());
static RE_DOTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{2,}").unwrap());

/// Fix digit/letter confusions that OCR engines make inside numbers.
///
/// In numeric contexts `O→0`, `l`/`I→1`, `S→5`, `Z→2`, `B→8`; a `0`
/// between capital-letter runs becomes `O`; thousands separators inside
/// numbers are removed and repeated dots collapse to one.
pub fn fix_common_ocr_errors(text: &str) -> String {
    text.split('\n')
        .map(fix_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn fix_line(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    for (i, &c) in chars.iter().enumerate() {
        let prev = i.checked_sub(1).map(|j| chars[j]);
        let next = chars.get(i + 1).copied();
        let digit_before = prev.is_some_and(|p| p.is_ascii_digit());
        let digit_after = next.is_some_and(|n| n.is_ascii_digit());
        let boundary_before = prev.is_none_or(|p| !is_word_char(p));
        let boundary_after = next.is_none_or(|n| !is_word_char(n));

        let between_digits = digit_before && digit_after;
        let numeric_edge = (digit_before && boundary_after) || (boundary_before && digit_after);

        let fixed = match c {
            'O' if between_digits || numeric_edge => '0',
            'l' | 'I' if between_digits || numeric_edge => '1',
            'S' if between_digits || (!digit_before && digit_after) => '5',
            'Z' if between_digits => '2',
            'B' if between_digits => '8',
            '0' if capitals_before(&chars, i) >= 2
                && next.is_some_and(|n| n.is_ascii_uppercase()) =>
            {
                'O'
            }
            other => other,
        };
        out.push(fixed);
    }

    let mut s = out;
    loop {
        let next = RE_THOUSANDS.replace_all(&s, "$1$2").to_string();
        if next == s {
            break;
        }
        s = next;
    }
    RE_DOTS.replace_all(&s, ".").to_string()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn capitals_before(chars: &[char], i: usize) -> usize {
    chars[..i]
        .iter()
        .rev()
        .take_while(|c| c.is_ascii_uppercase())
        .count()
}

// ── Table checks ─────────────────────────────────────────────────────────────

/// A non-fatal observation about an OCR-derived table.
#[derive(Debug, Clone, PartialEq)]
pub enum TableWarning {
    /// Rows disagree on column count by more than two.
    InconsistentColumns { min: usize, max: usize },
    /// More than half of a row's cells are empty (1-indexed row).
    SparseRow { row: usize, empty: usize, total: usize },
    /// Column values more than three standard deviations from the mean.
    Outliers { column: usize, values: Vec<f64> },
}

/// Inspect a grid for structural and numeric anomalies.
pub fn validate_table(grid: &Grid) -> Vec<TableWarning> {
    let mut warnings = Vec::new();
    if grid.is_empty() {
        return warnings;
    }

    let min = grid.iter().map(Vec::len).min().unwrap_or(0);
    let max = grid.iter().map(Vec::len).max().unwrap_or(0);
    if max - min > 2 {
        warnings.push(TableWarning::InconsistentColumns { min, max });
    }

    for (i, row) in grid.iter().enumerate() {
        let empty = row.iter().filter(|c| c.trim().is_empty()).count();
        if empty * 2 > row.len() {
            warnings.push(TableWarning::SparseRow {
                row: i + 1,
                empty,
                total: row.len(),
            });
        }
    }

    for column in 0..max {
        let numbers: Vec<f64> = grid
            .iter()
            .filter_map(|row| row.get(column))
            .filter_map(|cell| parse_number(cell))
            .collect();
        let outliers = detect_outliers(&numbers);
        if !outliers.is_empty() {
            warnings.push(TableWarning::Outliers {
                column: column + 1,
                values: outliers,
            });
        }
    }
    warnings
}

fn parse_number(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Values beyond three population standard deviations; needs ≥ 4 samples.
pub fn detect_outliers(numbers: &[f64]) -> Vec<f64> {
    if numbers.len() < 4 {
        return Vec::new();
    }
    let n = numbers.len() as f64;
    let mean = numbers.iter().sum::<f64>() / n;
    let variance = numbers.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let sd = variance.sqrt();
    numbers
        .iter()
        .copied()
        .filter(|x| (x - mean).abs() > 3.0 * sd)
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> OcrThresholds {
        OcrThresholds {
            min_alnum_ratio: 0.15,
            min_alnum_chars: 3,
        }
    }

    #[test]
    fn test_clean_removes_images_and_base64() {
        let input = "Title\n![img-0.jpeg](img-0.jpeg)\n<img src=\"x\">\nvalue data:image/png;base64,AAAA== end";
        let out = clean_ocr_output(input);
        assert_eq!(out, "Title\nvalue end");
    }

    #[test]
    fn test_clean_collapses_whitespace_and_blank_lines() {
        let input = "a   b\t\tc\r\n\r\n\r\n\r\nd  ";
        assert_eq!(clean_ocr_output(input), "a b c\nd");
    }

    #[test]
    fn test_clean_strips_fences() {
        assert_eq!(clean_ocr_output("```markdown\n# Hi\n```"), "# Hi");
    }

    #[test]
    fn test_assess_accepts_other_scripts() {
        assert!(assess_ocr_text("我们需要针对所有的一线和二线语言进行优化。", defaults()).is_ok());
        assert!(assess_ocr_text("عند حُسن ظن إخواننا بنا", defaults()).is_ok());
    }

    #[test]
    fn test_assess_rejects_too_few_chars() {
        let err = assess_ocr_text("a1 ..", defaults()).unwrap_err();
        assert!(err.contains("letters or digits"), "got: {err}");
        assert!(assess_ocr_text("abc", defaults()).is_ok());
    }

    #[test]
    fn test_assess_rejects_low_density() {
        // 3 alnum out of 30 non-whitespace = 10%
        let text = "abc ***************************";
        assert!(assess_ocr_text(text, defaults()).is_err());
        let lenient = OcrThresholds {
            min_alnum_ratio: 0.05,
            ..defaults()
        };
        assert!(assess_ocr_text(text, lenient).is_ok());
    }

    #[test]
    fn test_assess_rejects_empty() {
        assert!(assess_ocr_text("   \n ", defaults()).is_err());
    }

    #[test]
    fn test_fix_digit_confusions() {
        assert_eq!(fix_common_ocr_errors("1O5"), "105");
        assert_eq!(fix_common_ocr_errors("Total 2l4 units"), "Total 214 units");
        assert_eq!(fix_common_ocr_errors("S00"), "500");
        assert_eq!(fix_common_ocr_errors("1Z3 4B5"), "123 485");
        assert_eq!(fix_common_ocr_errors("O7"), "07");
    }

    #[test]
    fn test_fix_leaves_words_alone() {
        assert_eq!(fix_common_ocr_errors("In Oslo Bob"), "In Oslo Bob");
    }

    #[test]
    fn test_fix_zero_between_capitals() {
        assert_eq!(fix_common_ocr_errors("GO0GLE"), "GOOGLE");
    }

    #[test]
    fn test_fix_thousands_and_dots() {
        assert_eq!(fix_common_ocr_errors("1,234,567 ..."), "1234567 .");
    }

    #[test]
    fn test_validate_table_inconsistent_and_sparse() {
        let grid = vec![
            vec!["a".to_string(), "b".into(), "c".into(), "d".into()],
            vec!["1".to_string()],
            vec!["".to_string(), "".into(), "x".into()],
        ];
        let warnings = validate_table(&grid);
        assert!(warnings.contains(&TableWarning::InconsistentColumns { min: 1, max: 4 }));
        assert!(warnings
            .iter()
            .any(|w| matches!(w, TableWarning::SparseRow { row: 3, .. })));
    }

    #[test]
    fn test_detect_outliers_needs_four_values() {
        assert!(detect_outliers(&[1.0, 2.0, 1000.0]).is_empty());
        let mut values = vec![10.0; 20];
        values.push(10_000.0);
        assert_eq!(detect_outliers(&values), vec![10_000.0]);
    }
}
