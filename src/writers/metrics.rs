//! Glyph metrics for the standard Helvetica faces, and word wrapping.
//!
//! Generated PDFs use the PDF base-14 Helvetica family, which every viewer
//! ships, so widths come from the Adobe AFM tables (units of 1/1000 em) for
//! printable ASCII. Characters outside that range are measured as 556, the
//! width of a Helvetica digit.

/// A face of the Helvetica family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontFace {
    #[default]
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FontFace {
    pub fn from_style(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => FontFace::Regular,
            (true, false) => FontFace::Bold,
            (false, true) => FontFace::Italic,
            (true, true) => FontFace::BoldItalic,
        }
    }

    fn is_bold(self) -> bool {
        matches!(self, FontFace::Bold | FontFace::BoldItalic)
    }
}

/// Width used for characters without an AFM entry.
pub const DEFAULT_CHAR_WIDTH: u16 = 556;

// ASCII 32..=126, Helvetica.afm
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

// ASCII 32..=126, Helvetica-Bold.afm
#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Advance width of one character in 1/1000 em. Obliques share the upright widths.
pub fn char_width(c: char, face: FontFace) -> u16 {
    let table = if face.is_bold() {
        &HELVETICA_BOLD
    } else {
        &HELVETICA
    };
    match c as u32 {
        code @ 32..=126 => table[(code - 32) as usize],
        _ => DEFAULT_CHAR_WIDTH,
    }
}

/// Width of `text` in points at `size`.
pub fn text_width(text: &str, face: FontFace, size: f32) -> f32 {
    let units: u32 = text.chars().map(|c| u32::from(char_width(c, face))).sum();
    units as f32 * size / 1000.0
}

/// Greedy word wrap to `max_width` points.
///
/// Words longer than a line are split by character. An empty input yields
/// one empty line so blank lines survive layout.
pub fn wrap_text(text: &str, face: FontFace, size: f32, max_width: f32) -> Vec<String> {
    let text = text.replace('\t', "    ");
    if text.trim().is_empty() {
        return vec![String::new()];
    }

    let space = text_width(" ", face, size);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0f32;

    for word in text.split(' ').filter(|w| !w.is_empty()) {
        let word_width = text_width(word, face, size);

        if word_width > max_width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0.0;
            }
            for piece in split_to_width(word, face, size, max_width) {
                lines.push(piece);
            }
            // Keep appending to the last fragment.
            if let Some(last) = lines.pop() {
                current_width = text_width(&last, face, size);
                current = last;
            }
            continue;
        }

        let needed = if current.is_empty() {
            word_width
        } else {
            current_width + space + word_width
        };
        if needed > max_width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_width = word_width;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_width = needed;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Split one word into pieces no wider than `max_width` (at least one char each).
pub fn split_to_width(word: &str, face: FontFace, size: f32, max_width: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut width = 0.0f32;
    for c in word.chars() {
        let w = f32::from(char_width(c, face)) * size / 1000.0;
        if width + w > max_width && !piece.is_empty() {
            pieces.push(std::mem::take(&mut piece));
            width = 0.0;
        }
        piece.push(c);
        width += w;
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}
