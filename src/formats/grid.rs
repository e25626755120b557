//! Grid normaliser: turn loosely tabular text into rows of cells.
//!
//! Used by every text → table path (text sources bound for Excel/PPT, the
//! PDF grid fallback, OCR output bound for spreadsheets). There is exactly
//! one parser so all call sites agree on what a table looks like.
//!
//! ## Two modes
//!
//! * **Pipe mode** when more than one non-empty line contains `|`
//!   (Markdown tables). Separator rows such as `|---|:--:|` are dropped.
//! * **Whitespace mode** otherwise: cells are separated by a tab or by two
//!   or more consecutive spaces.

use once_cell::sync::Lazy;
use regex::Regex;

/// Rows of cells; not necessarily rectangular.
pub type Grid = Vec<Vec<String>>;

static RE_CELL_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\t| {2,}").unwrap());
static RE_SEPARATOR_CELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-:]+$").unwrap());

/// Parse text into ordered non-empty rows.
pub fn parse_text_to_grid(text: &str) -> Grid {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .collect();

    let pipe_mode = lines.iter().filter(|l| l.contains('|')).count() > 1;

    lines
        .into_iter()
        .filter_map(|line| {
            if pipe_mode {
                parse_pipe_line(line)
            } else {
                parse_whitespace_line(line)
            }
        })
        .collect()
}

/// Split one `|`-delimited line into cells. Separator rows yield `None`.
pub(crate) fn parse_pipe_line(line: &str) -> Option<Vec<String>> {
    if !line.contains('|') {
        return Some(vec![strip_emphasis(line.trim())]);
    }
    let mut cells: Vec<String> = line
        .split('|')
        .map(|c| strip_emphasis(c.trim()))
        .collect();
    if cells.first().is_some_and(|c| c.is_empty()) {
        cells.remove(0);
    }
    if cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
    if cells.is_empty() || is_separator_row(&cells) {
        return None;
    }
    Some(cells)
}

/// True when every cell is a Markdown separator such as `---` or `:--:`.
pub(crate) fn is_separator_row(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells
            .iter()
            .all(|c| RE_SEPARATOR_CELL.is_match(c.trim_matches(|ch| ch == '|' || ch == ' ')))
}

fn parse_whitespace_line(line: &str) -> Option<Vec<String>> {
    let cells: Vec<String> = RE_CELL_SPLIT
        .split(line)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    (!cells.is_empty()).then_some(cells)
}

fn strip_emphasis(cell: &str) -> String {
    cell.replace("**", "").replace("__", "")
}

/// Rows joined by newlines, cells by tabs.
pub fn grid_to_text(grid: &Grid) -> String {
    grid.iter()
        .map(|row| row.join("\t"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Width of the widest row.
pub fn max_columns(grid: &Grid) -> usize {
    grid.iter().map(Vec::len).max().unwrap_or(0)
}

/// Pad every row with empty cells to the widest row; returns that width.
pub fn rectangularize(grid: &mut Grid) -> usize {
    let width = max_columns(grid);
    for row in grid.iter_mut() {
        row.resize(width, String::new());
    }
    width
}

/// Whether every cell of a row is blank.
pub fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(rows: &[&[&str]]) -> Grid {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_separator_rows_are_dropped() {
        let grid = parse_text_to_grid("a|b\n---|---\n1|2");
        assert_eq!(grid, g(&[&["a", "b"], &["1", "2"]]));
    }

    #[test]
    fn test_markdown_table_with_outer_pipes_and_bold() {
        let grid = parse_text_to_grid("| **Name** | Age |\n|:--|--:|\n| Alice | 30 |\n");
        assert_eq!(grid, g(&[&["Name", "Age"], &["Alice", "30"]]));
    }

    #[test]
    fn test_single_pipe_line_uses_whitespace_mode() {
        let grid = parse_text_to_grid("a | b\nc  d");
        assert_eq!(grid, g(&[&["a | b"], &["c", "d"]]));
    }

    #[test]
    fn test_pipe_mode_keeps_plain_lines_as_single_cells() {
        let grid = parse_text_to_grid("Report\na|b\nc|d");
        assert_eq!(grid, g(&[&["Report"], &["a", "b"], &["c", "d"]]));
    }

    #[test]
    fn test_whitespace_mode_splits_on_tabs_and_double_spaces() {
        let grid = parse_text_to_grid("Name\tAge\nAlice   30\n\n  \nBob\t25");
        assert_eq!(grid, g(&[&["Name", "Age"], &["Alice", "30"], &["Bob", "25"]]));
    }

    #[test]
    fn test_single_space_does_not_split() {
        assert_eq!(parse_text_to_grid("New York  10"), g(&[&["New York", "10"]]));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for input in [
            "Name\tAge\nAlice\t30\nBob\t25",
            "| a | b |\n|---|---|\n| 1 | 2 |",
            "x  y  z\n1  2",
        ] {
            let once = parse_text_to_grid(input);
            let twice = parse_text_to_grid(&grid_to_text(&once));
            assert_eq!(once, twice, "input: {input:?}");
        }
    }

    #[test]
    fn test_rectangularize_pads_to_widest_row() {
        let mut grid = g(&[&["a"], &["b", "c", "d"], &[]]);
        assert_eq!(rectangularize(&mut grid), 3);
        assert!(grid.iter().all(|r| r.len() == 3));
        assert_eq!(grid[0], vec!["a", "", ""]);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_text_to_grid("").is_empty());
        assert!(parse_text_to_grid("\n \n\t\n").is_empty());
        assert_eq!(max_columns(&Grid::new()), 0);
    }
}
