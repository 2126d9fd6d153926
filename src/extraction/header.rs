use crate::extraction::normalize_text;
use crate::spreadsheet::range::Range;
use crate::spreadsheet::Sheet;
use regex::Regex;

/// Finds every row of `window` holding at least one cell whose normalized
/// text matches `pattern`. Rows are returned in ascending order.
pub fn find_all_header_rows(sheet: &Sheet, pattern: &Regex, window: &Range) -> Vec<usize> {
    let mut header_rows = Vec::new();
    for row in window.rows(sheet.max_row) {
        let matched = window.cols(sheet.max_col).find(|&col| {
            let text = normalize_text(&sheet.value(row, col));
            !text.is_empty() && pattern.is_match(&text)
        });
        if let Some(col) = matched {
            tracing::info!(
                row,
                cell = %crate::spreadsheet::reference::index_to_reference(row, col),
                "header row found"
            );
            header_rows.push(row);
        }
    }
    if header_rows.is_empty() {
        tracing::warn!(pattern = pattern.as_str(), window = %window, "no header row found");
    }
    header_rows
}
