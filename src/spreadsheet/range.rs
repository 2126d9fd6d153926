use crate::error::RustyInvoiceError;
use crate::spreadsheet::reference::col_to_index;
use crate::spreadsheet::reference::row_to_index;
use regex::Regex;
use std::fmt::Display;
use std::ops::RangeInclusive;
use thiserror::Error;

/// Errors related to Excel-style range parsing.
#[derive(Error, Debug)]
pub enum RangeError {
    #[error("Invalid range format '{0}'")]
    FormatError(String),
}

/// An Excel-style cell window with optional boundaries, all 1-based and inclusive.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Range {
    /// Lower row bound, None for unbounded
    pub row_lower_bound: Option<usize>,
    /// Upper row bound, None for unbounded
    pub row_upper_bound: Option<usize>,
    /// Lower column bound, None for unbounded
    pub col_lower_bound: Option<usize>,
    /// Upper column bound, None for unbounded
    pub col_upper_bound: Option<usize>,
}

impl Range {
    /// Rows of the window, clamped to `1..=max_row`.
    pub fn rows(&self, max_row: usize) -> RangeInclusive<usize> {
        let upper = self.row_upper_bound.map_or(max_row, |bound| bound.min(max_row));
        self.row_lower_bound.unwrap_or(1)..=upper
    }

    /// Columns of the window, clamped to `1..=max_col`.
    pub fn cols(&self, max_col: usize) -> RangeInclusive<usize> {
        let upper = self.col_upper_bound.map_or(max_col, |bound| bound.min(max_col));
        self.col_lower_bound.unwrap_or(1)..=upper
    }
}

impl TryFrom<&str> for Range {
    type Error = RustyInvoiceError;

    /// Parses an Excel-style range string (e.g., "A1", "B2:C5", "A:Y", "1:25", "A1:Y").
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let pattern = Regex::new(r"^([A-Z]*)(\d*)(:([A-Z]*)(\d*))?$").expect("Hardcode regex pattern");
        let value = value.trim().to_ascii_uppercase();
        let captures = pattern
            .captures(value.as_str())
            .ok_or(RangeError::FormatError(value.to_owned()))?;
        let range = Range {
            col_lower_bound: captures
                .get(1)
                .map(|matcher| matcher.as_str())
                .and_then(col_to_index),
            row_lower_bound: captures
                .get(2)
                .map(|matcher| matcher.as_str())
                .and_then(row_to_index),
            col_upper_bound: captures
                .get(4)
                .map(|matcher| matcher.as_str())
                .and_then(col_to_index),
            row_upper_bound: captures
                .get(5)
                .map(|matcher| matcher.as_str())
                .and_then(row_to_index),
        };
        let inverted = |lower: Option<usize>, upper: Option<usize>| {
            lower.zip(upper).map(|(lower, upper)| lower > upper).unwrap_or(false)
        };
        if inverted(range.row_lower_bound, range.row_upper_bound)
            || inverted(range.col_lower_bound, range.col_upper_bound)
        {
            Err(RangeError::FormatError(value.to_owned()))?
        }
        Ok(range)
    }
}

impl Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bound = |col: Option<usize>, row: Option<usize>| {
            format!(
                "{}{}",
                col.map(crate::spreadsheet::reference::index_to_col).unwrap_or_default(),
                row.map(|row| row.to_string()).unwrap_or_default()
            )
        };
        write!(
            f,
            "{}:{}",
            bound(self.col_lower_bound, self.row_lower_bound),
            bound(self.col_upper_bound, self.row_upper_bound)
        )
    }
}
