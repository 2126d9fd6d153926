//! Locating header rows, mapping their columns and slicing the worksheet into tables.
pub mod header;
pub mod mapping;
pub mod table;

pub use header::find_all_header_rows;
pub use mapping::map_columns_to_headers;
pub use mapping::ColumnMapping;
pub use table::extract_multiple_tables;
pub use table::ExtractionRules;

use crate::spreadsheet::Value;

/// Cell text trimmed with inner whitespace runs collapsed to one space.
pub(crate) fn normalize_text(value: &Value) -> String {
    value.to_string().split_whitespace().collect::<Vec<_>>().join(" ")
}
