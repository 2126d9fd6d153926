//! # Spreadsheet Module
//!
//! Reads one worksheet of an Office Open XML workbook into an in-memory
//! [`Sheet`] grid. Only cached cell values are read; formulas are never
//! evaluated. Shared strings, inline strings, booleans, error codes and
//! date-styled numbers are converted into typed [`Value`]s.
pub mod cell;
pub mod range;
pub(crate) mod reference;
pub mod sheet;
pub mod xlsx;

pub use cell::Value;
pub use sheet::Sheet;
pub use xlsx::XlsxSpreadsheet;

use crate::error::ResultMessage;
use crate::error::RustyInvoiceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Missing part '{0}' in workbook")]
    FileError(String),

    #[error("Sheet matching '{0}' not found")]
    SheetNotFound(String),

    #[error("Workbook '{0}' contains no worksheet")]
    SpreadsheetEmptyError(String),

    #[error("Workbook '{0}' is password protected")]
    SpreadsheetPasswordProtectedError(String),

    #[error("Workbook '{0}' is not an Office Open XML file")]
    UnsupportedFormatError(String),

    #[error("Invalid cell value in '{0}' sheet '{1}' at {2}: '{3}'")]
    CellValueError(String, String, String, String),
}

/// A workbook whose worksheets can be materialized as grids.
pub trait Spreadsheet {
    /// File name the workbook was opened from
    fn name(&self) -> String;

    /// Worksheet names in workbook order
    fn sheet_names(&self) -> Vec<String>;

    /// Reads the first worksheet whose name matches the glob `pattern`,
    /// or the active worksheet when `pattern` is `None`.
    fn read_sheet(&mut self, pattern: Option<&str>) -> Result<Sheet, RustyInvoiceError>;
}

/// Opens a workbook for reading.
pub fn open_spreadsheet(file_name: &str) -> Result<Box<dyn Spreadsheet>, RustyInvoiceError> {
    let spreadsheet = XlsxSpreadsheet::open(file_name).with_prefix(&format!("open '{file_name}'"))?;
    Ok(Box::new(spreadsheet))
}

/// Opens a workbook and reads one worksheet, releasing the archive afterwards.
pub fn load_sheet(file_name: &str, pattern: Option<&str>) -> Result<Sheet, RustyInvoiceError> {
    let mut spreadsheet = open_spreadsheet(file_name)?;
    spreadsheet.read_sheet(pattern).with_prefix(&format!("read '{file_name}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_carries_context() {
        let error = open_spreadsheet("does-not-exist.xlsx").err().unwrap();
        assert!(error.to_string().starts_with("open 'does-not-exist.xlsx': "));
    }

    #[test]
    fn remote_file_is_rejected() {
        let error = load_sheet("https://example.com/invoice.xlsx", None).err().unwrap();
        assert!(error.to_string().contains("not supported"));
    }
}
