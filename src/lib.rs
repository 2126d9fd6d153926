//! # Rusty Invoice
//!
//! Extracts the invoice and packing-list tables embedded in one worksheet of
//! an `.xlsx` workbook and turns them into reconciled, aggregated figures.
//!
//! ## Pipeline
//!
//! For every header row found in the sheet:
//!
//! - **Extraction**: header rows are located by pattern, columns are mapped
//!   to canonical fields through configurable synonyms and each table's rows
//!   are read into a column-oriented [`RecordSet`](record::RecordSet).
//! - **Volume**: the `cbm` column is derived from dimensions or parsed from
//!   `L*W*H` text.
//! - **Distribution**: group totals such as net and gross weight are spread
//!   over the group's rows by piece count, the shares summing to the total
//!   exactly.
//! - **Aggregation**: SQFT is summed by (PO, Item, UnitPrice), or SQFT and
//!   Amount by (PO, Item) for workbooks selected by file name prefix.
//!
//! The aggregation of all tables is finally folded into one FOB summary.
//!
//! ## Example
//!
//! ```no_run
//! use rusty_invoice::config::Config;
//!
//! let report = rusty_invoice::pipeline::run("packing-list.xlsx", &Config::default())?;
//! println!("{}", report.fob.combined_po);
//! # Ok::<(), rusty_invoice::pipeline::StructuralError>(())
//! ```
pub mod config;
pub mod error;
pub mod extraction;
pub mod helpers;
pub mod pipeline;
pub mod processing;
pub mod record;
pub mod spreadsheet;

pub use config::Config;
pub use error::RustyInvoiceError;
pub use pipeline::run;
pub use pipeline::RunReport;
pub use pipeline::StructuralError;
