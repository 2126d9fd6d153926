//! Runs the extraction and processing stages over one worksheet.
//!
//! Structural failures (no header row, unmapped required columns, an
//! unreadable sheet) end the run. Everything after extraction is confined to
//! its table: a failed distribution keeps the table's post-volume records and
//! skips its aggregation, while the other tables go on.
pub mod report;

pub use report::RunMetadata;
pub use report::RunReport;
pub use report::StageOutcome;
pub use report::TableReport;

use crate::config::Config;
use crate::config::ConfigError;
use crate::error::RustyInvoiceError;
use crate::extraction::extract_multiple_tables;
use crate::extraction::find_all_header_rows;
use crate::extraction::map_columns_to_headers;
use crate::extraction::ExtractionRules;
use crate::processing::aggregation::CUSTOM_FIELDS;
use crate::processing::aggregation::STANDARD_FIELDS;
use crate::processing::distribute_values;
use crate::processing::perform_fob_compounding;
use crate::processing::process_cbm_column;
use crate::processing::Aggregation;
use crate::processing::AggregationMode;
use crate::record::RecordSet;
use crate::spreadsheet::load_sheet;
use crate::spreadsheet::Sheet;
use thiserror::Error;

/// A failure that leaves nothing to process.
#[derive(Error, Debug)]
pub enum StructuralError {
    #[error("{0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("{0}")]
    SheetUnreadable(#[from] RustyInvoiceError),

    #[error("No header row matching '{pattern}' in sheet '{sheet}' within {window}")]
    NoHeaderRows { sheet: String, pattern: String, window: String },

    #[error("Header row {row} does not map required columns: {}", .missing.join(", "))]
    RequiredColumnsUnmapped { row: usize, missing: Vec<String> },
}

/// Loads the configured sheet of `workbook` and processes it.
///
/// The aggregation mode follows the workbook's file name, see
/// [`Config::uses_custom_aggregation`].
pub fn run(workbook: &str, config: &Config) -> Result<RunReport, StructuralError> {
    config.validate()?;
    let sheet = load_sheet(workbook, config.sheet.as_deref())?;
    let mode = if config.uses_custom_aggregation(workbook) {
        AggregationMode::Custom
    } else {
        AggregationMode::Standard
    };
    tracing::info!(workbook, sheet = %sheet.name, ?mode, "loaded sheet");
    process_sheet(&sheet, config, mode)
}

/// Processes an already loaded sheet.
pub fn process_sheet(sheet: &Sheet, config: &Config, mode: AggregationMode) -> Result<RunReport, StructuralError> {
    let pattern = config.header_regex()?;
    let window = config.search_window()?;

    let header_rows = find_all_header_rows(sheet, &pattern, &window);
    let Some(&first_header) = header_rows.first() else {
        return Err(StructuralError::NoHeaderRows {
            sheet: sheet.name.to_owned(),
            pattern: config.header.pattern.to_owned(),
            window: window.to_string(),
        });
    };

    let mapping = map_columns_to_headers(sheet, first_header, &window, &config.fields);
    let missing = mapping.missing(&config.required_fields);
    if !missing.is_empty() {
        Err(StructuralError::RequiredColumnsUnmapped { row: first_header, missing })?
    }

    let rules = ExtractionRules::from(&config.extraction);
    let tables = extract_multiple_tables(sheet, &header_rows, &mapping, &rules);

    let mut aggregation = Aggregation::empty(mode);
    let mut reports = Vec::with_capacity(tables.len());
    for (index, records) in tables {
        let header_row = header_rows[index];
        let span = tracing::info_span!("table", index, header_row);
        let _entered = span.enter();
        reports.push(process_table(index, header_row, records, config, &mut aggregation));
    }

    let fob = perform_fob_compounding(&aggregation, &config.fob);
    let report = RunReport {
        metadata: RunMetadata::new(sheet, config, mode),
        header_rows,
        mapping,
        tables: reports,
        aggregation,
        fob,
    };
    report.log_summary();
    Ok(report)
}

fn process_table(
    index: usize,
    header_row: usize,
    records: RecordSet,
    config: &Config,
    aggregation: &mut Aggregation,
) -> TableReport {
    let mut table = TableReport::new(index, header_row);
    if records.is_empty() {
        tracing::warn!("table has no data rows");
        let reason = "table has no data rows".to_owned();
        table.cbm = StageOutcome::Skipped(reason.clone());
        table.distribution = StageOutcome::Skipped(reason.clone());
        table.aggregation = StageOutcome::Skipped(reason);
        table.records = records;
        return table;
    }

    let has_volume = records.contains(&config.cbm.field)
        || (!config.cbm.dimensions.is_empty() && config.cbm.dimensions.iter().all(|field| records.contains(field)));
    let staged = process_cbm_column(records, &config.cbm);
    table.cbm = if has_volume {
        StageOutcome::Succeeded
    } else {
        StageOutcome::Skipped(format!("no '{}' or dimension columns", config.cbm.field))
    };
    table.skipped_rows.extend(staged.skipped);
    let records = staged.value;

    let distribution = &config.distribution;
    let records = match distribute_values(&records, &distribution.columns, &distribution.basis, distribution.precision) {
        Ok(distributed) => {
            table.distribution = StageOutcome::Succeeded;
            distributed
        }
        Err(error) => {
            tracing::error!(%error, "distribution failed, keeping undistributed values");
            table.distribution = StageOutcome::FellBack(error.to_string());
            table.aggregation = StageOutcome::Skipped("distribution fell back".to_owned());
            table.records = records;
            return table;
        }
    };

    let required: &[&str] = match aggregation.mode() {
        AggregationMode::Standard => &STANDARD_FIELDS,
        AggregationMode::Custom => &CUSTOM_FIELDS,
    };
    let missing = records.missing_fields(required);
    table.aggregation = if missing.is_empty() {
        let staged = Aggregation::of_table(aggregation.mode(), &records, config.aggregation.price_precision);
        table.skipped_rows.extend(staged.skipped);
        aggregation.merge(staged.value.clone());
        table.aggregated = Some(staged.value);
        StageOutcome::Succeeded
    } else {
        tracing::info!(?missing, "aggregation skipped");
        StageOutcome::Skipped(format!("missing fields: {}", missing.join(", ")))
    };
    table.records = records;
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::Value;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn text(value: &str) -> Value {
        Value::from(value)
    }

    fn number(value: &str) -> Value {
        Value::Number(Decimal::from_str(value).unwrap())
    }

    fn header() -> Vec<Value> {
        ["订单号", "物料代码", "总张数", "净重", "毛重", "单价", "SQFT", "CBM"]
            .iter()
            .map(|h| text(h))
            .collect()
    }

    fn row(po: &str, item: &str, pcs: &str, net: Value, gross: Value, sqft: &str) -> Vec<Value> {
        vec![text(po), text(item), number(pcs), net, gross, number("1.25"), number(sqft), text("1*2*0.5")]
    }

    fn sheet() -> Sheet {
        let mut grid = vec![Vec::new(); 45];
        grid[0] = vec![text("PACKING LIST")];
        grid[4] = header();
        grid[5] = row("PO-1", "A", "2", number("100"), number("110"), "10");
        grid[6] = row("PO-1", "A", "3", Value::Empty, Value::Empty, "20");
        grid[7] = row("PO-2", "B", "5", Value::Empty, Value::Empty, "30");
        grid[8] = vec![Value::Empty, text("Total")];
        grid[39] = header();
        grid[40] = row("PO-3", "C", "0", number("8"), number("9"), "5");
        grid[41] = row("PO-3", "C", "0", Value::Empty, Value::Empty, "5");
        Sheet::from_rows("Packing", grid)
    }

    #[test]
    fn processes_every_table() {
        let report = process_sheet(&sheet(), &Config::default(), AggregationMode::Standard).unwrap();
        assert_eq!(report.header_rows, vec![5, 40]);
        assert_eq!(report.tables.len(), 2);

        let first = &report.tables[0];
        assert_eq!(first.distribution, StageOutcome::Succeeded);
        assert_eq!(first.aggregation, StageOutcome::Succeeded);
        assert_eq!(first.records.column("net").unwrap(), &[number("20"), number("30"), number("50")]);
        assert_eq!(first.records.column("gross").unwrap(), &[number("22"), number("33"), number("55")]);
        assert_eq!(first.records.column("cbm").unwrap()[0], number("1"));

        let second = &report.tables[1];
        assert!(matches!(second.distribution, StageOutcome::FellBack(_)));
        assert!(matches!(second.aggregation, StageOutcome::Skipped(_)));
        assert_eq!(second.records.column("net").unwrap(), &[number("8"), Value::Empty]);

        assert_eq!(report.aggregation.len(), 2);
        assert_eq!(report.fob.combined_po, "PO-1\\PO-2");
        assert_eq!(report.fob.total_sqft, Decimal::from(60));
    }

    #[test]
    fn tables_report_their_own_aggregation() {
        let mut grid = vec![Vec::new(); 45];
        grid[4] = header();
        grid[5] = row("PO-1", "A", "2", number("10"), number("11"), "10");
        grid[39] = header();
        grid[40] = row("PO-1", "A", "3", number("6"), number("7"), "20");
        grid[41] = row("PO-2", "B", "1", number("2"), number("3"), "4");
        let sheet = Sheet::from_rows("Packing", grid);
        let report = process_sheet(&sheet, &Config::default(), AggregationMode::Standard).unwrap();

        let sqft = |aggregation: &Aggregation, po: &str| match aggregation {
            Aggregation::Standard(sums) => sums
                .iter()
                .filter(|(key, _)| key.po == po)
                .map(|(_, totals)| totals.sqft)
                .sum::<Decimal>(),
            Aggregation::Custom(_) => Decimal::ZERO,
        };
        let first = report.tables[0].aggregated.as_ref().unwrap();
        let second = report.tables[1].aggregated.as_ref().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(sqft(first, "PO-1"), Decimal::from(10));
        assert_eq!(second.len(), 2);
        assert_eq!(sqft(second, "PO-1"), Decimal::from(20));
        assert_eq!(sqft(&report.aggregation, "PO-1"), Decimal::from(30));
        assert_eq!(report.aggregation.len(), 2);

        let json = serde_json::to_value(&report.tables[1]).unwrap();
        assert_eq!(json["aggregated"]["entries"][0]["sqft"], "20");
    }

    #[test]
    fn no_header_is_structural() {
        let sheet = Sheet::from_rows("Empty", vec![vec![text("nothing here")]]);
        let error = process_sheet(&sheet, &Config::default(), AggregationMode::Standard).unwrap_err();
        assert!(matches!(error, StructuralError::NoHeaderRows { .. }));
    }

    #[test]
    fn unmapped_required_columns_are_structural() {
        let grid = vec![vec![text("订单号"), text("物料代码"), text("总张数")], vec![text("PO-1"), text("A"), number("1")]];
        let sheet = Sheet::from_rows("Partial", grid);
        let error = process_sheet(&sheet, &Config::default(), AggregationMode::Standard).unwrap_err();
        match error {
            StructuralError::RequiredColumnsUnmapped { row, missing } => {
                assert_eq!(row, 1);
                assert_eq!(missing, vec!["net", "gross", "sqft"]);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn custom_mode_without_amount_skips_aggregation() {
        let report = process_sheet(&sheet(), &Config::default(), AggregationMode::Custom).unwrap();
        assert!(matches!(report.tables[0].aggregation, StageOutcome::Skipped(_)));
        assert!(report.tables[0].aggregated.is_none());
        assert!(report.aggregation.is_empty());
        assert_eq!(report.fob.combined_po, "");
    }
}
