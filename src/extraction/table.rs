use crate::config::ExtractionConfig;
use crate::extraction::normalize_text;
use crate::extraction::ColumnMapping;
use crate::record::RecordSet;
use crate::spreadsheet::Sheet;
use crate::spreadsheet::Value;
use std::collections::BTreeMap;

/// Where a table ends below its header row.
#[derive(Clone, Debug)]
pub struct ExtractionRules {
    pub stop_field: Option<String>,
    /// Lower-cased, whitespace-collapsed sentinels
    pub stop_sentinels: Vec<String>,
    pub stop_on_empty: bool,
    pub max_rows_per_table: usize,
}

impl From<&ExtractionConfig> for ExtractionRules {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            stop_field: config.stop_field.clone(),
            stop_sentinels: config
                .stop_sentinels
                .iter()
                .map(|sentinel| normalize_text(&Value::from(sentinel.as_str())).to_lowercase())
                .filter(|sentinel| !sentinel.is_empty())
                .collect(),
            stop_on_empty: config.stop_on_empty,
            max_rows_per_table: config.max_rows_per_table,
        }
    }
}

impl ExtractionRules {
    /// A cell stops the table when it is a sentinel, or starts with one
    /// followed by anything but an ASCII letter or digit.
    fn is_stop_value(&self, value: &Value) -> bool {
        let text = normalize_text(value).to_lowercase();
        if text.is_empty() {
            return self.stop_on_empty;
        }
        self.stop_sentinels.iter().any(|sentinel| {
            text.strip_prefix(sentinel.as_str())
                .is_some_and(|rest| rest.chars().next().map_or(true, |next| !next.is_ascii_alphanumeric()))
        })
    }
}

/// Extracts one table per header row, keyed by the header's ordinal.
///
/// Each table covers the rows strictly below its header, up to whichever
/// comes first of the next header row, a stop value in the stop column,
/// `max_rows_per_table` scanned rows and the last populated row. Rows where
/// every mapped field is empty are left out without ending the table.
pub fn extract_multiple_tables(
    sheet: &Sheet,
    header_rows: &[usize],
    mapping: &ColumnMapping,
    rules: &ExtractionRules,
) -> BTreeMap<usize, RecordSet> {
    let stop_col = rules.stop_field.as_deref().and_then(|field| {
        let col = mapping.get(field);
        if col.is_none() {
            tracing::warn!(field, "stop field is not mapped, tables end at the row limit or the next header");
        }
        col
    });

    header_rows
        .iter()
        .enumerate()
        .map(|(index, &header_row)| {
            let next_header = header_rows.get(index + 1).copied();
            let records = extract_table(sheet, header_row, next_header, mapping, stop_col, rules);
            tracing::info!(table = index, header_row, rows = records.len(), "extracted table");
            (index, records)
        })
        .collect()
}

fn extract_table(
    sheet: &Sheet,
    header_row: usize,
    next_header: Option<usize>,
    mapping: &ColumnMapping,
    stop_col: Option<usize>,
    rules: &ExtractionRules,
) -> RecordSet {
    let mut records = RecordSet::with_fields(mapping.fields());
    let mut last_row = sheet.max_row.min(header_row.saturating_add(rules.max_rows_per_table));
    if let Some(next_header) = next_header {
        last_row = last_row.min(next_header.saturating_sub(1));
    }

    for row in header_row + 1..=last_row {
        if let Some(col) = stop_col {
            let value = sheet.value(row, col);
            if rules.is_stop_value(&value) {
                tracing::debug!(row, value = %value, "stop value reached");
                break;
            }
        }
        if sheet.is_blank_row(row, mapping.iter().map(|(_, col)| col)) {
            tracing::debug!(row, "skipped blank row");
            continue;
        }
        records.push_row(row, |field| {
            mapping
                .get(field)
                .map(|col| sheet.value(row, col))
                .unwrap_or_default()
        });
    }

    if last_row == header_row + rules.max_rows_per_table && records.len() == rules.max_rows_per_table {
        tracing::warn!(header_row, limit = rules.max_rows_per_table, "row limit reached, table may be incomplete");
    }
    records
}
