use crate::config::Config;
use crate::config::FobConfig;
use crate::extraction::ColumnMapping;
use crate::processing::Aggregation;
use crate::processing::AggregationMode;
use crate::processing::FobSummary;
use crate::record::RecordSet;
use crate::record::RowSkip;
use crate::spreadsheet::Sheet;
use chrono::DateTime;
use chrono::Local;
use serde::Serialize;

/// What became of one stage for one table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StageOutcome {
    #[default]
    Succeeded,
    Skipped(String),
    /// The stage failed and the table kept its previous values
    FellBack(String),
}

#[derive(Clone, Debug, Serialize)]
pub struct TableReport {
    pub index: usize,
    pub header_row: usize,
    pub cbm: StageOutcome,
    pub distribution: StageOutcome,
    pub aggregation: StageOutcome,
    /// This table's own aggregation, before merging into the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregated: Option<Aggregation>,
    pub skipped_rows: Vec<RowSkip>,
    pub records: RecordSet,
}

impl TableReport {
    pub fn new(index: usize, header_row: usize) -> Self {
        Self {
            index,
            header_row,
            cbm: StageOutcome::default(),
            distribution: StageOutcome::default(),
            aggregation: StageOutcome::default(),
            aggregated: None,
            skipped_rows: Vec::new(),
            records: RecordSet::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RunMetadata {
    pub workbook: String,
    pub sheet: String,
    pub aggregation_mode: AggregationMode,
    pub fob: FobConfig,
    pub processed_at: DateTime<Local>,
}

impl RunMetadata {
    pub fn new(sheet: &Sheet, config: &Config, mode: AggregationMode) -> Self {
        Self {
            workbook: sheet.file_name.to_owned(),
            sheet: sheet.name.to_owned(),
            aggregation_mode: mode,
            fob: config.fob.clone(),
            processed_at: Local::now(),
        }
    }
}

/// Everything a run produced, serializable as the JSON report.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub header_rows: Vec<usize>,
    pub mapping: ColumnMapping,
    pub tables: Vec<TableReport>,
    pub aggregation: Aggregation,
    pub fob: FobSummary,
}

impl RunReport {
    /// Tables whose distribution fell back.
    pub fn fallbacks(&self) -> impl Iterator<Item = &TableReport> {
        self.tables
            .iter()
            .filter(|table| matches!(table.distribution, StageOutcome::FellBack(_)))
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Logs one line per table and the FOB totals.
    pub fn log_summary(&self) {
        for table in &self.tables {
            tracing::info!(
                table = table.index,
                header_row = table.header_row,
                rows = table.records.len(),
                cbm = ?table.cbm,
                distribution = ?table.distribution,
                aggregation = ?table.aggregation,
                skipped_rows = table.skipped_rows.len(),
                "table processed"
            );
        }
        let fallbacks = self.fallbacks().count();
        if fallbacks > 0 {
            tracing::warn!(fallbacks, "some tables kept undistributed values");
        }
        tracing::info!(
            workbook = %self.metadata.workbook,
            sheet = %self.metadata.sheet,
            tables = self.tables.len(),
            keys = self.aggregation.len(),
            total_sqft = %self.fob.total_sqft,
            total_amount = %self.fob.total_amount,
            "run complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::Value;
    use serde_json::json;

    #[test]
    fn outcomes_serialize_with_reason() {
        assert_eq!(serde_json::to_value(StageOutcome::Succeeded).unwrap(), json!({"status": "succeeded"}));
        assert_eq!(
            serde_json::to_value(StageOutcome::FellBack("zero basis".to_owned())).unwrap(),
            json!({"status": "fell_back", "reason": "zero basis"})
        );
    }

    #[test]
    fn report_serializes_tables_and_summary() {
        let sheet = Sheet::from_rows("Packing", vec![vec![Value::from("x")]]);
        let mut table = TableReport::new(0, 5);
        table.distribution = StageOutcome::FellBack("zero basis".to_owned());
        table.records = RecordSet::with_fields(["po"]);
        table.records.push_row(6, |_| Value::from("PO-1"));
        let report = RunReport {
            metadata: RunMetadata::new(&sheet, &Config::default(), AggregationMode::Standard),
            header_rows: vec![5],
            mapping: ColumnMapping::default(),
            tables: vec![table],
            aggregation: Aggregation::empty(AggregationMode::Standard),
            fob: FobSummary::default(),
        };
        assert_eq!(report.fallbacks().count(), 1);

        let value: serde_json::Value = serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["metadata"]["sheet"], "Packing");
        assert_eq!(value["metadata"]["aggregation_mode"], "standard");
        assert_eq!(value["metadata"]["fob"]["chunk_size"], 2);
        assert_eq!(value["tables"][0]["records"]["columns"]["po"][0], "PO-1");
        assert_eq!(value["tables"][0]["records"]["source_rows"][0], 6);
        assert_eq!(value["aggregation"], json!({"mode": "standard", "entries": []}));
        assert_eq!(value["fob"]["total_sqft"], "0");
    }
}
