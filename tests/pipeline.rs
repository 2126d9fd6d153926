use rust_decimal::Decimal;
use rusty_invoice::pipeline::StageOutcome;
use rusty_invoice::processing::AggregationMode;
use rusty_invoice::spreadsheet::Value;
use rusty_invoice::Config;
use rusty_invoice::StructuralError;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <bookViews><workbookView activeTab="0"/></bookViews>
  <sheets>
    <sheet name="Packing" sheetId="1" r:id="rId1"/>
    <sheet name="Blank" sheetId="2" r:id="rId2"/>
  </sheets>
</workbook>"#;

const RELATIONSHIPS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/>
</Relationships>"#;

#[derive(Clone, Copy)]
enum Cell<'a> {
    Text(&'a str),
    Number(&'a str),
    Empty,
}

use Cell::Empty;
use Cell::Number;
use Cell::Text;

fn sheet_xml(rows: &[(usize, Vec<Cell>)]) -> String {
    let mut xml = String::from(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#);
    for (row, cells) in rows {
        xml.push_str(&format!(r#"<row r="{row}">"#));
        for (index, cell) in cells.iter().enumerate() {
            let reference = format!("{}{row}", char::from(b'A' + index as u8));
            match cell {
                Text(text) => xml.push_str(&format!(r#"<c r="{reference}" t="inlineStr"><is><t>{text}</t></is></c>"#)),
                Number(number) => xml.push_str(&format!(r#"<c r="{reference}"><v>{number}</v></c>"#)),
                Empty => {}
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn write_workbook(dir: &Path, file_name: &str, rows: &[(usize, Vec<Cell>)]) -> PathBuf {
    let path = dir.join(file_name);
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = ZipWriter::new(file);
    let blank = sheet_xml(&[]);
    let packing = sheet_xml(rows);
    for (name, content) in [
        ("xl/workbook.xml", WORKBOOK),
        ("xl/_rels/workbook.xml.rels", RELATIONSHIPS),
        ("xl/worksheets/sheet1.xml", packing.as_str()),
        ("xl/worksheets/sheet2.xml", blank.as_str()),
    ] {
        writer.start_file(name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
    path
}

fn header<'a>() -> Vec<Cell<'a>> {
    ["订单号", "物料代码", "总张数", "净重", "毛重", "单价", "SQFT", "金额"]
        .into_iter()
        .map(Text)
        .collect()
}

fn packing_list<'a>() -> Vec<(usize, Vec<Cell<'a>>)> {
    vec![
        (1, vec![Text("PACKING LIST")]),
        (5, header()),
        (6, vec![Text("PO-1"), Text("A"), Number("2"), Number("100"), Number("110"), Number("1.5"), Number("10"), Number("15")]),
        (7, vec![Text("PO-1"), Text("A"), Number("3"), Empty, Empty, Number("1.5"), Number("20"), Number("30")]),
        (8, vec![Text("PO-2"), Text("B"), Number("5"), Empty, Empty, Number("2"), Number("30"), Number("60")]),
        (9, vec![Empty, Text("合计"), Number("10"), Number("100")]),
        (40, header()),
        (41, vec![Text("PO-3"), Text("C"), Number("4"), Number("8"), Number("9"), Number("3.25"), Number("5"), Number("16.25")]),
    ]
}

fn decimal(text: &str) -> Decimal {
    Decimal::from_str(text).unwrap()
}

fn number(text: &str) -> Value {
    Value::Number(decimal(text))
}

#[test]
fn processes_stacked_tables_end_to_end() {
    let dir = TempDir::new().unwrap();
    let path = write_workbook(dir.path(), "packing.xlsx", &packing_list());
    let report = rusty_invoice::run(path.to_str().unwrap(), &Config::default()).unwrap();

    assert_eq!(report.metadata.sheet, "Packing");
    assert_eq!(report.metadata.aggregation_mode, AggregationMode::Standard);
    assert_eq!(report.header_rows, vec![5, 40]);
    assert_eq!(report.tables.len(), 2);

    let first = &report.tables[0];
    assert_eq!(first.records.source_rows(), &[6, 7, 8]);
    assert_eq!(first.distribution, StageOutcome::Succeeded);
    assert_eq!(first.records.column("net").unwrap(), &[number("20"), number("30"), number("50")]);
    assert_eq!(first.records.column("gross").unwrap(), &[number("22"), number("33"), number("55")]);
    assert!(matches!(first.cbm, StageOutcome::Skipped(_)));

    let second = &report.tables[1];
    assert_eq!(second.records.source_rows(), &[41]);
    assert_eq!(second.records.column("net").unwrap(), &[number("8")]);

    assert_eq!(report.aggregation.len(), 3);
    assert_eq!(report.fob.combined_po, "PO-1\\PO-2\nPO-3");
    assert_eq!(report.fob.combined_item, "A\\B\nC");
    assert_eq!(report.fob.total_sqft, decimal("65"));
    assert_eq!(report.fob.total_amount, decimal("121.25"));

    let json: serde_json::Value = serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
    assert_eq!(json["tables"][0]["distribution"]["status"], "succeeded");
    assert_eq!(json["tables"][1]["aggregated"]["entries"][0]["po"], "PO-3");
    assert_eq!(json["aggregation"]["entries"][0]["po"], "PO-1");
    assert_eq!(json["aggregation"]["entries"][0]["sqft"], "30");
    assert_eq!(json["aggregation"]["entries"][0]["amount"], "45");
}

#[test]
fn prefix_selects_custom_aggregation() {
    let dir = TempDir::new().unwrap();
    let path = write_workbook(dir.path(), "FOB-packing.xlsx", &packing_list());
    let mut config = Config::default();
    config.aggregation.custom_prefixes = vec!["FOB-".to_owned()];
    let report = rusty_invoice::run(path.to_str().unwrap(), &config).unwrap();

    assert_eq!(report.metadata.aggregation_mode, AggregationMode::Custom);
    assert_eq!(report.aggregation.len(), 3);
    assert_eq!(report.fob.total_sqft, decimal("65"));
    assert_eq!(report.fob.total_amount, decimal("121.25"));
}

#[test]
fn zero_basis_table_falls_back_alone() {
    let dir = TempDir::new().unwrap();
    let mut rows = packing_list();
    rows.push((42, vec![Text("PO-3"), Text("C"), Number("0"), Empty, Empty, Number("3.25"), Number("1"), Number("1")]));
    rows[7].1[2] = Number("0");
    let path = write_workbook(dir.path(), "packing.xlsx", &rows);
    let report = rusty_invoice::run(path.to_str().unwrap(), &Config::default()).unwrap();

    assert_eq!(report.tables[0].distribution, StageOutcome::Succeeded);
    assert!(matches!(report.tables[1].distribution, StageOutcome::FellBack(_)));
    assert!(matches!(report.tables[1].aggregation, StageOutcome::Skipped(_)));
    assert_eq!(report.tables[1].records.column("net").unwrap(), &[number("8"), Value::Empty]);
    assert_eq!(report.fob.combined_po, "PO-1\\PO-2");
    assert_eq!(report.fob.total_sqft, decimal("60"));
}

#[test]
fn sheet_without_headers_halts() {
    let dir = TempDir::new().unwrap();
    let path = write_workbook(dir.path(), "packing.xlsx", &packing_list());
    let mut config = Config::default();
    config.sheet = Some("Bla*".to_owned());
    let error = rusty_invoice::run(path.to_str().unwrap(), &config).unwrap_err();
    assert!(matches!(error, StructuralError::NoHeaderRows { .. }));
}

#[test]
fn unknown_sheet_is_unreadable() {
    let dir = TempDir::new().unwrap();
    let path = write_workbook(dir.path(), "packing.xlsx", &packing_list());
    let mut config = Config::default();
    config.sheet = Some("Invoice*".to_owned());
    let error = rusty_invoice::run(path.to_str().unwrap(), &config).unwrap_err();
    assert!(matches!(error, StructuralError::SheetUnreadable(_)));
    assert!(error.to_string().contains("Invoice*"));
}
