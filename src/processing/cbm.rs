use crate::config::CbmConfig;
use crate::processing::round;
use crate::record::RecordSet;
use crate::record::RowSkip;
use crate::record::Staged;
use crate::spreadsheet::cell::parse_decimal;
use crate::spreadsheet::Value;
use regex::Regex;
use rust_decimal::Decimal;
use std::sync::LazyLock;

static DIMENSION_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[xX]").expect("Hardcode regex pattern"));

/// Derives the volume column of one table.
///
/// With length, width and height fields configured and present, the volume is
/// their product (times the per-unit field, if configured) divided by
/// `unit_divisor`. Otherwise the existing volume column is normalized: numbers
/// are rounded and `L*W*H` or `LxWxH` text is multiplied out. Rows that cannot
/// be computed get an empty volume and a [`RowSkip`].
pub fn process_cbm_column(mut records: RecordSet, config: &CbmConfig) -> Staged<RecordSet> {
    let mut skipped = Vec::new();
    let volumes: Vec<Value> = if !config.dimensions.is_empty()
        && config.dimensions.iter().all(|field| records.contains(field))
    {
        tracing::info!(dimensions = ?config.dimensions, "computing volume from dimensions");
        (0..records.len())
            .map(|index| match volume_from_dimensions(&records, index, config) {
                Ok(volume) => Value::Number(volume),
                Err(reason) => {
                    skipped.push(RowSkip::new(records.source_row(index), &config.field, reason));
                    Value::Empty
                }
            })
            .collect()
    } else if let Some(column) = records.column(&config.field) {
        tracing::info!(field = %config.field, rows = column.len(), "normalizing volume column");
        column
            .iter()
            .enumerate()
            .map(|(index, value)| match parse_volume(value, config) {
                Ok(volume) => volume.map(Value::Number).unwrap_or_default(),
                Err(reason) => {
                    skipped.push(RowSkip::new(records.source_row(index), &config.field, reason));
                    Value::Empty
                }
            })
            .collect()
    } else {
        tracing::debug!(field = %config.field, "no volume or dimension columns");
        return Staged::new(records, skipped);
    };

    for skip in &skipped {
        tracing::warn!(row = skip.row, reason = %skip.reason, "volume left empty");
    }
    // The column is rebuilt from the set's own rows, so the lengths match.
    if let Err(error) = records.set_column(&config.field, volumes) {
        tracing::error!(%error, "volume column rejected");
    }
    Staged::new(records, skipped)
}

fn volume_from_dimensions(records: &RecordSet, index: usize, config: &CbmConfig) -> Result<Decimal, String> {
    let mut factors = Vec::with_capacity(4);
    for field in config.dimensions.iter().chain(config.per_unit_field.iter()) {
        let factor = records
            .value(field, index)
            .and_then(Value::as_decimal)
            .ok_or_else(|| format!("'{field}' is missing or not numeric"))?;
        factors.push(factor);
    }
    multiply(&factors, config)
}

/// `Ok(None)` for an empty cell.
fn parse_volume(value: &Value, config: &CbmConfig) -> Result<Option<Decimal>, String> {
    match value {
        Value::Empty => Ok(None),
        Value::Number(number) => Ok(Some(round(*number, config.precision))),
        Value::Text(text) => {
            if let Some(number) = parse_decimal(text) {
                return Ok(Some(round(number, config.precision)));
            }
            let parts = split_dimensions(text);
            if parts.len() != 3 {
                return Err(format!("'{text}' is not L*W*H or LxWxH"));
            }
            let factors = parts
                .iter()
                .map(|part| parse_decimal(part).ok_or_else(|| format!("'{part}' in '{text}' is not numeric")))
                .collect::<Result<Vec<_>, _>>()?;
            multiply(&factors, config).map(Some)
        }
        other => Err(format!("unexpected volume value '{other}'")),
    }
}

fn split_dimensions(text: &str) -> Vec<&str> {
    let parts: Vec<&str> = text.split('*').collect();
    if parts.len() != 3 && !text.contains('*') && DIMENSION_SEPARATOR.is_match(text) {
        return DIMENSION_SEPARATOR.split(text).collect();
    }
    parts
}

fn multiply(factors: &[Decimal], config: &CbmConfig) -> Result<Decimal, String> {
    let product = factors
        .iter()
        .try_fold(Decimal::ONE, |product, factor| product.checked_mul(*factor))
        .and_then(|product| product.checked_div(config.unit_divisor))
        .ok_or_else(|| "volume overflows".to_owned())?;
    Ok(round(product, config.precision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn decimal(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    fn records(columns: &[(&str, Vec<Value>)]) -> RecordSet {
        let rows = columns.first().map(|(_, values)| values.len()).unwrap_or(0);
        let mut records = RecordSet::with_fields(columns.iter().map(|(field, _)| *field));
        for index in 0..rows {
            records.push_row(10 + index, |field| {
                columns
                    .iter()
                    .find(|(name, _)| *name == field)
                    .map(|(_, values)| values[index].clone())
                    .unwrap_or_default()
            });
        }
        records
    }

    #[test]
    fn parses_dimension_text() {
        let input = records(&[(
            "cbm",
            vec![
                Value::from("1.2*0.8*0.5"),
                Value::from("1.2 x 1 X 0.25"),
                Value::Number(decimal("0.123456")),
                Value::Empty,
                Value::from("about 2"),
                Value::from("1*2"),
            ],
        )]);
        let staged = process_cbm_column(input, &CbmConfig::default());
        assert_eq!(
            staged.value.column("cbm").unwrap(),
            &[
                Value::Number(decimal("0.48")),
                Value::Number(decimal("0.3")),
                Value::Number(decimal("0.1235")),
                Value::Empty,
                Value::Empty,
                Value::Empty,
            ]
        );
        assert_eq!(staged.skipped.iter().map(|skip| skip.row).collect::<Vec<_>>(), vec![14, 15]);
        assert!(staged.skipped.iter().all(|skip| skip.field == "cbm"));
    }

    #[test]
    fn computes_from_dimension_columns() {
        let input = records(&[
            ("length", vec![Value::from("120"), Value::from("100")]),
            ("width", vec![Value::Number(decimal("80")), Value::from("n/a")]),
            ("height", vec![Value::Number(decimal("50")), Value::Number(decimal("50"))]),
            ("pcs", vec![Value::Number(decimal("2")), Value::Number(decimal("1"))]),
        ]);
        let config = CbmConfig {
            dimensions: vec!["length".into(), "width".into(), "height".into()],
            per_unit_field: Some("pcs".into()),
            unit_divisor: decimal("1000000"),
            ..CbmConfig::default()
        };
        let staged = process_cbm_column(input, &config);
        assert_eq!(
            staged.value.column("cbm").unwrap(),
            &[Value::Number(decimal("0.96")), Value::Empty]
        );
        assert_eq!(staged.skipped.len(), 1);
        assert_eq!(staged.skipped[0].row, 11);
        assert!(staged.skipped[0].reason.contains("width"));
    }

    #[test]
    fn table_without_volume_is_unchanged() {
        let input = records(&[("po", vec![Value::from("PO-1")])]);
        let staged = process_cbm_column(input.clone(), &CbmConfig::default());
        assert_eq!(staged.value, input);
        assert!(staged.skipped.is_empty());
    }
}
