use crate::processing::round;
use crate::processing::ProcessingError;
use crate::record::RecordSet;
use crate::spreadsheet::Value;
use rust_decimal::Decimal;

/// Spreads group totals of `columns` over the rows of each group, weighted by `basis`.
///
/// A group starts at a row holding a non-zero number and runs over the
/// following rows that are empty or zero in that column. Every row with a
/// positive basis gets `round(total * basis / sum, precision)`, the last of
/// them takes whatever is left so the shares add up to the total exactly.
/// Rows without a positive basis, and rows before the first total, get zero.
/// A group of one row keeps its total. Totals are rounded to `precision`
/// first, so every share carries at most `precision` decimal places.
///
/// Returns a new set; on error the input is untouched.
pub fn distribute_values(
    records: &RecordSet,
    columns: &[String],
    basis: &str,
    precision: u32,
) -> Result<RecordSet, ProcessingError> {
    let weights: Vec<Option<Decimal>> = records
        .column(basis)
        .ok_or_else(|| ProcessingError::MissingBasisColumn(basis.to_owned()))?
        .iter()
        .map(Value::as_decimal)
        .collect();

    let mut distributed = records.clone();
    for column in columns {
        let Some(values) = records.column(column) else {
            tracing::warn!(column = %column, "column to distribute not found, skipped");
            continue;
        };
        let shares = distribute_column(records, column, basis, values, &weights, precision)?;
        distributed.set_column(column, shares.into_iter().map(Value::Number).collect())?;
        tracing::info!(column = %column, basis, rows = records.len(), "distributed column");
    }
    Ok(distributed)
}

fn distribute_column(
    records: &RecordSet,
    column: &str,
    basis: &str,
    values: &[Value],
    weights: &[Option<Decimal>],
    precision: u32,
) -> Result<Vec<Decimal>, ProcessingError> {
    let totals: Vec<Option<Decimal>> = values
        .iter()
        .map(|value| value.as_decimal().filter(|total| !total.is_zero()))
        .collect();
    let mut shares = vec![Decimal::ZERO; totals.len()];

    let mut start = 0;
    while start < totals.len() {
        let Some(total) = totals[start].map(|total| round(total, precision)) else {
            if !values[start].is_blank_or_zero() {
                tracing::warn!(row = records.source_row(start), column, value = %values[start], "not a number, set to 0");
            }
            start += 1;
            continue;
        };
        let end = (start + 1..totals.len())
            .find(|&index| totals[index].is_some())
            .unwrap_or(totals.len());

        if end - start == 1 {
            shares[start] = total;
            start = end;
            continue;
        }

        let members: Vec<(usize, Decimal)> = (start..end)
            .filter_map(|index| weights[index].filter(|weight| weight.is_sign_positive() && !weight.is_zero()).map(|weight| (index, weight)))
            .collect();
        let overflow = || ProcessingError::Overflow {
            row: records.source_row(start),
            column: column.to_owned(),
        };
        let weight_sum = members
            .iter()
            .try_fold(Decimal::ZERO, |sum, (_, weight)| sum.checked_add(*weight))
            .ok_or_else(overflow)?;
        if weight_sum.is_zero() {
            return Err(ProcessingError::ZeroBasis {
                row: records.source_row(start),
                column: column.to_owned(),
                basis: basis.to_owned(),
            });
        }

        let mut assigned = Decimal::ZERO;
        for (position, (index, weight)) in members.iter().enumerate() {
            let share = if position + 1 == members.len() {
                total.checked_sub(assigned).ok_or_else(overflow)?
            } else {
                let share = total
                    .checked_mul(*weight)
                    .and_then(|product| product.checked_div(weight_sum))
                    .ok_or_else(overflow)?;
                round(share, precision)
            };
            assigned = assigned.checked_add(share).ok_or_else(overflow)?;
            shares[*index] = share;
        }
        tracing::debug!(
            row = records.source_row(start),
            column,
            %total,
            rows = end - start,
            "distributed group"
        );
        start = end;
    }
    Ok(shares)
}
