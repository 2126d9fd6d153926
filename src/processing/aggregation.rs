use crate::config::field;
use crate::processing::round;
use crate::record::RecordSet;
use crate::record::RowSkip;
use crate::record::Staged;
use crate::spreadsheet::Value;
use rust_decimal::Decimal;
use serde::ser::SerializeSeq;
use serde::Serialize;
use serde::Serializer;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Fields the (PO, Item, UnitPrice) aggregation requires. Amount is summed
/// too when the table maps it.
pub const STANDARD_FIELDS: [&str; 4] = [field::PO, field::ITEM, field::UNIT, field::SQFT];
/// Fields the (PO, Item) aggregation requires.
pub const CUSTOM_FIELDS: [&str; 4] = [field::PO, field::ITEM, field::SQFT, field::AMOUNT];

const MISSING_PO: &str = "<MISSING_PO>";
const MISSING_ITEM: &str = "<MISSING_ITEM>";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    /// SQFT and Amount by (PO, Item, UnitPrice)
    Standard,
    /// SQFT and Amount by (PO, Item)
    Custom,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SqftKey {
    pub po: String,
    pub item: String,
    /// Rounded to the configured price precision
    pub unit_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PoItemKey {
    pub po: String,
    pub item: String,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub sqft: Decimal,
    pub amount: Decimal,
}

impl Totals {
    pub fn checked_add(self, other: Totals) -> Option<Totals> {
        Some(Totals {
            sqft: self.sqft.checked_add(other.sqft)?,
            amount: self.amount.checked_add(other.amount)?,
        })
    }
}

/// Summed SQFT and Amount per key, in key order.
#[derive(Clone, Debug, PartialEq)]
pub struct Sums<K: Ord>(BTreeMap<K, Totals>);

/// Sums per (PO, Item, UnitPrice).
pub type SqftAggregation = Sums<SqftKey>;
/// Sums per (PO, Item).
pub type PoItemAggregation = Sums<PoItemKey>;

impl<K: Ord> Default for Sums<K> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<K: Ord + Debug> Sums<K> {
    /// Adds `totals` to the entry of `key`. Returns `false`, leaving the
    /// entry unchanged, when the sum would overflow.
    #[must_use]
    pub fn add(&mut self, key: K, totals: Totals) -> bool {
        let entry = self.0.entry(key).or_default();
        match entry.checked_add(totals) {
            Some(sum) => {
                *entry = sum;
                true
            }
            None => false,
        }
    }

    /// Folds `other` in, returning the keys whose sums would overflow.
    pub fn merge(&mut self, other: Sums<K>) -> Vec<K>
    where
        K: Clone,
    {
        let mut overflowed = Vec::new();
        for (key, totals) in other.0 {
            if !self.add(key.clone(), totals) {
                overflowed.push(key);
            }
        }
        overflowed
    }

    pub fn get(&self, key: &K) -> Option<Totals> {
        self.0.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Totals)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Ord + Serialize> Serialize for Sums<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Entry<'a, K> {
            #[serde(flatten)]
            key: &'a K,
            #[serde(flatten)]
            totals: &'a Totals,
        }
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for (key, totals) in &self.0 {
            seq.serialize_element(&Entry { key, totals })?;
        }
        seq.end()
    }
}

/// An aggregation of one table or of a whole run, in the mode chosen for the workbook.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "mode", content = "entries", rename_all = "lowercase")]
pub enum Aggregation {
    Standard(SqftAggregation),
    Custom(PoItemAggregation),
}

impl Aggregation {
    pub fn empty(mode: AggregationMode) -> Self {
        match mode {
            AggregationMode::Standard => Aggregation::Standard(SqftAggregation::default()),
            AggregationMode::Custom => Aggregation::Custom(PoItemAggregation::default()),
        }
    }

    /// Aggregates one table in `mode`.
    pub fn of_table(mode: AggregationMode, records: &RecordSet, price_precision: u32) -> Staged<Aggregation> {
        match mode {
            AggregationMode::Standard => {
                let staged = aggregate_sqft_by_po_item_price(records, price_precision);
                Staged::new(Aggregation::Standard(staged.value), staged.skipped)
            }
            AggregationMode::Custom => {
                let staged = aggregate_custom_by_po_item(records);
                Staged::new(Aggregation::Custom(staged.value), staged.skipped)
            }
        }
    }

    pub fn mode(&self) -> AggregationMode {
        match self {
            Aggregation::Standard(_) => AggregationMode::Standard,
            Aggregation::Custom(_) => AggregationMode::Custom,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Aggregation::Standard(sums) => sums.len(),
            Aggregation::Custom(sums) => sums.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Folds another aggregation of the same mode in. Entries whose sums
    /// would overflow keep their previous value.
    pub fn merge(&mut self, other: Aggregation) {
        match (self, other) {
            (Aggregation::Standard(sums), Aggregation::Standard(other)) => {
                for key in sums.merge(other) {
                    tracing::error!(?key, "sum overflows, table not merged for this key");
                }
            }
            (Aggregation::Custom(sums), Aggregation::Custom(other)) => {
                for key in sums.merge(other) {
                    tracing::error!(?key, "sum overflows, table not merged for this key");
                }
            }
            (this, other) => {
                tracing::error!(mode = ?this.mode(), other = ?other.mode(), "cannot merge aggregations of different modes");
            }
        }
    }
}

/// Sums SQFT, and Amount when mapped, per (PO, Item, UnitPrice), the price
/// rounded to `price_precision` before keying. Without all of po, item, unit
/// and sqft the result is empty; rows missing any of them, or with a
/// non-numeric price or SQFT, are skipped. A non-numeric Amount counts as zero.
pub fn aggregate_sqft_by_po_item_price(records: &RecordSet, price_precision: u32) -> Staged<SqftAggregation> {
    let mut aggregation = SqftAggregation::default();
    let mut skipped = Vec::new();
    let missing = records.missing_fields(&STANDARD_FIELDS);
    if !missing.is_empty() {
        tracing::info!(?missing, "fields missing, nothing to aggregate");
        return Staged::new(aggregation, skipped);
    }
    let has_amount = records.contains(field::AMOUNT);

    for index in 0..records.len() {
        let row = records.source_row(index);
        let value = |name: &str| records.value(name, index).cloned().unwrap_or_default();
        let po = value(field::PO).as_key();
        let item = value(field::ITEM).as_key();
        let unit = value(field::UNIT);
        let sqft = value(field::SQFT);

        let (po, item) = match (po, item) {
            (Some(po), Some(item)) => (po, item),
            (None, _) => {
                skipped.push(RowSkip::new(row, field::PO, "missing"));
                continue;
            }
            (_, None) => {
                skipped.push(RowSkip::new(row, field::ITEM, "missing"));
                continue;
            }
        };
        let Some(unit_price) = unit.as_decimal() else {
            skipped.push(RowSkip::new(row, field::UNIT, describe(&unit)));
            continue;
        };
        let Some(sqft) = sqft.as_decimal() else {
            skipped.push(RowSkip::new(row, field::SQFT, describe(&sqft)));
            continue;
        };
        let amount = if has_amount {
            amount_or_zero(&value(field::AMOUNT), row, field::AMOUNT, &mut skipped)
        } else {
            Decimal::ZERO
        };
        let key = SqftKey {
            po,
            item,
            unit_price: round(unit_price, price_precision).normalize(),
        };
        tracing::debug!(row, ?key, %sqft, %amount, "aggregated row");
        if !aggregation.add(key, Totals { sqft, amount }) {
            skipped.push(RowSkip::new(row, field::SQFT, "sum overflows"));
        }
    }

    tracing::info!(keys = aggregation.len(), skipped = skipped.len(), "aggregated by po, item and price");
    Staged::new(aggregation, skipped)
}

/// Sums SQFT and Amount per (PO, Item). Without all of po, item, sqft and
/// amount the result is empty. A blank PO or Item is keyed as a placeholder,
/// non-numeric SQFT or Amount counts as zero.
pub fn aggregate_custom_by_po_item(records: &RecordSet) -> Staged<PoItemAggregation> {
    let mut aggregation = PoItemAggregation::default();
    let mut skipped = Vec::new();
    let missing = records.missing_fields(&CUSTOM_FIELDS);
    if !missing.is_empty() {
        tracing::info!(?missing, "fields missing, nothing to aggregate");
        return Staged::new(aggregation, skipped);
    }

    for index in 0..records.len() {
        let row = records.source_row(index);
        let value = |name: &str| records.value(name, index).cloned().unwrap_or_default();
        let key = PoItemKey {
            po: value(field::PO).as_key().unwrap_or_else(|| MISSING_PO.to_owned()),
            item: value(field::ITEM).as_key().unwrap_or_else(|| MISSING_ITEM.to_owned()),
        };
        let totals = Totals {
            sqft: amount_or_zero(&value(field::SQFT), row, field::SQFT, &mut skipped),
            amount: amount_or_zero(&value(field::AMOUNT), row, field::AMOUNT, &mut skipped),
        };
        if !aggregation.add(key, totals) {
            skipped.push(RowSkip::new(row, field::SQFT, "sum overflows"));
        }
    }

    tracing::info!(keys = aggregation.len(), skipped = skipped.len(), "aggregated by po and item");
    Staged::new(aggregation, skipped)
}

fn amount_or_zero(cell: &Value, row: usize, name: &str, skipped: &mut Vec<RowSkip>) -> Decimal {
    cell.as_decimal().unwrap_or_else(|| {
        if !cell.is_empty() {
            skipped.push(RowSkip::new(row, name, format!("{} counted as 0", describe(cell))));
        }
        Decimal::ZERO
    })
}

fn describe(value: &Value) -> String {
    if value.is_empty() {
        "missing".to_owned()
    } else {
        format!("'{value}' is not numeric")
    }
}
