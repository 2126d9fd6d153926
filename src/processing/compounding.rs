use crate::config::FobConfig;
use crate::processing::aggregation::Totals;
use crate::processing::Aggregation;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;

/// One run's aggregation folded into a single FOB line.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FobSummary {
    pub combined_po: String,
    pub combined_item: String,
    pub total_sqft: Decimal,
    /// Zero in standard mode when no table maps an amount column
    pub total_amount: Decimal,
}

/// Combines the unique POs and Items of `aggregation` into chunked strings
/// and totals its SQFT and Amount.
///
/// Values are sorted, grouped `chunk_size` at a time, joined with the
/// intra-chunk separator inside a chunk and the inter-chunk separator between
/// chunks. An empty aggregation gives empty strings and zero totals. An
/// entry whose totals would overflow the running sum is left out of the
/// totals and logged.
pub fn perform_fob_compounding(aggregation: &Aggregation, config: &FobConfig) -> FobSummary {
    if aggregation.is_empty() {
        tracing::warn!(mode = ?aggregation.mode(), "aggregation is empty, FOB summary left blank");
        return FobSummary::default();
    }

    let mut pos = BTreeSet::new();
    let mut items = BTreeSet::new();
    let mut totals = Totals::default();
    let mut fold = |po: &str, item: &str, entry: &Totals| match totals.checked_add(*entry) {
        Some(sum) => totals = sum,
        None => tracing::error!(po, item, sqft = %entry.sqft, amount = %entry.amount, "total overflows, entry left out"),
    };
    match aggregation {
        Aggregation::Standard(entries) => {
            for (key, entry) in entries.iter() {
                pos.insert(key.po.as_str());
                items.insert(key.item.as_str());
                fold(&key.po, &key.item, entry);
            }
        }
        Aggregation::Custom(entries) => {
            for (key, entry) in entries.iter() {
                pos.insert(key.po.as_str());
                items.insert(key.item.as_str());
                fold(&key.po, &key.item, entry);
            }
        }
    }
    tracing::debug!(?pos, ?items, "unique values before chunking");

    let summary = FobSummary {
        combined_po: format_chunks(&pos, config),
        combined_item: format_chunks(&items, config),
        total_sqft: totals.sqft,
        total_amount: totals.amount,
    };
    tracing::info!(
        pos = pos.len(),
        items = items.len(),
        total_sqft = %summary.total_sqft,
        total_amount = %summary.total_amount,
        "FOB compounding complete"
    );
    summary
}

fn format_chunks(values: &BTreeSet<&str>, config: &FobConfig) -> String {
    let values: Vec<&str> = values.iter().copied().collect();
    values
        .chunks(config.chunk_size.max(1))
        .map(|chunk| chunk.join(config.intra_chunk_separator.as_str()))
        .collect::<Vec<_>>()
        .join(config.inter_chunk_separator.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::aggregation::PoItemAggregation;
    use crate::processing::aggregation::PoItemKey;
    use crate::processing::aggregation::SqftAggregation;
    use crate::processing::aggregation::SqftKey;
    use crate::processing::AggregationMode;
    use std::str::FromStr;

    fn decimal(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    fn totals(sqft: &str, amount: &str) -> Totals {
        Totals {
            sqft: decimal(sqft),
            amount: decimal(amount),
        }
    }

    fn sqft_key(po: &str, item: &str, price: &str) -> SqftKey {
        SqftKey {
            po: po.to_owned(),
            item: item.to_owned(),
            unit_price: decimal(price),
        }
    }

    #[test]
    fn chunks_sorted_unique_values() {
        let mut entries = SqftAggregation::default();
        assert!(entries.add(sqft_key("PO-3", "B", "1"), totals("1.5", "0")));
        assert!(entries.add(sqft_key("PO-1", "A", "1"), totals("2", "4")));
        assert!(entries.add(sqft_key("PO-1", "A", "2"), totals("3", "6")));
        assert!(entries.add(sqft_key("PO-2", "C", "1"), totals("4", "0.5")));
        let summary = perform_fob_compounding(&Aggregation::Standard(entries), &FobConfig::default());
        assert_eq!(summary.combined_po, "PO-1\\PO-2\nPO-3");
        assert_eq!(summary.combined_item, "A\\B\nC");
        assert_eq!(summary.total_sqft, decimal("10.5"));
        assert_eq!(summary.total_amount, decimal("10.5"));
    }

    #[test]
    fn custom_mode_totals_amount() {
        let mut entries = PoItemAggregation::default();
        let key = |po: &str, item: &str| PoItemKey { po: po.to_owned(), item: item.to_owned() };
        assert!(entries.add(key("PO-1", "A"), totals("10", "99.99")));
        assert!(entries.add(key("PO-2", "A"), totals("5", "0.01")));
        let config = FobConfig {
            chunk_size: 3,
            intra_chunk_separator: "/".to_owned(),
            inter_chunk_separator: "; ".to_owned(),
        };
        let summary = perform_fob_compounding(&Aggregation::Custom(entries), &config);
        assert_eq!(summary.combined_po, "PO-1/PO-2");
        assert_eq!(summary.combined_item, "A");
        assert_eq!(summary.total_sqft, decimal("15"));
        assert_eq!(summary.total_amount, decimal("100"));
    }

    #[test]
    fn empty_aggregation_gives_blank_summary() {
        let summary = perform_fob_compounding(&Aggregation::empty(AggregationMode::Custom), &FobConfig::default());
        assert_eq!(summary, FobSummary::default());
        assert_eq!(summary.combined_po, "");
        assert_eq!(summary.total_sqft, Decimal::ZERO);
    }

    #[test]
    fn overflowing_entry_is_left_out_of_totals() {
        let mut entries = SqftAggregation::default();
        assert!(entries.add(sqft_key("PO-1", "A", "1"), Totals { sqft: Decimal::MAX, amount: Decimal::ZERO }));
        assert!(entries.add(sqft_key("PO-2", "A", "1"), totals("1", "2")));
        let summary = perform_fob_compounding(&Aggregation::Standard(entries), &FobConfig::default());
        assert_eq!(summary.combined_po, "PO-1\\PO-2");
        assert_eq!(summary.total_sqft, Decimal::MAX);
        assert_eq!(summary.total_amount, Decimal::ZERO);
    }
}
