use crate::config::FieldSynonyms;
use crate::extraction::normalize_text;
use crate::spreadsheet::range::Range;
use crate::spreadsheet::reference::index_to_col;
use crate::spreadsheet::Sheet;
use serde::ser::SerializeMap;
use serde::Serialize;
use serde::Serializer;

/// Canonical field to 1-based column, in left-to-right column order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    columns: Vec<(String, usize)>,
}

impl ColumnMapping {
    pub fn get(&self, field: &str) -> Option<usize> {
        self.columns
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, col)| *col)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.columns.iter().map(|(name, col)| (name.as_str(), *col))
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Required fields no column was mapped to.
    pub fn missing(&self, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|field| !self.contains(field))
            .cloned()
            .collect()
    }
}

impl Serialize for ColumnMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (field, col) in &self.columns {
            map.serialize_entry(field, &index_to_col(*col))?;
        }
        map.end()
    }
}

/// Maps canonical fields to the columns of `header_row`.
///
/// Each header cell is lower-cased and compared with the synonyms of every
/// field not mapped yet, in configured order. The leftmost matching column
/// wins, a field is never remapped.
pub fn map_columns_to_headers(
    sheet: &Sheet,
    header_row: usize,
    window: &Range,
    fields: &[FieldSynonyms],
) -> ColumnMapping {
    let synonyms: Vec<(&str, Vec<String>)> = fields
        .iter()
        .map(|field| {
            let normalized = field
                .synonyms
                .iter()
                .map(|synonym| synonym.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
                .collect();
            (field.name.as_str(), normalized)
        })
        .collect();

    let mut mapping = ColumnMapping::default();
    for col in window.cols(sheet.max_col) {
        let text = normalize_text(&sheet.value(header_row, col)).to_lowercase();
        if text.is_empty() {
            continue;
        }
        let matched = synonyms
            .iter()
            .filter(|(name, _)| !mapping.contains(name))
            .find(|(_, variants)| variants.contains(&text));
        if let Some((name, _)) = matched {
            tracing::debug!(column = %index_to_col(col), header = %text, field = name, "mapped column");
            mapping.columns.push(((*name).to_owned(), col));
        }
    }

    if mapping.is_empty() {
        tracing::warn!(row = header_row, "no known header in row");
    } else {
        tracing::info!(row = header_row, mapped = mapping.len(), "mapped header columns");
    }
    mapping
}
