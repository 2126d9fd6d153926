//! Column-oriented table records shared by every processing stage.

use crate::spreadsheet::Value;
use serde::ser::SerializeMap;
use serde::ser::SerializeStruct;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;

/// A column could not be stored because its length differs from the row count.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Column '{field}' has {actual} values, expected {expected}")]
pub struct LengthMismatch {
    pub field: String,
    pub expected: usize,
    pub actual: usize,
}

/// One table's extracted rows, stored per field.
///
/// Every column always holds exactly one value per row: rows are appended
/// across all columns at once and replacement columns must match the row count.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordSet {
    /// Worksheet row number of each record
    source_rows: Vec<usize>,
    /// Columns in header order
    columns: Vec<(String, Vec<Value>)>,
}

impl RecordSet {
    /// Creates an empty set with the given fields.
    pub fn with_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source_rows: Vec::new(),
            columns: fields.into_iter().map(|field| (field.into(), Vec::new())).collect(),
        }
    }

    /// Appends one record, asking `value_of` for the value of every field.
    pub fn push_row(&mut self, source_row: usize, mut value_of: impl FnMut(&str) -> Value) {
        self.source_rows.push(source_row);
        for (field, values) in self.columns.iter_mut() {
            values.push(value_of(field));
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.source_rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source_rows.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(field, _)| field.as_str())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.columns.iter().any(|(name, _)| name == field)
    }

    /// Fields of `required` this set does not carry.
    pub fn missing_fields(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|field| !self.contains(field))
            .map(|field| (*field).to_owned())
            .collect()
    }

    pub fn column(&self, field: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, values)| values.as_slice())
    }

    /// Value of `field` in record `index`.
    pub fn value(&self, field: &str, index: usize) -> Option<&Value> {
        self.column(field).and_then(|values| values.get(index))
    }

    /// Worksheet row the record at `index` was read from.
    pub fn source_row(&self, index: usize) -> usize {
        self.source_rows.get(index).copied().unwrap_or_default()
    }

    pub fn source_rows(&self) -> &[usize] {
        &self.source_rows
    }

    /// Stores a column, replacing a previous one with the same name.
    pub fn set_column(&mut self, field: &str, values: Vec<Value>) -> Result<(), LengthMismatch> {
        if values.len() != self.len() {
            return Err(LengthMismatch {
                field: field.to_owned(),
                expected: self.len(),
                actual: values.len(),
            });
        }
        match self.columns.iter_mut().find(|(name, _)| name == field) {
            Some((_, column)) => *column = values,
            None => self.columns.push((field.to_owned(), values)),
        }
        Ok(())
    }
}

impl Serialize for RecordSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Columns<'a>(&'a [(String, Vec<Value>)]);

        impl Serialize for Columns<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for (field, values) in self.0 {
                    map.serialize_entry(field, values)?;
                }
                map.end()
            }
        }

        let mut state = serializer.serialize_struct("RecordSet", 2)?;
        state.serialize_field("source_rows", &self.source_rows)?;
        state.serialize_field("columns", &Columns(&self.columns))?;
        state.end()
    }
}

/// A record left out of a stage's result, or given an empty derived value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RowSkip {
    /// Worksheet row number
    pub row: usize,
    pub field: String,
    pub reason: String,
}

impl RowSkip {
    pub fn new(row: usize, field: &str, reason: impl Into<String>) -> Self {
        Self {
            row,
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}

/// A stage result together with the rows it had to skip.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Staged<T> {
    pub value: T,
    pub skipped: Vec<RowSkip>,
}

impl<T> Staged<T> {
    pub fn new(value: T, skipped: Vec<RowSkip>) -> Self {
        Self { value, skipped }
    }
}
