use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::Value;
use std::collections::HashMap;

/// A worksheet read into memory as a sparse grid of populated cells.
#[derive(Clone, Debug, Default)]
pub struct Sheet {
    /// Source file name
    pub file_name: String,
    /// Sheet name
    pub name: String,
    /// All populated cells, in reading order
    pub cells: Vec<Cell>,
    /// (row, col) to position in `cells`
    index: HashMap<(usize, usize), usize>,
    /// Last populated row (1-based), 0 when empty
    pub max_row: usize,
    /// Last populated column (1-based), 0 when empty
    pub max_col: usize,
}

impl Sheet {
    pub fn new(file_name: &str, name: &str) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            ..Self::default()
        }
    }

    /// Builds a sheet from in-memory rows, starting at A1.
    pub fn from_rows(name: &str, rows: Vec<Vec<Value>>) -> Self {
        let mut sheet = Sheet::new("", name);
        for (row, values) in rows.into_iter().enumerate() {
            for (col, value) in values.into_iter().enumerate() {
                let kind = match value {
                    Value::Empty => continue,
                    Value::Boolean(_) => CellType::Boolean,
                    Value::Number(_) => CellType::Number,
                    Value::DateTime(_) => CellType::IsoDateTime,
                    Value::Text(_) => CellType::Text,
                };
                let text = match &value {
                    Value::Boolean(flag) => if *flag { "1".to_owned() } else { "0".to_owned() },
                    Value::DateTime(datetime) => datetime.format("%Y-%m-%dT%H:%M:%S").to_string(),
                    other => other.to_string(),
                };
                sheet.push(Cell::new(row + 1, col + 1, kind, &text));
            }
        }
        sheet
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a cell, a later cell at the same position replaces the earlier one.
    pub(crate) fn push(&mut self, cell: Cell) {
        self.max_row = self.max_row.max(cell.row);
        self.max_col = self.max_col.max(cell.col);
        let key = (cell.row, cell.col);
        match self.index.get(&key) {
            Some(&position) => self.cells[position] = cell,
            None => {
                self.index.insert(key, self.cells.len());
                self.cells.push(cell);
            }
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.index.get(&(row, col)).map(|&position| &self.cells[position])
    }

    /// Typed value at a 1-based position, `Value::Empty` when unpopulated.
    pub fn value(&self, row: usize, col: usize) -> Value {
        self.get(row, col).map(Cell::to_value).unwrap_or_default()
    }

    /// Checks whether every cell of `row` within `cols` is empty.
    pub fn is_blank_row(&self, row: usize, cols: impl IntoIterator<Item = usize>) -> bool {
        cols.into_iter().all(|col| self.value(row, col).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn grid_lookup() {
        let sheet = Sheet::from_rows(
            "Packing",
            vec![
                vec![Value::from("PO"), Value::Empty, Value::from("Item")],
                vec![],
                vec![Value::Number(Decimal::new(125, 1))],
            ],
        );
        assert_eq!(sheet.max_row, 3);
        assert_eq!(sheet.max_col, 3);
        assert_eq!(sheet.value(1, 3), Value::from("Item"));
        assert_eq!(sheet.value(3, 1), Value::Number(Decimal::new(125, 1)));
        assert!(sheet.value(1, 2).is_empty());
        assert!(sheet.is_blank_row(2, 1..=3));
        assert!(!sheet.is_blank_row(1, 1..=3));
    }

    #[test]
    fn later_cell_replaces_earlier() {
        let mut sheet = Sheet::new("a.xlsx", "Sheet1");
        sheet.push(Cell::new(1, 1, CellType::Text, "old"));
        sheet.push(Cell::new(1, 1, CellType::Text, "new"));
        assert_eq!(sheet.cells.len(), 1);
        assert_eq!(sheet.value(1, 1), Value::from("new"));
    }
}
