use crate::spreadsheet::reference::index_to_reference;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::TimeDelta;
use chrono::Timelike;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;

/// How the stored text of a worksheet cell has to be interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum CellType {
    #[default]
    Empty,
    /// Boolean values stored as 0/1
    Boolean,
    /// Numeric values
    Number,
    /// Serial date/time numbers from the 1900 epoch
    Date1900,
    /// Serial date/time numbers from the 1904 epoch
    Date1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// Inline or formula string values
    Text,
    /// Index into the shared string table
    SharedString,
    /// Error values such as `#DIV/0!`
    Error,
}

impl CellType {
    /// Picks the date type matching the workbook's date system.
    fn date(is_1904: bool) -> Self {
        if is_1904 {
            Self::Date1904
        } else {
            Self::Date1900
        }
    }

    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "14" | "15" | "16" | "17" | "18" | "19" | "20" | "21" | "22" | "45" | "46" | "47" => Some(Self::date(is_1904)),
            _ => None,
        }
    }

    /// Parses custom number format strings, looking for date/time tokens
    /// outside of literals, escapes and bracketed sections.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,
                '"' => is_literal = !is_literal,
                _ if is_literal => (),
                '[' => is_bracket = true,
                ']' => is_bracket = false,
                _ if is_bracket => (),
                'Y' | 'y' | 'D' | 'd' | 'H' | 'h' | 'S' | 's' => return Self::date(is_1904),
                _ => (),
            }
        }
        Self::Number
    }
}

/// A single populated worksheet cell at a 1-based position.
#[derive(Clone, Debug)]
pub struct Cell {
    /// Row number (1-based)
    pub row: usize,
    /// Column number (1-based)
    pub col: usize,
    /// Cell data type
    pub kind: CellType,
    /// Cell value as stored in the workbook
    pub value: String,
}

impl Cell {
    pub fn new(row: usize, col: usize, kind: CellType, value: &str) -> Self {
        Cell {
            row,
            col,
            kind,
            value: value.to_owned(),
        }
    }

    /// Returns the Excel-style cell reference (e.g., "A1", "B2").
    pub fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Converts the stored text into a typed value. Strings are trimmed and
    /// numbers keep their exact decimal digits.
    pub fn to_value(&self) -> Value {
        match self.kind {
            CellType::Empty => Value::Empty,
            CellType::Boolean => Value::Boolean(self.value == "1" || self.value.eq_ignore_ascii_case("true")),
            CellType::Number => number_or_text(&self.value),
            CellType::Date1900 => to_datetime(&self.value, false)
                .map(Value::DateTime)
                .unwrap_or_else(|| number_or_text(&self.value)),
            CellType::Date1904 => to_datetime(&self.value, true)
                .map(Value::DateTime)
                .unwrap_or_else(|| number_or_text(&self.value)),
            CellType::IsoDateTime => parse_iso_datetime(&self.value)
                .map(Value::DateTime)
                .unwrap_or_else(|| Value::from_text(&self.value)),
            CellType::Text | CellType::SharedString | CellType::Error => Value::from_text(&self.value),
        }
    }
}

/// A typed cell value as it flows through the extraction pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Empty,
    Number(Decimal),
    Text(String),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

impl Value {
    /// Trimmed text value, blank strings become `Empty`.
    pub fn from_text(text: &str) -> Value {
        let text = text.trim();
        if text.is_empty() {
            Value::Empty
        } else {
            Value::Text(text.to_owned())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Numeric view of the value: numbers as-is, numeric text parsed.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Number(number) => Some(*number),
            Value::Text(text) => parse_decimal(text),
            _ => None,
        }
    }

    /// `true` for empty cells and numeric zero, the "no value here" marker in total columns.
    pub fn is_blank_or_zero(&self) -> bool {
        match self {
            Value::Empty => true,
            other => other.as_decimal().map(|number| number.is_zero()).unwrap_or(false),
        }
    }

    /// Text used for matching and keying, `None` for empty cells.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Value::Empty => None,
            other => Some(other.to_string()),
        }
    }
}

impl From<Decimal> for Value {
    fn from(number: Decimal) -> Self {
        Value::Number(number)
    }
}

impl From<Option<Decimal>> for Value {
    fn from(number: Option<Decimal>) -> Self {
        number.map(Value::Number).unwrap_or_default()
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::from_text(text)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Number(number) => write!(f, "{}", number.normalize()),
            Value::Text(text) => write!(f, "{}", text),
            Value::Boolean(value) => write!(f, "{}", value),
            Value::DateTime(datetime) if datetime.num_seconds_from_midnight() == 0 => {
                write!(f, "{}", datetime.format("%Y-%m-%d"))
            }
            Value::DateTime(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Parses plain or scientific decimal text without going through `f64`.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(text)
        .ok()
        .or_else(|| Decimal::from_scientific(text).ok())
}

fn number_or_text(text: &str) -> Value {
    match parse_decimal(text) {
        Some(number) => Value::Number(number),
        None => Value::from_text(text),
    }
}

/// Converts an Excel serial date/time number to a date time, `None` when it
/// falls outside the representable range.
/// Handles the Lotus 1-2-3 leap year bug of the 1900 epoch.
fn to_datetime(value: &str, is_1904: bool) -> Option<NaiveDateTime> {
    let serial = value.trim().parse::<f64>().ok()?;
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    let milliseconds = (serial.fract() * 86_400_000f64).round() as i64;
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let delta = TimeDelta::try_days(days.checked_add(offset)?)?
        .checked_add(&TimeDelta::try_milliseconds(milliseconds)?)?;
    epoch.checked_add_signed(delta)
}

fn parse_iso_datetime(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
