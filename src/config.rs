//! Run configuration, deserialized from TOML. Every setting has a default, so
//! an empty file (or no file at all) reproduces the stock packing-list layout.

use crate::spreadsheet::range::Range;
use regex::Regex;
use regex::RegexBuilder;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::Serialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Canonical field names used by the processing stages.
pub mod field {
    pub const PO: &str = "po";
    pub const ITEM: &str = "item";
    pub const PCS: &str = "pcs";
    pub const NET: &str = "net";
    pub const GROSS: &str = "gross";
    pub const UNIT: &str = "unit";
    pub const SQFT: &str = "sqft";
    pub const CBM: &str = "cbm";
    pub const AMOUNT: &str = "amount";
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read configuration '{0}': {1}")]
    IoError(String, #[source] std::io::Error),

    #[error("Invalid configuration: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid header pattern '{0}': {1}")]
    PatternError(String, #[source] regex::Error),

    #[error("Invalid header search window '{0}'")]
    WindowError(String),

    #[error("Invalid setting '{0}': {1}")]
    InvalidSetting(&'static str, String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Glob pattern of the worksheet to process, the active sheet when absent
    pub sheet: Option<String>,
    pub header: HeaderConfig,
    /// Header synonyms per canonical field, matched in this order
    pub fields: Vec<FieldSynonyms>,
    /// Fields the first header row must map
    pub required_fields: Vec<String>,
    pub extraction: ExtractionConfig,
    pub cbm: CbmConfig,
    pub distribution: DistributionConfig,
    pub aggregation: AggregationConfig,
    pub fob: FobConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeaderConfig {
    /// Case-insensitive regex matched against normalized cell text
    pub pattern: String,
    /// Excel-style window scanned for header rows, e.g. "A:Y" or "A1:Y200"
    pub search_window: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FieldSynonyms {
    pub name: String,
    pub synonyms: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Field whose column is checked for stop sentinels
    pub stop_field: Option<String>,
    /// Normalized texts that end a table when a stop-field cell starts with one of them
    pub stop_sentinels: Vec<String>,
    /// Also end a table at the first row whose stop-field cell is empty
    pub stop_on_empty: bool,
    pub max_rows_per_table: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CbmConfig {
    /// Field holding (or receiving) the volume
    pub field: String,
    /// Length, width and height fields, empty to parse `L*W*H` text from `field` instead
    pub dimensions: Vec<String>,
    /// Multiplier field when dimensions are given per unit, e.g. "pcs"
    pub per_unit_field: Option<String>,
    /// Divisor converting dimension units into cubic meters
    pub unit_divisor: Decimal,
    pub precision: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DistributionConfig {
    pub columns: Vec<String>,
    pub basis: String,
    pub precision: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Decimal places of the unit price inside aggregation keys
    pub price_precision: u32,
    /// Workbook file name prefixes selecting the (PO, Item) aggregation
    pub custom_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FobConfig {
    pub chunk_size: usize,
    pub intra_chunk_separator: String,
    pub inter_chunk_separator: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sheet: None,
            header: HeaderConfig::default(),
            fields: default_fields(),
            required_fields: ["po", "item", "net", "gross", "pcs", "sqft"].map(String::from).to_vec(),
            extraction: ExtractionConfig::default(),
            cbm: CbmConfig::default(),
            distribution: DistributionConfig::default(),
            aggregation: AggregationConfig::default(),
            fob: FobConfig::default(),
        }
    }
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            pattern: "批次号|订单号|物料代码|总张数|净重|毛重".to_owned(),
            search_window: "A:Y".to_owned(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            stop_field: Some(field::ITEM.to_owned()),
            stop_sentinels: ["合计", "总计", "total"].map(String::from).to_vec(),
            stop_on_empty: false,
            max_rows_per_table: 1000,
        }
    }
}

impl Default for CbmConfig {
    fn default() -> Self {
        Self {
            field: field::CBM.to_owned(),
            dimensions: Vec::new(),
            per_unit_field: None,
            unit_divisor: Decimal::ONE,
            precision: 4,
        }
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            columns: vec![field::NET.to_owned(), field::GROSS.to_owned()],
            basis: field::PCS.to_owned(),
            precision: 4,
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            price_precision: 4,
            custom_prefixes: Vec::new(),
        }
    }
}

impl Default for FobConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2,
            intra_chunk_separator: "\\".to_owned(),
            inter_chunk_separator: "\n".to_owned(),
        }
    }
}

fn default_fields() -> Vec<FieldSynonyms> {
    let table: &[(&str, &[&str])] = &[
        ("po", &["po", "po no", "purchase order", "订单号"]),
        ("item", &["item", "item no", "料号", "产品编号", "物料代码"]),
        ("pcs", &["pcs", "张数", "数量", "qty", "件数", "总张数"]),
        ("net", &["net", "net wt", "net weight", "净重"]),
        ("gross", &["gross", "gross wt", "gross weight", "毛重"]),
        ("unit", &["unit", "unit price", "单价", "价格", "usd"]),
        ("sqft", &["sqft", "出货数量 (sf)"]),
        ("cbm", &["cbm", "meas", "measurement", "材积", "量码版"]),
        ("desc", &["desc", "description", "品名规格"]),
        ("inv_no", &["inv no", "invoice no", "发票号码"]),
        ("inv_date", &["inv date", "invoice date", "发票日期"]),
        ("batch_no", &["批次号", "batch number"]),
        ("line_no", &["行号", "line number", "line no"]),
        ("direction", &["内向", "direction", "inward"]),
        ("production_date", &["生产日期", "production date"]),
        ("production_order_no", &["生产单号", "production order number"]),
        ("reference_code", &["jlf/ttx编号", "ttx编号", "reference code"]),
        ("level", &["级别", "等级", "level", "grade"]),
        ("pallet_count", &["拖数", "pallet count"]),
        ("manual_no", &["手册号", "manual number"]),
        ("remarks", &["备注", "remarks", "notes"]),
        ("amount", &["金额", "amount"]),
    ];
    table
        .iter()
        .map(|(name, synonyms)| FieldSynonyms {
            name: (*name).to_owned(),
            synonyms: synonyms.iter().map(|synonym| (*synonym).to_owned()).collect(),
        })
        .collect()
}

impl Config {
    /// Reads and validates a TOML configuration file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|error| ConfigError::IoError(path.display().to_string(), error))?;
        Config::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks everything that can be rejected before a workbook is opened.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.header_regex()?;
        self.search_window()?;
        if self.distribution.basis.trim().is_empty() {
            Err(ConfigError::InvalidSetting("distribution.basis", "must not be empty".to_owned()))?
        }
        if self.fob.chunk_size == 0 {
            Err(ConfigError::InvalidSetting("fob.chunk_size", "must be positive".to_owned()))?
        }
        if self.cbm.unit_divisor.is_zero() {
            Err(ConfigError::InvalidSetting("cbm.unit_divisor", "must not be zero".to_owned()))?
        }
        if !self.cbm.dimensions.is_empty() && self.cbm.dimensions.len() != 3 {
            Err(ConfigError::InvalidSetting(
                "cbm.dimensions",
                format!("expected length, width and height, got {} fields", self.cbm.dimensions.len()),
            ))?
        }
        for (name, precision) in [
            ("distribution.precision", self.distribution.precision),
            ("aggregation.price_precision", self.aggregation.price_precision),
            ("cbm.precision", self.cbm.precision),
        ] {
            if precision > 28 {
                Err(ConfigError::InvalidSetting(name, format!("{precision} exceeds 28 decimal places")))?
            }
        }
        Ok(())
    }

    /// Case-insensitive header pattern.
    pub fn header_regex(&self) -> Result<Regex, ConfigError> {
        RegexBuilder::new(&self.header.pattern)
            .case_insensitive(true)
            .build()
            .map_err(|error| ConfigError::PatternError(self.header.pattern.to_owned(), error))
    }

    pub fn search_window(&self) -> Result<Range, ConfigError> {
        Range::try_from(self.header.search_window.as_str())
            .map_err(|_| ConfigError::WindowError(self.header.search_window.to_owned()))
    }

    /// Whether the workbook's file name selects the (PO, Item) aggregation.
    pub fn uses_custom_aggregation(&self, workbook: &str) -> bool {
        let file_name = Path::new(workbook)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| workbook.to_owned());
        self.aggregation
            .custom_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && file_name.starts_with(prefix.as_str()))
    }
}
