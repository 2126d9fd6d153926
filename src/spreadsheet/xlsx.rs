use crate::error::RustyInvoiceError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use glob::Pattern;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::collections::HashMap;
use std::io::BufRead;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use zip::ZipArchive;

const TAG_RELATIONSHIP: &[u8] = b"Relationship";
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts");
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");
const TAG_FORMAT_INDEX: QName = QName(b"xf");
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");
const TAG_TEXT: QName = QName(b"t");
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_WORKBOOK_VIEW: QName = QName(b"workbookView");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");

/// Magic number of OLE compound files, the container of encrypted workbooks.
const CFB_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// An Office Open XML workbook (.xlsx, .xlsm) opened for reading cached cell values.
pub struct XlsxSpreadsheet {
    /// File name of the workbook
    name: String,
    zip: ZipArchive<UnifiedReader>,
    /// Cell types indexed by style id
    number_formats: Vec<CellType>,
    /// Worksheets as (name, zip path) in workbook order
    sheets: Vec<(String, String)>,
    /// Position of the sheet shown when the workbook was saved
    active_tab: usize,
    shared_strings: Vec<String>,
}

impl XlsxSpreadsheet {
    /// Opens a workbook from a local path or `file://` url.
    pub fn open(file_name: &str) -> Result<XlsxSpreadsheet, RustyInvoiceError> {
        let reader = UnifiedReader::new(file_name)?;
        Self::from_reader(file_name, reader)
    }

    /// Opens a workbook held in memory; `name` is only used for reporting.
    pub fn from_bytes(name: &str, bytes: Vec<u8>) -> Result<XlsxSpreadsheet, RustyInvoiceError> {
        Self::from_reader(name, UnifiedReader::from_bytes(bytes))
    }

    fn from_reader(file_name: &str, mut reader: UnifiedReader) -> Result<XlsxSpreadsheet, RustyInvoiceError> {
        if is_compound_file(&mut reader)? {
            if contains_encrypted_package(&mut reader)? {
                Err(SpreadsheetError::SpreadsheetPasswordProtectedError(file_name.to_owned()))?
            }
            Err(SpreadsheetError::UnsupportedFormatError(file_name.to_owned()))?
        }

        let mut zip = ZipArchive::new(reader)?;
        let (sheets, is_1904, active_tab) = load_workbook(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()))?
        }
        let number_formats = load_number_formats(&mut zip, is_1904)?;
        let shared_strings = load_shared_strings(&mut zip)?;
        tracing::debug!(
            workbook = file_name,
            sheets = sheets.len(),
            shared_strings = shared_strings.len(),
            is_1904,
            "opened workbook"
        );
        Ok(XlsxSpreadsheet {
            name: file_name.to_owned(),
            zip,
            number_formats,
            sheets,
            active_tab,
            shared_strings,
        })
    }

    /// Picks the sheet matching `pattern`, or the active sheet when no pattern is given.
    fn select_sheet(&self, pattern: Option<&str>) -> Result<(String, String), RustyInvoiceError> {
        let selected = match pattern {
            Some(pattern) => {
                let matcher = Pattern::new(pattern)?;
                self.sheets
                    .iter()
                    .find(|(name, _)| matcher.matches(name))
                    .ok_or_else(|| SpreadsheetError::SheetNotFound(pattern.to_owned()))?
            }
            None => self
                .sheets
                .get(self.active_tab)
                .or_else(|| self.sheets.first())
                .ok_or_else(|| SpreadsheetError::SpreadsheetEmptyError(self.name.to_owned()))?,
        };
        Ok(selected.to_owned())
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// Reads every populated cell of one worksheet. Formula cells contribute
    /// their cached value, shared strings are resolved in place.
    fn read_sheet(&mut self, pattern: Option<&str>) -> Result<Sheet, RustyInvoiceError> {
        let (sheet_name, zip_path) = self.select_sheet(pattern)?;
        let mut sheet = Sheet::new(&self.name, &sheet_name);
        let mut reader = self
            .zip
            .xml_reader(&zip_path)?
            .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;

        let mut row = 0usize;
        let mut col = 0usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_ROW => {
                row = event.get_attribute_value("r")?
                    .and_then(|number| number.parse::<usize>().ok())
                    .unwrap_or(row + 1);
                col = 0;
            }
            Event::Start(event) if event.name() == TAG_CELL => {
                (row, col) = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row, col + 1));
                kind = event.get_attribute_value("t")?.map(|t| {
                    match t.as_ref() {
                        "inlineStr" | "str" => CellType::Text,
                        "s" => CellType::SharedString,
                        "d" => CellType::IsoDateTime,
                        "b" => CellType::Boolean,
                        "e" => CellType::Error,
                        _ => CellType::Number,
                    }
                }).unwrap_or(CellType::Number);
                if kind == CellType::Number {
                    if let Some(style) = event.get_attribute_value("s")? {
                        if !style.is_empty() {
                            let index = style.parse::<usize>()?;
                            kind = self.number_formats.get(index).copied().unwrap_or(CellType::Number);
                        }
                    }
                }
                value.clear();
            }
            Event::Start(event) if event.name() == TAG_INLINE_STRING => {
                value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if event.name() == TAG_VALUE => {
                value = read_string_value(&mut reader, TAG_VALUE, true)?;
            }
            Event::End(event) if !value.is_empty() && event.name() == TAG_CELL => {
                if kind == CellType::SharedString {
                    let shared = value.trim().parse::<usize>().ok()
                        .and_then(|index| self.shared_strings.get(index));
                    match shared {
                        Some(text) => value = text.to_owned(),
                        None => Err(SpreadsheetError::CellValueError(
                            self.name.to_owned(),
                            sheet_name.to_owned(),
                            index_to_reference(row, col),
                            value.to_owned(),
                        ))?,
                    }
                }
                sheet.push(Cell::new(row, col, kind, &value));
                value.clear();
            }
        });
        tracing::debug!(
            sheet = %sheet.name,
            cells = sheet.cells.len(),
            max_row = sheet.max_row,
            max_col = sheet.max_col,
            "read worksheet"
        );
        Ok(sheet)
    }
}

/// Reads the sheet list, the date system and the active tab from `xl/workbook.xml`.
fn load_workbook<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
) -> Result<(Vec<(String, String)>, bool, usize), RustyInvoiceError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip
        .xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_owned()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    let mut active_tab = 0usize;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<String>;
            let mut id = None::<String>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.unescape_value()?.to_string());
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.unescape_value()?.to_string());
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(&id) {
                    sheets.push((name, path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value.eq("1") || value.eq("true"))
                .unwrap_or(false);
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_VIEW => {
            active_tab = event.get_attribute_value("activeTab")?
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(0);
        }
    });
    Ok((sheets, is_1904, active_tab))
}

/// Maps relationship ids to worksheet paths inside the archive.
fn load_relationships<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    path: &str,
) -> Result<HashMap<String, String>, RustyInvoiceError> {
    let mut reader = zip
        .xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_owned()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(&target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Resolves the cell type of every style id from `xl/styles.xml`.
fn load_number_formats<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    is_1904: bool,
) -> Result<Vec<CellType>, RustyInvoiceError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                custom_formats.insert(id.to_string(), CellType::parse_custom_number_format(&format, is_1904));
            }
        }
        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            let id = event.get_attribute_value("numFmtId")?.unwrap_or_default();
            format_indexes.push(id.to_string());
        }
    });

    let number_formats = format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect();
    Ok(number_formats)
}

/// Loads the whole shared string table, phonetic runs excluded.
fn load_shared_strings<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Vec<String>, RustyInvoiceError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Collects the text up to `end_tag`, skipping phonetic annotations.
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, RustyInvoiceError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = is_text_content,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

/// Normalizes a relationship target to a path inside the archive.
fn to_zip_path(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix('/') {
        stripped.to_owned()
    } else if path.starts_with("xl/") {
        path.to_owned()
    } else {
        format!("xl/{path}")
    }
}

fn is_compound_file<R: Read + Seek>(reader: &mut R) -> Result<bool, RustyInvoiceError> {
    let mut signature = Vec::with_capacity(CFB_SIGNATURE.len());
    reader.by_ref().take(CFB_SIGNATURE.len() as u64).read_to_end(&mut signature)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(signature == CFB_SIGNATURE)
}

/// Looks for the UTF-16 `EncryptedPackage` stream name in a compound file.
fn contains_encrypted_package<R: Read + Seek>(reader: &mut R) -> Result<bool, RustyInvoiceError> {
    let needle: Vec<u8> = "EncryptedPackage"
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect();
    let mut content = Vec::new();
    reader.read_to_end(&mut content)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(content.windows(needle.len()).any(|window| window == needle.as_slice()))
}
