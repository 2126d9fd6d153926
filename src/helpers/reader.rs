use crate::error::RustyInvoiceError;
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum UnifiedReaderError {
    #[error("Remote workbook '{0}' is not supported, download it first")]
    RemoteFileUnsupportedError(String),

    #[error("Invalid file url '{0}'")]
    InvalidFileUrlError(String),
}

/// A reader over either a local file or an in-memory workbook
pub(crate) enum UnifiedReader {
    /// Local file reader
    Local(BufReader<File>),
    /// In-memory buffer
    Memory(Cursor<Vec<u8>>),
}

impl UnifiedReader {
    /// Opens a local path or a `file://` url.
    ///
    /// # Arguments
    /// * `file_name` - Path or url to the workbook
    ///
    /// # Returns
    /// * `Result<UnifiedReader, RustyInvoiceError>` - Reader for the file content
    pub(crate) fn new(file_name: &str) -> Result<UnifiedReader, RustyInvoiceError> {
        let path = Self::local_path(file_name)?;
        let file = File::open(path)?;
        Ok(UnifiedReader::Local(BufReader::new(file)))
    }

    /// Wraps workbook bytes that are already in memory
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> UnifiedReader {
        UnifiedReader::Memory(Cursor::new(bytes))
    }

    /// Checks if a file name represents a remote URL
    pub(crate) fn is_remote_url(file_name: &str) -> bool {
        if let Ok(url) = Url::parse(file_name) {
            // Single letter schemes are Windows drive letters
            url.scheme() != "file" && url.scheme().len() > 1
        } else {
            false
        }
    }

    /// Resolves the file system path for a file name or `file://` url
    fn local_path(file_name: &str) -> Result<PathBuf, RustyInvoiceError> {
        if Self::is_remote_url(file_name) {
            Err(UnifiedReaderError::RemoteFileUnsupportedError(file_name.to_owned()))?
        }
        match Url::parse(file_name) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map_err(|_| UnifiedReaderError::InvalidFileUrlError(file_name.to_owned()).into()),
            _ => Ok(PathBuf::from(file_name)),
        }
    }
}

impl Read for UnifiedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            UnifiedReader::Local(reader) => reader.read(buf),
            UnifiedReader::Memory(reader) => reader.read(buf),
        }
    }
}

impl Seek for UnifiedReader {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        match self {
            UnifiedReader::Local(reader) => reader.seek(pos),
            UnifiedReader::Memory(reader) => reader.seek(pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_remote_url() {
        assert!(!UnifiedReader::is_remote_url("invoice.xlsx"));
        assert!(!UnifiedReader::is_remote_url("/path/to/invoice.xlsx"));
        assert!(!UnifiedReader::is_remote_url("./relative/invoice.xlsx"));
        assert!(!UnifiedReader::is_remote_url("C:\\invoices\\invoice.xlsx"));

        assert!(UnifiedReader::is_remote_url("http://example.com/invoice.xlsx"));
        assert!(UnifiedReader::is_remote_url("https://example.com/invoice.xlsx"));
        assert!(UnifiedReader::is_remote_url("s3://bucket/invoice.xlsx"));

        assert!(!UnifiedReader::is_remote_url("file:///path/to/invoice.xlsx"));
    }

    #[test]
    fn test_open_local_file() {
        let result = UnifiedReader::new("Cargo.toml");
        assert!(result.is_ok(), "Failed to open local file: {:?}", result.err());

        let result = UnifiedReader::new("non_existent_file.xlsx");
        assert!(result.is_err(), "Should fail to open non-existent file");
    }

    #[test]
    fn test_remote_file_is_rejected() {
        let result = UnifiedReader::new("https://example.com/invoice.xlsx");
        assert!(matches!(
            result,
            Err(RustyInvoiceError::UnifiedReaderError(UnifiedReaderError::RemoteFileUnsupportedError(_)))
        ));
    }

    #[test]
    fn test_in_memory_reader() {
        let mut reader = UnifiedReader::from_bytes(b"PK".to_vec());
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).unwrap();
        assert_eq!(buffer, b"PK");
    }
}
