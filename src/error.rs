//! Error types for the excelsplice library

use thiserror::Error;

/// Result type alias for excelsplice operations
pub type Result<T> = std::result::Result<T, ExcelError>;

/// Main error type for all workbook operations
#[derive(Error, Debug)]
pub enum ExcelError {
    /// The template archive could not be understood
    #[error("Failed to read template archive: {0}")]
    ReadError(String),

    /// The output archive could not be produced
    #[error("Failed to write Excel file: {0}")]
    WriteError(String),

    /// `write()` was called before a row producer was registered
    #[error("Stream source is not defined. Call set_stream_source() before write()")]
    NoStreamSource,

    /// A cell value that has no valid XML representation
    #[error("Invalid value in cell {cell}: {reason}")]
    InvalidCellValue { cell: String, reason: String },

    /// A row height that has no valid XML representation
    #[error("Invalid height {height} for row {row}")]
    InvalidRowHeight { row: u32, height: f64 },

    /// Sheet name rejected by the workbook
    #[error("Invalid sheet name '{name}': {reason}")]
    InvalidSheetName { name: String, reason: String },

    /// Sheet id or name not registered in the workbook
    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),

    /// A row was created at or below a row that has already been streamed out
    #[error("Attempting to write row {row} in the range [0,{last_flushed}] that is already written to the stream")]
    RowAlreadyFlushed { row: u32, last_flushed: u32 },

    /// Error occurred while writing a row
    #[error("Failed to write row {row} to sheet '{sheet}': {source}")]
    WriteRowError {
        row: u32,
        sheet: String,
        #[source]
        source: Box<ExcelError>,
    },

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for ExcelError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => ExcelError::IoError(e),
            other => ExcelError::WriteError(other.to_string()),
        }
    }
}
