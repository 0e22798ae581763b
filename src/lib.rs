//! # excelsplice
//!
//! Streaming XLSX writer that splices rows into a template workbook.
//!
//! ## Features
//!
//! - **Single pass**: rows are pulled from a producer while the archive is written,
//!   so memory stays flat no matter how many rows a sheet has
//! - **Template based**: every part other than the sheet data is copied from a
//!   template archive, either the built-in minimal package or your own file
//! - **Inline strings**: no shared string table to keep in memory
//! - **No size ceiling**: streamed sheet parts are written as ZIP64 entries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use excelsplice::{StreamWorkbook, CellValue};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut workbook = StreamWorkbook::new();
//! workbook.create_sheet("Sales")?;
//!
//! workbook.set_stream_source(|sheet| {
//!     Box::new((0..100_000u32).map(move |i| {
//!         let row = sheet.create_row(i)?;
//!         row.push(format!("Item {}", i))
//!             .push(i as f64 * 1.5)
//!             .push(CellValue::formula(format!("B{}*2", i + 1)));
//!         sheet.flush_rows()
//!     }))
//! });
//!
//! workbook.save("sales.xlsx")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Lower-level pieces
//!
//! - [`sheet_data`]: encodes rows into `<row>` markup
//! - [`inject`]: finds the `<sheetData>` placeholder and splices chunks into it

pub mod config;
pub mod error;
pub mod inject;
pub mod sheet_data;
pub mod types;
pub mod workbook;

pub use config::WriteOptions;
pub use error::{ExcelError, Result};
pub use inject::{PatchSummary, Placeholder, RowChunks, SheetContent};
pub use sheet_data::{FlushStats, SheetDataWriter};
pub use types::{CellErrorCode, CellRecord, CellValue, RowRecord};
pub use workbook::{
    DefaultTemplate, FileTemplate, SheetId, StreamSheet, StreamWorkbook, TemplateSheet,
    TemplateSource,
};
