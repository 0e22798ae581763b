//! Streaming injection of row data into a template archive
//!
//! The template is copied entry by entry. Worksheet parts are scanned for
//! their `<sheetData>` placeholder, and the rows pulled from a producer are
//! written between a fresh open and close tag while the part is copied.

pub mod patcher;
pub mod scanner;

pub use patcher::{patch_archive, splice_sheet_data, PatchSummary, RowChunks, SheetContent};
pub use scanner::{Placeholder, PlaceholderScanner, Scan};
