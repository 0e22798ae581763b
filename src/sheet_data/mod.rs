//! Sheet data encoding
//!
//! Turns [`RowRecord`](crate::types::RowRecord)s into the `<row>` markup that
//! is streamed into the `<sheetData>` element of a worksheet part.

pub mod escape;
pub mod writer;

pub use escape::{escape, escape_into, needs_space_preserve};
pub use writer::{FlushStats, SheetDataWriter};
