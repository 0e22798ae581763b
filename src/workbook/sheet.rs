//! Row store of a streaming sheet

use crate::error::{ExcelError, Result};
use crate::sheet_data::{FlushStats, SheetDataWriter};
use crate::types::RowRecord;
use std::collections::BTreeMap;

/// A sheet whose rows are written out as they are flushed.
///
/// Rows are created in a small pending window and rendered to `<row>` markup
/// by [`flush_rows`](StreamSheet::flush_rows). Once a row has been flushed,
/// no row at or above it can be created again.
///
/// # Examples
///
/// ```
/// use excelsplice::StreamSheet;
///
/// let mut sheet = StreamSheet::new("Data");
/// sheet.create_row(0)?.push("id").push("name");
/// sheet.create_row(1)?.push(1.0).push("Alice");
///
/// let chunk = sheet.flush_rows()?;
/// assert!(chunk.starts_with("<row r=\"1\">"));
/// assert_eq!(sheet.pending_rows(), 0);
/// assert!(sheet.create_row(1).is_err());
/// # Ok::<(), excelsplice::ExcelError>(())
/// ```
#[derive(Debug)]
pub struct StreamSheet {
    name: String,
    rows: BTreeMap<u32, RowRecord>,
    writer: SheetDataWriter,
    last_flushed: Option<u32>,
}

impl StreamSheet {
    pub fn new(name: impl Into<String>) -> Self {
        StreamSheet {
            name: name.into(),
            rows: BTreeMap::new(),
            writer: SheetDataWriter::new(),
            last_flushed: None,
        }
    }

    pub fn sheet_name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_sheet_name(&mut self, name: String) {
        self.name = name;
    }

    /// Create a new, empty row at `index` (0-based) and return it.
    ///
    /// A pending row with the same index is replaced.
    pub fn create_row(&mut self, index: u32) -> Result<&mut RowRecord> {
        if let Some(last) = self.last_flushed {
            if index <= last {
                return Err(ExcelError::RowAlreadyFlushed {
                    row: index,
                    last_flushed: last,
                });
            }
        }

        let row = self.rows.entry(index).or_default();
        *row = RowRecord::new();
        Ok(row)
    }

    /// Pending row at `index`
    pub fn row(&self, index: u32) -> Option<&RowRecord> {
        self.rows.get(&index)
    }

    pub fn row_mut(&mut self, index: u32) -> Option<&mut RowRecord> {
        self.rows.get_mut(&index)
    }

    /// Drop a pending row without writing it
    pub fn remove_row(&mut self, index: u32) -> Option<RowRecord> {
        self.rows.remove(&index)
    }

    /// Number of rows created but not flushed yet
    pub fn pending_rows(&self) -> usize {
        self.rows.len()
    }

    /// Highest row index seen so far, pending or flushed
    pub fn last_row_num(&self) -> Option<u32> {
        let pending = self.rows.keys().next_back().copied();
        pending.max(self.last_flushed)
    }

    /// Index of the most recently flushed row
    pub fn last_flushed_row(&self) -> Option<u32> {
        self.last_flushed
    }

    pub fn stats(&self) -> &FlushStats {
        self.writer.stats()
    }

    /// Render every pending row, in ascending index order, into one chunk of
    /// `<row>` markup and clear the pending window.
    ///
    /// Returns an empty string when nothing is pending. On error the window,
    /// the flushed-row boundary and the stats are left as they were.
    pub fn flush_rows(&mut self) -> Result<String> {
        let checkpoint = *self.writer.stats();
        let chunk = match self.render_pending() {
            Ok(chunk) => chunk,
            Err(e) => {
                self.writer.reset_stats(checkpoint);
                return Err(e);
            }
        };

        if let Some((&last, _)) = self.rows.last_key_value() {
            self.last_flushed = Some(last);
        }
        self.rows.clear();
        Ok(chunk)
    }

    fn render_pending(&mut self) -> Result<String> {
        let mut out = Vec::new();
        for (index, row) in &self.rows {
            self.writer
                .write_row(*index, row, &mut out)
                .map_err(|source| ExcelError::WriteRowError {
                    row: *index,
                    sheet: self.name.clone(),
                    source: Box::new(source),
                })?;
        }
        String::from_utf8(out).map_err(|e| ExcelError::WriteError(e.to_string()))
    }
}
