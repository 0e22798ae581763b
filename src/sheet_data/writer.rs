//! Row/cell encoder producing `<row>` elements for a `<sheetData>` fragment

use super::escape::{escape_into, needs_space_preserve};
use crate::error::{ExcelError, Result};
use crate::types::{cell_reference, push_column_letters, CellRecord, CellValue, RowRecord};
use std::io::Write;

/// Bookkeeping of the rows written so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    rows: u32,
    lowest_index: Option<u32>,
    last_row_cells: usize,
}

impl FlushStats {
    fn record(&mut self, row_index: u32, row: &RowRecord) {
        if self.rows == 0 {
            self.lowest_index = Some(row_index);
        }
        self.rows += 1;
        self.last_row_cells = row.last_cell_num();
    }

    /// Number of rows written
    pub fn number_of_flushed_rows(&self) -> u32 {
        self.rows
    }

    /// Index of the first row written, `None` before any row
    pub fn lowest_index_of_flushed_rows(&self) -> Option<u32> {
        self.lowest_index
    }

    /// Number of cell slots in the most recent row
    pub fn number_of_cells_of_last_flushed_row(&self) -> usize {
        self.last_row_cells
    }
}

/// Encodes rows into SpreadsheetML `<row>`/`<c>` markup.
///
/// Writes only the content of `<sheetData>`; the element itself belongs to
/// the template.
#[derive(Debug, Default)]
pub struct SheetDataWriter {
    stats: FlushStats,
    // Reused across rows to build each row before it reaches the sink
    buffer: Vec<u8>,
}

impl SheetDataWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &FlushStats {
        &self.stats
    }

    /// Roll the bookkeeping back to an earlier snapshot
    pub(crate) fn reset_stats(&mut self, stats: FlushStats) {
        self.stats = stats;
    }

    /// Write one row.
    ///
    /// `row_index` is 0-based. Cell references are derived from the position
    /// of each slot in the row, so gaps must be present as `None` slots.
    ///
    /// # Examples
    ///
    /// ```
    /// use excelsplice::sheet_data::SheetDataWriter;
    /// use excelsplice::types::RowRecord;
    ///
    /// let mut writer = SheetDataWriter::new();
    /// let mut out = Vec::new();
    /// writer.write_row(0, &RowRecord::from_values(["a<b"]), &mut out)?;
    /// assert_eq!(
    ///     String::from_utf8(out).unwrap(),
    ///     "<row r=\"1\"><c r=\"A1\" t=\"inlineStr\"><is><t>a&lt;b</t></is></c></row>\n"
    /// );
    /// # Ok::<(), excelsplice::ExcelError>(())
    /// ```
    pub fn write_row<W: Write + ?Sized>(
        &mut self,
        row_index: u32,
        row: &RowRecord,
        out: &mut W,
    ) -> Result<()> {
        let mut buf = std::mem::take(&mut self.buffer);
        buf.clear();

        let encoded = encode_row(row_index, row, &mut buf);
        let written = match encoded {
            Ok(()) => out.write_all(&buf).map_err(ExcelError::from),
            Err(e) => Err(e),
        };
        self.buffer = buf;
        written?;

        self.stats.record(row_index, row);
        Ok(())
    }
}

fn encode_row(row_index: u32, row: &RowRecord, buf: &mut Vec<u8>) -> Result<()> {
    let mut num = itoa::Buffer::new();
    let row_number = num.format(row_index as u64 + 1).to_string();

    buf.extend_from_slice(b"<row r=\"");
    buf.extend_from_slice(row_number.as_bytes());
    buf.push(b'"');
    if let Some(height) = row.height() {
        if !height.is_finite() {
            return Err(ExcelError::InvalidRowHeight {
                row: row_index,
                height,
            });
        }
        buf.extend_from_slice(b" customHeight=\"true\" ht=\"");
        buf.extend_from_slice(height.to_string().as_bytes());
        buf.push(b'"');
    }
    if row.zero_height() {
        buf.extend_from_slice(b" hidden=\"true\"");
    }
    if let Some(style) = row.style() {
        buf.extend_from_slice(b" s=\"");
        buf.extend_from_slice(num.format(style).as_bytes());
        buf.extend_from_slice(b"\" customFormat=\"1\"");
    }
    if row.outline_level() != 0 {
        buf.extend_from_slice(b" outlineLevel=\"");
        buf.extend_from_slice(num.format(row.outline_level()).as_bytes());
        buf.push(b'"');
    }
    buf.push(b'>');

    for (column, slot) in row.cells().enumerate() {
        if let Some(cell) = slot {
            encode_cell(row_index, column as u32, row_number.as_bytes(), cell, buf)?;
        }
    }

    buf.extend_from_slice(b"</row>\n");
    Ok(())
}

fn encode_cell(
    row_index: u32,
    column: u32,
    row_number: &[u8],
    cell: &CellRecord,
    buf: &mut Vec<u8>,
) -> Result<()> {
    buf.extend_from_slice(b"<c r=\"");
    push_column_letters(buf, column);
    buf.extend_from_slice(row_number);
    buf.push(b'"');
    if cell.style != 0 {
        let mut num = itoa::Buffer::new();
        buf.extend_from_slice(b" s=\"");
        buf.extend_from_slice(num.format(cell.style).as_bytes());
        buf.push(b'"');
    }

    match &cell.value {
        CellValue::Blank => {
            buf.push(b'>');
        }
        CellValue::Text(text) => {
            buf.extend_from_slice(b" t=\"inlineStr\"><is><t");
            if needs_space_preserve(text) {
                buf.extend_from_slice(b" xml:space=\"preserve\"");
            }
            buf.push(b'>');
            escape_into(text, buf)?;
            buf.extend_from_slice(b"</t></is>");
        }
        CellValue::Number(n) => {
            if !n.is_finite() {
                return Err(ExcelError::InvalidCellValue {
                    cell: cell_reference(row_index, column),
                    reason: format!(
                        "{} is not a valid numeric cell value; use a formula without cached result",
                        n
                    ),
                });
            }
            buf.extend_from_slice(b"><v>");
            buf.extend_from_slice(n.to_string().as_bytes());
            buf.extend_from_slice(b"</v>");
        }
        CellValue::Boolean(b) => {
            buf.extend_from_slice(b" t=\"b\"><v>");
            buf.push(if *b { b'1' } else { b'0' });
            buf.extend_from_slice(b"</v>");
        }
        CellValue::Error(code) => {
            buf.extend_from_slice(b" t=\"e\"><v>");
            buf.extend_from_slice(code.as_str().as_bytes());
            buf.extend_from_slice(b"</v>");
        }
        CellValue::Formula { formula, cached } => {
            buf.extend_from_slice(b"><f>");
            escape_into(formula, buf)?;
            buf.extend_from_slice(b"</f>");
            if let Some(value) = cached.filter(|v| v.is_finite()) {
                buf.extend_from_slice(b"<v>");
                buf.extend_from_slice(value.to_string().as_bytes());
                buf.extend_from_slice(b"</v>");
            }
        }
    }

    buf.extend_from_slice(b"</c>");
    Ok(())
}
