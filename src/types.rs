//! Row and cell model handed to the sheet data encoder

use std::fmt;

/// Error codes that can be stored in an error cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellErrorCode {
    /// `#NULL!` - intersection of two ranges is empty
    Null,
    /// `#DIV/0!`
    Div0,
    /// `#VALUE!`
    Value,
    /// `#REF!`
    Ref,
    /// `#NAME?`
    Name,
    /// `#NUM!`
    Num,
    /// `#N/A`
    NotAvailable,
    /// `#GETTING_DATA`
    GettingData,
}

impl CellErrorCode {
    /// Symbolic string as it appears in the `<v>` body of an error cell
    pub fn as_str(&self) -> &'static str {
        match self {
            CellErrorCode::Null => "#NULL!",
            CellErrorCode::Div0 => "#DIV/0!",
            CellErrorCode::Value => "#VALUE!",
            CellErrorCode::Ref => "#REF!",
            CellErrorCode::Name => "#NAME?",
            CellErrorCode::Num => "#NUM!",
            CellErrorCode::NotAvailable => "#N/A",
            CellErrorCode::GettingData => "#GETTING_DATA",
        }
    }
}

impl fmt::Display for CellErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value stored in a single cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Cell element with no content
    Blank,
    /// Plain numeric value. Must be finite: a NaN result is modelled as a
    /// `Formula` without cached value instead.
    Number(f64),
    /// Boolean value
    Boolean(bool),
    /// Text, written as an inline string
    Text(String),
    /// Formula text (without leading `=`) and optional cached numeric result
    Formula {
        formula: String,
        cached: Option<f64>,
    },
    /// Error value
    Error(CellErrorCode),
}

impl CellValue {
    /// Create a formula cell without a cached result
    pub fn formula(formula: impl Into<String>) -> Self {
        CellValue::Formula {
            formula: formula.into(),
            cached: None,
        }
    }

    /// Check if cell is blank
    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Blank)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Number(f)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Number(i as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<CellErrorCode> for CellValue {
    fn from(code: CellErrorCode) -> Self {
        CellValue::Error(code)
    }
}

/// A cell as stored in a row: value plus style index
#[derive(Debug, Clone, PartialEq)]
pub struct CellRecord {
    /// The cell value
    pub value: CellValue,
    /// Index into the workbook's cell formats, 0 means no explicit style
    pub style: u32,
}

impl CellRecord {
    /// Create a cell with the default style
    pub fn new(value: impl Into<CellValue>) -> Self {
        CellRecord {
            value: value.into(),
            style: 0,
        }
    }

    /// Create a cell with an explicit style index
    pub fn styled(value: impl Into<CellValue>, style: u32) -> Self {
        CellRecord {
            value: value.into(),
            style,
        }
    }
}

impl From<CellValue> for CellRecord {
    fn from(value: CellValue) -> Self {
        CellRecord { value, style: 0 }
    }
}

macro_rules! unstyled_cell_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for CellRecord {
                fn from(value: $ty) -> Self {
                    CellRecord::new(value)
                }
            }
        )*
    };
}

unstyled_cell_from!(&str, String, f64, i64, bool, CellErrorCode);

/// One row of a sheet, ready to be encoded.
///
/// Cells are stored by column position. A `None` slot is a gap: it produces no
/// `<c>` element but still occupies a column, so the encoder can derive cell
/// references from iteration order alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowRecord {
    cells: Vec<Option<CellRecord>>,
    height: Option<f64>,
    zero_height: bool,
    outline_level: u8,
    style: Option<u32>,
}

impl RowRecord {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row of consecutive cells starting at column A
    pub fn from_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        RowRecord {
            cells: values
                .into_iter()
                .map(|v| Some(CellRecord::new(v)))
                .collect(),
            ..Self::default()
        }
    }

    /// Set the cell at `column` (0-based), filling any gap with empty slots
    pub fn set_cell(&mut self, column: usize, cell: impl Into<CellRecord>) -> &mut Self {
        if self.cells.len() <= column {
            self.cells.resize(column + 1, None);
        }
        self.cells[column] = Some(cell.into());
        self
    }

    /// Append a cell after the last slot
    pub fn push(&mut self, cell: impl Into<CellRecord>) -> &mut Self {
        self.cells.push(Some(cell.into()));
        self
    }

    /// Remove the cell at `column`, leaving a gap
    pub fn clear_cell(&mut self, column: usize) -> Option<CellRecord> {
        self.cells.get_mut(column).and_then(Option::take)
    }

    /// Get cell at column index
    pub fn cell(&self, column: usize) -> Option<&CellRecord> {
        self.cells.get(column).and_then(Option::as_ref)
    }

    /// Iterate over all slots in column order, gaps included
    pub fn cells(&self) -> impl Iterator<Item = Option<&CellRecord>> {
        self.cells.iter().map(Option::as_ref)
    }

    /// One past the last column slot of this row
    pub fn last_cell_num(&self) -> usize {
        self.cells.len()
    }

    /// Number of cells actually present
    pub fn physical_cell_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Set an explicit row height in points; must be finite to be written
    pub fn set_height(&mut self, points: f64) -> &mut Self {
        self.height = Some(points);
        self
    }

    pub fn height(&self) -> Option<f64> {
        self.height
    }

    /// Hide the row (zero height)
    pub fn set_zero_height(&mut self, hidden: bool) -> &mut Self {
        self.zero_height = hidden;
        self
    }

    pub fn zero_height(&self) -> bool {
        self.zero_height
    }

    /// Outline (grouping) level, 0 means not grouped
    pub fn set_outline_level(&mut self, level: u8) -> &mut Self {
        self.outline_level = level;
        self
    }

    pub fn outline_level(&self) -> u8 {
        self.outline_level
    }

    /// Apply a row-level style index
    pub fn set_style(&mut self, style: u32) -> &mut Self {
        self.style = Some(style);
        self
    }

    pub fn style(&self) -> Option<u32> {
        self.style
    }
}

/// Convert column index to Excel letters (0 -> A, 25 -> Z, 26 -> AA)
pub fn column_letters(col: u32) -> String {
    let mut buf = Vec::with_capacity(3);
    push_column_letters(&mut buf, col);
    // Only ASCII letters are pushed
    buf.into_iter().map(char::from).collect()
}

/// Append the letters of a 0-based column index to `buf`
pub(crate) fn push_column_letters(buf: &mut Vec<u8>, col: u32) {
    let start = buf.len();
    let mut n = col as u64 + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        buf.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    buf[start..].reverse();
}

/// Excel-style cell reference for 0-based coordinates (e.g. `(0, 0)` -> `"A1"`)
pub fn cell_reference(row: u32, col: u32) -> String {
    format!("{}{}", column_letters(col), row as u64 + 1)
}
