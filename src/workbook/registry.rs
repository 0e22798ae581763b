//! Sheet registry: one ordered map from sheet handles to their state

use super::sheet::StreamSheet;
use crate::error::{ExcelError, Result};
use indexmap::IndexMap;
use std::fmt;

/// Maximum sheet name length accepted by spreadsheet applications
pub const MAX_SHEET_NAME_LEN: usize = 31;

const INVALID_SHEET_NAME_CHARS: [char; 7] = ['/', '\\', '?', '*', '[', ']', ':'];

/// Stable handle of a sheet within one workbook.
///
/// Handles are never reused, so a handle of a removed sheet stays invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SheetId(u32);

impl SheetId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registered sheet and the archive entry it is streamed into
#[derive(Debug)]
pub struct SheetRecord {
    part_name: String,
    sheet: StreamSheet,
}

impl SheetRecord {
    pub fn name(&self) -> &str {
        self.sheet.sheet_name()
    }

    /// Archive entry name of the worksheet part, e.g. `xl/worksheets/sheet1.xml`
    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    pub fn sheet(&self) -> &StreamSheet {
        &self.sheet
    }

    pub fn sheet_mut(&mut self) -> &mut StreamSheet {
        &mut self.sheet
    }
}

/// Check a sheet name against the rules spreadsheet applications enforce.
///
/// # Examples
///
/// ```
/// use excelsplice::workbook::validate_sheet_name;
///
/// assert!(validate_sheet_name("Q1 2024").is_ok());
/// assert!(validate_sheet_name("a/b").is_err());
/// assert!(validate_sheet_name("'quoted'").is_err());
/// ```
pub fn validate_sheet_name(name: &str) -> Result<()> {
    let invalid = |reason: String| ExcelError::InvalidSheetName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("sheet name must not be empty".to_string()));
    }
    let len = name.chars().count();
    if len > MAX_SHEET_NAME_LEN {
        return Err(invalid(format!(
            "sheet name is {} characters long, the limit is {}",
            len, MAX_SHEET_NAME_LEN
        )));
    }
    if let Some(c) = name.chars().find(|c| INVALID_SHEET_NAME_CHARS.contains(c)) {
        return Err(invalid(format!("sheet name contains invalid character '{}'", c)));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(invalid(
            "sheet name must not start or end with an apostrophe".to_string(),
        ));
    }
    Ok(())
}

fn same_name(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Ordered collection of the workbook's sheets.
///
/// Iteration order is workbook order; each sheet owns a worksheet part name
/// assigned at creation and kept for its lifetime.
#[derive(Debug, Default)]
pub struct SheetRegistry {
    sheets: IndexMap<SheetId, SheetRecord>,
    next_id: u32,
}

impl SheetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new sheet at the end of the workbook
    pub fn create(&mut self, name: &str) -> Result<SheetId> {
        validate_sheet_name(name)?;
        self.ensure_unique(name, None)?;

        let id = SheetId(self.next_id);
        self.next_id += 1;
        let record = SheetRecord {
            part_name: format!("xl/worksheets/sheet{}.xml", id.0 + 1),
            sheet: StreamSheet::new(name),
        };
        self.sheets.insert(id, record);
        Ok(id)
    }

    pub fn get(&self, id: SheetId) -> Option<&SheetRecord> {
        self.sheets.get(&id)
    }

    pub fn get_mut(&mut self, id: SheetId) -> Option<&mut SheetRecord> {
        self.sheets.get_mut(&id)
    }

    /// Look up a sheet by name, ignoring case
    pub fn id_by_name(&self, name: &str) -> Option<SheetId> {
        self.sheets
            .iter()
            .find(|(_, record)| same_name(record.name(), name))
            .map(|(id, _)| *id)
    }

    /// Sheet whose worksheet part is stored under `part_name`
    pub fn by_part_name_mut(&mut self, part_name: &str) -> Option<&mut SheetRecord> {
        self.sheets
            .values_mut()
            .find(|record| record.part_name == part_name)
    }

    /// Position of the sheet in workbook order
    pub fn index_of(&self, id: SheetId) -> Option<usize> {
        self.sheets.get_index_of(&id)
    }

    pub fn rename(&mut self, id: SheetId, name: &str) -> Result<()> {
        validate_sheet_name(name)?;
        self.ensure_unique(name, Some(id))?;

        let record = self
            .sheets
            .get_mut(&id)
            .ok_or_else(|| ExcelError::SheetNotFound(id.to_string()))?;
        record.sheet.set_sheet_name(name.to_string());
        Ok(())
    }

    /// Remove a sheet, keeping the order of the remaining ones
    pub fn remove(&mut self, id: SheetId) -> Result<SheetRecord> {
        self.sheets
            .shift_remove(&id)
            .ok_or_else(|| ExcelError::SheetNotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SheetId, &SheetRecord)> {
        self.sheets.iter().map(|(id, record)| (*id, record))
    }

    fn ensure_unique(&self, name: &str, except: Option<SheetId>) -> Result<()> {
        let taken = self
            .sheets
            .iter()
            .any(|(id, record)| Some(*id) != except && same_name(record.name(), name));
        if taken {
            return Err(ExcelError::InvalidSheetName {
                name: name.to_string(),
                reason: "the workbook already contains a sheet with this name".to_string(),
            });
        }
        Ok(())
    }
}
