//! Streaming workbook
//!
//! [`StreamWorkbook`] keeps the sheet structure in memory and writes the
//! rows of every sheet in a single pass: a template archive is staged in a
//! temporary file, then copied to the output while each worksheet's
//! `<sheetData>` is filled from the registered row producer.

pub mod registry;
pub mod sheet;
pub mod template;
pub mod xml_writer;

pub use registry::{validate_sheet_name, SheetId, SheetRecord, SheetRegistry, MAX_SHEET_NAME_LEN};
pub use sheet::StreamSheet;
pub use template::{DefaultTemplate, FileTemplate, TemplateSheet, TemplateSource};
pub use xml_writer::XmlWriter;

use crate::config::WriteOptions;
use crate::error::{ExcelError, Result};
use crate::inject::{patch_archive, RowChunks, SheetContent};
use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use zip::{ZipArchive, ZipWriter};

type StreamSource = Box<dyn for<'a> FnMut(&'a mut StreamSheet) -> RowChunks<'a>>;

/// Workbook whose rows are pulled from a producer while the file is written.
///
/// # Examples
///
/// ```no_run
/// use excelsplice::StreamWorkbook;
///
/// let mut workbook = StreamWorkbook::new();
/// workbook.create_sheet("Report")?;
/// workbook.set_stream_source(|sheet| {
///     Box::new((0..1_000_000u32).map(move |i| {
///         sheet.create_row(i)?.push(format!("row {}", i)).push(i as f64);
///         sheet.flush_rows()
///     }))
/// });
/// workbook.save("report.xlsx")?;
/// # Ok::<(), excelsplice::ExcelError>(())
/// ```
pub struct StreamWorkbook {
    registry: SheetRegistry,
    options: WriteOptions,
    template: Box<dyn TemplateSource>,
    stream_source: Option<StreamSource>,
}

impl Default for StreamWorkbook {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamWorkbook {
    /// Create a workbook with options taken from the environment
    pub fn new() -> Self {
        Self::with_options(WriteOptions::from_env())
    }

    pub fn with_options(options: WriteOptions) -> Self {
        StreamWorkbook {
            registry: SheetRegistry::new(),
            options,
            template: Box::new(DefaultTemplate::new()),
            stream_source: None,
        }
    }

    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    /// Add a sheet at the end of the workbook
    pub fn create_sheet(&mut self, name: &str) -> Result<SheetId> {
        let id = self.registry.create(name)?;
        log::debug!("Created sheet '{}' ({})", name, id);
        Ok(id)
    }

    pub fn sheet(&self, id: SheetId) -> Option<&StreamSheet> {
        self.registry.get(id).map(SheetRecord::sheet)
    }

    pub fn sheet_mut(&mut self, id: SheetId) -> Option<&mut StreamSheet> {
        self.registry.get_mut(id).map(SheetRecord::sheet_mut)
    }

    /// Handle of the sheet called `name`, ignoring case
    pub fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.registry.id_by_name(name)
    }

    /// Sheet names in workbook order
    pub fn sheet_names(&self) -> Vec<String> {
        self.registry
            .iter()
            .map(|(_, record)| record.name().to_string())
            .collect()
    }

    pub fn number_of_sheets(&self) -> usize {
        self.registry.len()
    }

    /// 0-based position of the sheet in the workbook
    pub fn sheet_index(&self, id: SheetId) -> Option<usize> {
        self.registry.index_of(id)
    }

    pub fn set_sheet_name(&mut self, id: SheetId, name: &str) -> Result<()> {
        self.registry.rename(id, name)
    }

    pub fn remove_sheet(&mut self, id: SheetId) -> Result<()> {
        let record = self.registry.remove(id)?;
        log::debug!("Removed sheet '{}' ({})", record.name(), id);
        Ok(())
    }

    /// Register the row producer.
    ///
    /// It is called once per sheet while that sheet's part is written, and
    /// the returned chunks are written in order until the iterator ends. The
    /// first error aborts the write.
    pub fn set_stream_source<F>(&mut self, source: F)
    where
        F: for<'a> FnMut(&'a mut StreamSheet) -> RowChunks<'a> + 'static,
    {
        self.stream_source = Some(Box::new(source));
    }

    /// Replace the template the workbook is written from
    pub fn set_template(&mut self, template: Box<dyn TemplateSource>) {
        self.template = template;
    }

    /// Write the workbook to `out` and hand it back.
    ///
    /// The output must be seekable so entry headers can be completed once a
    /// sheet's size is known; wrap in-memory buffers in `std::io::Cursor`.
    /// Fails with [`ExcelError::NoStreamSource`] before writing anything if
    /// no producer was registered.
    pub fn write<W: Write + Seek>(&mut self, out: W) -> Result<W> {
        let source = self
            .stream_source
            .as_mut()
            .ok_or(ExcelError::NoStreamSource)?;
        let buffer_size = self.options.buffer_size();

        let mut staged = match self.options.temp_dir() {
            Some(dir) => tempfile::tempfile_in(dir)?,
            None => tempfile::tempfile()?,
        };
        {
            let sheets: Vec<TemplateSheet<'_>> = self
                .registry
                .iter()
                .map(|(_, record)| TemplateSheet {
                    name: record.name(),
                    part_name: record.part_name(),
                })
                .collect();
            let mut sink = BufWriter::with_capacity(buffer_size, &mut staged);
            self.template.write_template(&sheets, &mut sink)?;
            sink.flush()?;
        }
        staged.seek(SeekFrom::Start(0))?;

        let mut reader = ZipArchive::new(BufReader::with_capacity(buffer_size, staged))
            .map_err(|e| ExcelError::ReadError(e.to_string()))?;
        let mut writer = ZipWriter::new(out);
        let mut content = StreamedSheets {
            registry: &mut self.registry,
            source,
        };
        let summary = patch_archive(&mut reader, &mut writer, &mut content, &self.options)?;

        for (_, record) in self.registry.iter() {
            let patched = summary
                .sheets_patched
                .iter()
                .any(|(part, _)| part == record.part_name());
            if !patched {
                log::warn!(
                    "Template has no part '{}', rows of sheet '{}' were not written",
                    record.part_name(),
                    record.name()
                );
            } else if record.sheet().pending_rows() > 0 {
                log::warn!(
                    "{} row(s) of sheet '{}' were never flushed and are not in the output",
                    record.sheet().pending_rows(),
                    record.name()
                );
            }
        }

        let out = writer.finish()?;
        log::info!(
            "Workbook written: {} sheet(s), {} chunk(s) streamed, {} entries copied",
            summary.sheets_patched.len(),
            summary.chunks_streamed,
            summary.entries_copied
        );
        Ok(out)
    }

    /// Write the workbook to a file at `path`
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if self.stream_source.is_none() {
            return Err(ExcelError::NoStreamSource);
        }
        let file = File::create(path.as_ref())?;
        let buffer_size = self.options.buffer_size();
        let mut out = self.write(BufWriter::with_capacity(buffer_size, file))?;
        out.flush()?;
        Ok(())
    }
}

/// Routes worksheet parts to the producer, handing it the matching sheet
struct StreamedSheets<'w> {
    registry: &'w mut SheetRegistry,
    source: &'w mut StreamSource,
}

impl SheetContent for StreamedSheets<'_> {
    fn rows_for(&mut self, part_name: &str) -> Option<RowChunks<'_>> {
        let record = self.registry.by_part_name_mut(part_name)?;
        Some((self.source)(record.sheet_mut()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn read_entry(archive: Vec<u8>, name: &str) -> String {
        let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
        let mut text = String::new();
        zip.by_name(name).unwrap().read_to_string(&mut text).unwrap();
        text
    }

    #[test]
    fn test_write_without_source_fails_before_output() {
        let mut workbook = StreamWorkbook::with_options(WriteOptions::default());
        workbook.create_sheet("Sheet1").unwrap();

        let err = workbook.write(Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, ExcelError::NoStreamSource));
    }

    #[test]
    fn test_sheet_management() {
        let mut workbook = StreamWorkbook::with_options(WriteOptions::default());
        let a = workbook.create_sheet("A").unwrap();
        let b = workbook.create_sheet("B").unwrap();
        let c = workbook.create_sheet("C").unwrap();

        assert_eq!(workbook.number_of_sheets(), 3);
        assert_eq!(workbook.sheet_id("b"), Some(b));
        assert_eq!(workbook.sheet_index(c), Some(2));

        workbook.set_sheet_name(b, "Beta").unwrap();
        workbook.remove_sheet(a).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Beta", "C"]);
        assert_eq!(workbook.sheet_index(c), Some(1));
        assert!(workbook.sheet(a).is_none());
        assert!(matches!(
            workbook.remove_sheet(a),
            Err(ExcelError::SheetNotFound(_))
        ));
        assert_eq!(workbook.sheet(b).unwrap().sheet_name(), "Beta");
    }

    #[test]
    fn test_rows_created_before_write_are_streamed() {
        let mut workbook = StreamWorkbook::with_options(WriteOptions::default());
        let id = workbook.create_sheet("Sheet1").unwrap();
        workbook
            .sheet_mut(id)
            .unwrap()
            .create_row(0)
            .unwrap()
            .push("header");

        workbook.set_stream_source(|sheet| {
            Box::new((1..3u32).map(move |i| {
                sheet.create_row(i)?.push(format!("value{}0", i));
                sheet.flush_rows()
            }))
        });

        let archive = workbook.write(Cursor::new(Vec::new())).unwrap().into_inner();
        let xml = read_entry(archive, "xl/worksheets/sheet1.xml");
        assert!(xml.contains(
            "<sheetData><row r=\"1\"><c r=\"A1\" t=\"inlineStr\"><is><t>header</t></is></c></row>"
        ));
        assert!(xml.contains("<row r=\"3\"><c r=\"A3\" t=\"inlineStr\"><is><t>value20</t></is></c></row>\n</sheetData>"));

        let sheet = workbook.sheet(id).unwrap();
        assert_eq!(sheet.stats().number_of_flushed_rows(), 3);
        assert_eq!(sheet.pending_rows(), 0);
    }

    #[test]
    fn test_producer_error_aborts_write() {
        let mut workbook = StreamWorkbook::with_options(WriteOptions::default());
        workbook.create_sheet("Sheet1").unwrap();
        workbook.set_stream_source(|sheet| {
            Box::new(std::iter::once_with(move || {
                sheet.create_row(0)?.push(f64::INFINITY);
                sheet.flush_rows()
            }))
        });

        let err = workbook.write(Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, ExcelError::WriteRowError { row: 0, .. }));
    }
}
