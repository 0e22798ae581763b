//! Archive patcher: copies a template archive entry by entry, splicing
//! streamed rows into the worksheet parts it is told about.

use super::scanner::{Placeholder, PlaceholderScanner, Scan, CLOSE_TAG, OPEN_TAG};
use crate::config::WriteOptions;
use crate::error::{ExcelError, Result};
use std::io::{self, BufWriter, Read, Seek, Write};
use zip::result::ZipError;
use zip::{ZipArchive, ZipWriter};

/// Lazily produced, pre-rendered `<row>` markup for one sheet
pub type RowChunks<'a> = Box<dyn Iterator<Item = Result<String>> + 'a>;

/// Maps template entries to the row content streamed into them
pub trait SheetContent {
    /// Row chunks for the worksheet stored under `part_name`, or `None` when
    /// the entry is not a streaming sheet and must be copied unchanged.
    fn rows_for(&mut self, part_name: &str) -> Option<RowChunks<'_>>;
}

/// What happened during a patch pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSummary {
    /// Entries copied without modification
    pub entries_copied: usize,
    /// Worksheet parts that received streamed rows, with the placeholder found
    pub sheets_patched: Vec<(String, Placeholder)>,
    /// Chunks pulled from all producers
    pub chunks_streamed: usize,
}

fn read_error(err: ZipError) -> ExcelError {
    ExcelError::ReadError(err.to_string())
}

/// Copy every entry of `template` to `output`, in order.
///
/// Entries for which `sheets` supplies row content are decompressed,
/// spliced and compressed again as ZIP64 entries, since their size is only
/// known once the producer is drained. All other entries are copied in
/// their compressed form. Only one entry is open at a time.
pub fn patch_archive<R, W, S>(
    template: &mut ZipArchive<R>,
    output: &mut ZipWriter<W>,
    sheets: &mut S,
    options: &WriteOptions,
) -> Result<PatchSummary>
where
    R: Read + Seek,
    W: Write + Seek,
    S: SheetContent + ?Sized,
{
    let mut summary = PatchSummary::default();
    let sheet_options = options.entry_options().large_file(true);

    for index in 0..template.len() {
        let name = template
            .name_for_index(index)
            .map(str::to_string)
            .ok_or_else(|| ExcelError::ReadError(format!("template entry {} has no name", index)))?;

        match sheets.rows_for(&name) {
            Some(rows) => {
                log::debug!("Splicing streamed rows into '{}'", name);
                output.start_file(name.as_str(), sheet_options)?;
                let mut input = template.by_index(index).map_err(read_error)?;
                let mut sink = BufWriter::with_capacity(options.buffer_size(), &mut *output);

                let (placeholder, chunks) =
                    splice_sheet_data(&mut input, &mut sink, rows, options.buffer_size())?;
                sink.into_inner().map_err(|e| e.into_error())?;

                if matches!(placeholder, Placeholder::Missing | Placeholder::Unclosed) {
                    log::warn!(
                        "'{}' has no well-formed <sheetData> placeholder ({:?}); rows appended at the end of the part",
                        name,
                        placeholder
                    );
                }
                summary.chunks_streamed += chunks;
                summary.sheets_patched.push((name, placeholder));
            }
            None => {
                let entry = template.by_index_raw(index).map_err(read_error)?;
                let size = entry.size();
                output.raw_copy_file(entry)?;
                log::debug!("Copied '{}' ({} bytes)", name, size);
                summary.entries_copied += 1;
            }
        }
    }

    Ok(summary)
}

/// Rewrite one worksheet part: everything up to the placeholder, the open
/// tag, every chunk of `rows`, the close tag, then the rest of the part.
///
/// Returns the placeholder form found and the number of chunks written.
pub fn splice_sheet_data<R, W>(
    input: &mut R,
    out: &mut W,
    rows: RowChunks<'_>,
    buffer_size: usize,
) -> Result<(Placeholder, usize)>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut scanner = PlaceholderScanner::new();
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut remainder = 0..0;

    let placeholder = loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break scanner.finish(out)?,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if let Scan::Found {
            consumed,
            placeholder,
        } = scanner.feed(&buf[..n], out)?
        {
            remainder = consumed..n;
            break placeholder;
        }
    };

    if !scanner.open_tag_written() {
        out.write_all(OPEN_TAG)?;
        out.write_all(b">")?;
    }

    let mut chunks = 0;
    for chunk in rows {
        out.write_all(chunk?.as_bytes())?;
        chunks += 1;
    }

    out.write_all(CLOSE_TAG)?;
    out.write_all(&buf[remainder])?;
    io::copy(input, out)?;

    Ok((placeholder, chunks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;

    struct FixedRows(HashMap<String, Vec<String>>);

    impl SheetContent for FixedRows {
        fn rows_for(&mut self, part_name: &str) -> Option<RowChunks<'_>> {
            let chunks = self.0.remove(part_name)?;
            Some(Box::new(chunks.into_iter().map(Ok::<String, ExcelError>)))
        }
    }

    fn splice(template: &str, chunks: &[&str], buffer_size: usize) -> (String, Placeholder, usize) {
        let rows: RowChunks<'_> = Box::new(
            chunks
                .iter()
                .map(|c| Ok::<_, ExcelError>(c.to_string()))
                .collect::<Vec<_>>()
                .into_iter(),
        );
        let mut out = Vec::new();
        let (placeholder, count) =
            splice_sheet_data(&mut template.as_bytes(), &mut out, rows, buffer_size).unwrap();
        (String::from_utf8(out).unwrap(), placeholder, count)
    }

    #[test]
    fn test_splice_self_closing() {
        let (xml, placeholder, count) = splice(
            "<worksheet><sheetData/><pageMargins/></worksheet>",
            &["<row r=\"1\"></row>", "<row r=\"2\"></row>"],
            4,
        );
        assert_eq!(
            xml,
            "<worksheet><sheetData><row r=\"1\"></row><row r=\"2\"></row></sheetData><pageMargins/></worksheet>"
        );
        assert_eq!(placeholder, Placeholder::SelfClosing);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_empty_stream_same_output_for_both_forms() {
        let (self_closing, _, _) = splice("<ws><sheetData/></ws>", &[], 8192);
        let (paired, _, _) = splice("<ws><sheetData></sheetData></ws>", &[], 8192);

        assert_eq!(self_closing, "<ws><sheetData></sheetData></ws>");
        assert_eq!(paired, self_closing);
    }

    #[test]
    fn test_missing_placeholder_appends_element() {
        let (xml, placeholder, _) = splice("<ws></ws>", &["<row r=\"1\"></row>"], 3);
        assert_eq!(xml, "<ws></ws><sheetData><row r=\"1\"></row></sheetData>");
        assert_eq!(placeholder, Placeholder::Missing);
    }

    #[test]
    fn test_unclosed_placeholder_is_closed() {
        let (xml, placeholder, _) = splice("<ws><sheetData><row/>", &["<x/>"], 5);
        assert_eq!(xml, "<ws><sheetData><row/><x/></sheetData>");
        assert_eq!(placeholder, Placeholder::Unclosed);
    }

    #[test]
    fn test_producer_error_aborts() {
        let rows: RowChunks<'_> = Box::new(
            vec![
                Ok("<row r=\"1\"></row>".to_string()),
                Err(ExcelError::WriteError("producer failed".to_string())),
            ]
            .into_iter(),
        );
        let mut out = Vec::new();
        let err = splice_sheet_data(&mut &b"<sheetData/>"[..], &mut out, rows, 64).unwrap_err();
        assert!(matches!(err, ExcelError::WriteError(_)));
    }

    fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            zip.start_file(*name, WriteOptions::default().entry_options())
                .unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn entry_bytes(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Vec<u8> {
        let mut data = Vec::new();
        archive.by_name(name).unwrap().read_to_end(&mut data).unwrap();
        data
    }

    #[test]
    fn test_patch_archive_copies_and_splices() {
        let template = zip_with(&[
            ("[Content_Types].xml", b"<Types/>"),
            ("xl/worksheets/sheet1.xml", b"<worksheet><sheetData/></worksheet>"),
            ("xl/styles.xml", b"<styleSheet/>"),
        ]);

        let mut reader = ZipArchive::new(Cursor::new(template)).unwrap();
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let mut sheets = FixedRows(HashMap::from([(
            "xl/worksheets/sheet1.xml".to_string(),
            vec!["<row r=\"1\"></row>".to_string()],
        )]));

        let summary =
            patch_archive(&mut reader, &mut writer, &mut sheets, &WriteOptions::default()).unwrap();
        let output = writer.finish().unwrap().into_inner();

        assert_eq!(summary.entries_copied, 2);
        assert_eq!(summary.chunks_streamed, 1);
        assert_eq!(
            summary.sheets_patched,
            vec![(
                "xl/worksheets/sheet1.xml".to_string(),
                Placeholder::SelfClosing
            )]
        );

        let mut patched = ZipArchive::new(Cursor::new(output)).unwrap();
        assert_eq!(
            (0..patched.len())
                .map(|i| patched.name_for_index(i).unwrap().to_string())
                .collect::<Vec<_>>(),
            vec!["[Content_Types].xml", "xl/worksheets/sheet1.xml", "xl/styles.xml"]
        );
        assert_eq!(
            entry_bytes(&mut patched, "xl/worksheets/sheet1.xml"),
            b"<worksheet><sheetData><row r=\"1\"></row></sheetData></worksheet>"
        );
        assert_eq!(entry_bytes(&mut patched, "xl/styles.xml"), b"<styleSheet/>");
    }

    #[test]
    fn test_spliced_parts_have_no_size_ceiling() {
        let template = zip_with(&[
            ("xl/worksheets/sheet1.xml", b"<worksheet><sheetData/></worksheet>"),
            ("xl/styles.xml", b"<styleSheet/>"),
        ]);
        let mut reader = ZipArchive::new(Cursor::new(template)).unwrap();
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let mut sheets = FixedRows(HashMap::from([(
            "xl/worksheets/sheet1.xml".to_string(),
            vec!["<row r=\"1\"></row>".to_string()],
        )]));
        patch_archive(&mut reader, &mut writer, &mut sheets, &WriteOptions::default()).unwrap();
        let output = writer.finish().unwrap().into_inner();

        let mut patched = ZipArchive::new(Cursor::new(output.clone())).unwrap();
        let mut header_of = |name: &str| patched.by_name(name).unwrap().header_start() as usize;
        let sheet_header = header_of("xl/worksheets/sheet1.xml");
        let styles_header = header_of("xl/styles.xml");

        // ZIP64 local headers defer both sizes to the extra field
        assert_eq!(output[sheet_header + 18..sheet_header + 26], [0xFF; 8]);
        assert_ne!(output[styles_header + 18..styles_header + 26], [0xFF; 8]);
        assert_eq!(
            entry_bytes(&mut patched, "xl/worksheets/sheet1.xml"),
            b"<worksheet><sheetData><row r=\"1\"></row></sheetData></worksheet>"
        );
    }
}
