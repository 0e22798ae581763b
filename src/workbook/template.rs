//! Template archives that streamed rows are spliced into

use super::xml_writer::XmlWriter;
use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs::File;
use std::io::{self, Cursor, Write};
use std::path::PathBuf;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const NS_SPREADSHEETML: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PACKAGE_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const CT_WORKSHEET: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

// Deflate level of the staged template; it is read back once and discarded
const STAGING_COMPRESSION_LEVEL: i64 = 1;

/// A sheet as the template needs to know it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateSheet<'a> {
    /// Sheet name shown in the workbook
    pub name: &'a str,
    /// Archive entry of the worksheet part, e.g. `xl/worksheets/sheet1.xml`
    pub part_name: &'a str,
}

/// Produces the template archive a workbook is written from.
///
/// The archive must contain one worksheet part per sheet, stored under the
/// sheet's part name, each with a `<sheetData>` element marking where rows
/// go. Every other entry is copied to the output unchanged.
pub trait TemplateSource {
    fn write_template(&self, sheets: &[TemplateSheet<'_>], out: &mut dyn Write) -> Result<()>;
}

/// Minimal SpreadsheetML package: content types, relationships, document
/// properties, workbook, a default stylesheet and an empty worksheet per sheet
///
/// # Examples
///
/// ```
/// use excelsplice::workbook::{DefaultTemplate, TemplateSheet, TemplateSource};
///
/// let sheets = [TemplateSheet { name: "Data", part_name: "xl/worksheets/sheet1.xml" }];
/// let mut archive = Vec::new();
/// DefaultTemplate::new().write_template(&sheets, &mut archive)?;
/// assert!(archive.starts_with(b"PK"));
/// # Ok::<(), excelsplice::ExcelError>(())
/// ```
#[derive(Debug, Clone)]
pub struct DefaultTemplate {
    creator: String,
    created: Option<DateTime<Utc>>,
}

impl Default for DefaultTemplate {
    fn default() -> Self {
        DefaultTemplate {
            creator: "excelsplice".to_string(),
            created: None,
        }
    }
}

impl DefaultTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Author recorded in the document properties
    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = creator.into();
        self
    }

    /// Fixed creation time instead of the time of writing
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    fn content_types<W: Write>(xml: &mut XmlWriter<W>, sheets: &[TemplateSheet<'_>]) -> Result<()> {
        xml.declaration()?;
        xml.start_element("Types")?;
        xml.attribute(
            "xmlns",
            "http://schemas.openxmlformats.org/package/2006/content-types",
        )?;
        xml.close_start_tag()?;

        for (extension, content_type) in [
            ("rels", "application/vnd.openxmlformats-package.relationships+xml"),
            ("xml", "application/xml"),
        ] {
            xml.start_element("Default")?;
            xml.attribute("Extension", extension)?;
            xml.attribute("ContentType", content_type)?;
            xml.close_empty()?;
        }

        let mut override_part = |part: &str, content_type: &str| -> Result<()> {
            xml.start_element("Override")?;
            xml.attribute("PartName", &format!("/{}", part))?;
            xml.attribute("ContentType", content_type)?;
            xml.close_empty()
        };
        override_part(
            "xl/workbook.xml",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
        )?;
        for sheet in sheets {
            override_part(sheet.part_name, CT_WORKSHEET)?;
        }
        override_part(
            "xl/styles.xml",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml",
        )?;
        override_part(
            "docProps/core.xml",
            "application/vnd.openxmlformats-package.core-properties+xml",
        )?;
        override_part(
            "docProps/app.xml",
            "application/vnd.openxmlformats-officedocument.extended-properties+xml",
        )?;

        xml.end_element("Types")
    }

    fn root_rels<W: Write>(xml: &mut XmlWriter<W>) -> Result<()> {
        xml.declaration()?;
        xml.write_str(concat!(
            "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
            "<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"xl/workbook.xml\"/>",
            "<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties\" Target=\"docProps/core.xml\"/>",
            "<Relationship Id=\"rId3\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties\" Target=\"docProps/app.xml\"/>",
            "</Relationships>"
        ))
    }

    fn core_props<W: Write>(&self, xml: &mut XmlWriter<W>) -> Result<()> {
        let created = self
            .created
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        xml.declaration()?;
        xml.write_str(concat!(
            "<cp:coreProperties",
            " xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\"",
            " xmlns:dc=\"http://purl.org/dc/elements/1.1/\"",
            " xmlns:dcterms=\"http://purl.org/dc/terms/\"",
            " xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">"
        ))?;
        xml.text_element("dc:creator", &self.creator)?;
        for element in ["dcterms:created", "dcterms:modified"] {
            xml.start_element(element)?;
            xml.attribute("xsi:type", "dcterms:W3CDTF")?;
            xml.close_start_tag()?;
            xml.write_str(&created)?;
            xml.end_element(element)?;
        }
        xml.end_element("cp:coreProperties")
    }

    fn app_props<W: Write>(xml: &mut XmlWriter<W>) -> Result<()> {
        xml.declaration()?;
        xml.start_element("Properties")?;
        xml.attribute(
            "xmlns",
            "http://schemas.openxmlformats.org/officeDocument/2006/extended-properties",
        )?;
        xml.close_start_tag()?;
        xml.text_element("Application", "excelsplice")?;
        xml.text_element("DocSecurity", "0")?;
        xml.text_element("ScaleCrop", "false")?;
        xml.text_element("LinksUpToDate", "false")?;
        xml.text_element("SharedDoc", "false")?;
        xml.text_element("HyperlinksChanged", "false")?;
        xml.end_element("Properties")
    }

    fn workbook<W: Write>(xml: &mut XmlWriter<W>, sheets: &[TemplateSheet<'_>]) -> Result<()> {
        xml.declaration()?;
        xml.start_element("workbook")?;
        xml.attribute("xmlns", NS_SPREADSHEETML)?;
        xml.attribute("xmlns:r", NS_RELATIONSHIPS)?;
        xml.close_start_tag()?;

        xml.start_element("sheets")?;
        xml.close_start_tag()?;
        for (i, sheet) in sheets.iter().enumerate() {
            let n = i as u64 + 1;
            xml.start_element("sheet")?;
            xml.attribute("name", sheet.name)?;
            xml.attribute_int("sheetId", n)?;
            xml.attribute("r:id", &format!("rId{}", n))?;
            xml.close_empty()?;
        }
        xml.end_element("sheets")?;
        xml.end_element("workbook")
    }

    fn workbook_rels<W: Write>(xml: &mut XmlWriter<W>, sheets: &[TemplateSheet<'_>]) -> Result<()> {
        xml.declaration()?;
        xml.start_element("Relationships")?;
        xml.attribute("xmlns", NS_PACKAGE_RELATIONSHIPS)?;
        xml.close_start_tag()?;

        let mut relationship = |id: usize, kind: &str, target: &str| -> Result<()> {
            xml.start_element("Relationship")?;
            xml.attribute("Id", &format!("rId{}", id))?;
            xml.attribute("Type", kind)?;
            xml.attribute("Target", target)?;
            xml.close_empty()
        };
        for (i, sheet) in sheets.iter().enumerate() {
            // Targets are relative to xl/, anything else gets an absolute target
            let target = match sheet.part_name.strip_prefix("xl/") {
                Some(relative) => relative.to_string(),
                None => format!("/{}", sheet.part_name),
            };
            relationship(i + 1, REL_WORKSHEET, &target)?;
        }
        relationship(sheets.len() + 1, REL_STYLES, "styles.xml")?;

        xml.end_element("Relationships")
    }

    fn styles<W: Write>(xml: &mut XmlWriter<W>) -> Result<()> {
        xml.declaration()?;
        xml.write_str(concat!(
            "<styleSheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">",
            "<fonts count=\"1\"><font><sz val=\"11\"/><name val=\"Calibri\"/></font></fonts>",
            "<fills count=\"2\"><fill><patternFill patternType=\"none\"/></fill>",
            "<fill><patternFill patternType=\"gray125\"/></fill></fills>",
            "<borders count=\"1\"><border><left/><right/><top/><bottom/><diagonal/></border></borders>",
            "<cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/></cellStyleXfs>",
            "<cellXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\"/></cellXfs>",
            "<cellStyles count=\"1\"><cellStyle name=\"Normal\" xfId=\"0\" builtinId=\"0\"/></cellStyles>",
            "</styleSheet>"
        ))
    }

    fn worksheet<W: Write>(xml: &mut XmlWriter<W>) -> Result<()> {
        xml.declaration()?;
        xml.start_element("worksheet")?;
        xml.attribute("xmlns", NS_SPREADSHEETML)?;
        xml.attribute("xmlns:r", NS_RELATIONSHIPS)?;
        xml.close_start_tag()?;
        xml.write_str("<sheetData/>")?;
        xml.write_str(
            "<pageMargins left=\"0.7\" right=\"0.7\" top=\"0.75\" bottom=\"0.75\" header=\"0.3\" footer=\"0.3\"/>",
        )?;
        xml.end_element("worksheet")
    }
}

impl TemplateSource for DefaultTemplate {
    fn write_template(&self, sheets: &[TemplateSheet<'_>], out: &mut dyn Write) -> Result<()> {
        // The package is a few kilobytes, so it is assembled in memory
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(STAGING_COMPRESSION_LEVEL));

        // Each part goes through its own XmlWriter so it is fully written
        // before the next entry starts
        zip.start_file("[Content_Types].xml", options)?;
        let mut xml = XmlWriter::new(&mut zip);
        Self::content_types(&mut xml, sheets)?;
        xml.finish()?;

        zip.start_file("_rels/.rels", options)?;
        let mut xml = XmlWriter::new(&mut zip);
        Self::root_rels(&mut xml)?;
        xml.finish()?;

        zip.start_file("docProps/core.xml", options)?;
        let mut xml = XmlWriter::new(&mut zip);
        self.core_props(&mut xml)?;
        xml.finish()?;

        zip.start_file("docProps/app.xml", options)?;
        let mut xml = XmlWriter::new(&mut zip);
        Self::app_props(&mut xml)?;
        xml.finish()?;

        zip.start_file("xl/workbook.xml", options)?;
        let mut xml = XmlWriter::new(&mut zip);
        Self::workbook(&mut xml, sheets)?;
        xml.finish()?;

        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        let mut xml = XmlWriter::new(&mut zip);
        Self::workbook_rels(&mut xml, sheets)?;
        xml.finish()?;

        zip.start_file("xl/styles.xml", options)?;
        let mut xml = XmlWriter::new(&mut zip);
        Self::styles(&mut xml)?;
        xml.finish()?;

        for sheet in sheets {
            zip.start_file(sheet.part_name, options)?;
            let mut xml = XmlWriter::new(&mut zip);
            Self::worksheet(&mut xml)?;
            xml.finish()?;
        }

        let archive = zip.finish()?.into_inner();
        out.write_all(&archive)?;
        log::debug!(
            "Default template written with {} sheet part(s), {} bytes",
            sheets.len(),
            archive.len()
        );
        Ok(())
    }
}

/// A template archive prepared elsewhere, e.g. saved from a spreadsheet
/// application with formatting already in place.
///
/// Sheet parts are matched by entry name, so the archive must store its
/// worksheets under the part names the workbook assigns
/// (`xl/worksheets/sheet1.xml`, `xl/worksheets/sheet2.xml`, ...).
#[derive(Debug, Clone)]
pub struct FileTemplate {
    path: PathBuf,
}

impl FileTemplate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileTemplate { path: path.into() }
    }
}

impl TemplateSource for FileTemplate {
    fn write_template(&self, _sheets: &[TemplateSheet<'_>], out: &mut dyn Write) -> Result<()> {
        let mut file = File::open(&self.path)?;
        let copied = io::copy(&mut file, out)?;
        log::debug!("Template '{}' staged ({} bytes)", self.path.display(), copied);
        Ok(())
    }
}
