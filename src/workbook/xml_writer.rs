//! Small buffered XML writer for the package parts of the template

use crate::error::Result;
use std::io::Write;

const FLUSH_THRESHOLD: usize = 4096;

/// XML writer that collects output in a buffer and hands it to the
/// underlying writer in large pieces
pub struct XmlWriter<W: Write> {
    writer: W,
    buffer: Vec<u8>,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(writer: W) -> Self {
        XmlWriter {
            writer,
            buffer: Vec::with_capacity(2 * FLUSH_THRESHOLD),
        }
    }

    /// Write raw bytes without escaping
    #[inline]
    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(data);
        self.flush_if_full()
    }

    #[inline]
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        self.write_raw(s.as_bytes())
    }

    /// Standard `<?xml ...?>` declaration followed by a newline
    pub fn declaration(&mut self) -> Result<()> {
        self.write_raw(b"<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n")
    }

    /// Open a start tag; attributes may follow until it is closed
    #[inline]
    pub fn start_element(&mut self, name: &str) -> Result<()> {
        self.write_raw(b"<")?;
        self.write_str(name)
    }

    #[inline]
    pub fn close_start_tag(&mut self) -> Result<()> {
        self.write_raw(b">")
    }

    /// Close the open start tag as an empty element
    #[inline]
    pub fn close_empty(&mut self) -> Result<()> {
        self.write_raw(b"/>")
    }

    #[inline]
    pub fn end_element(&mut self, name: &str) -> Result<()> {
        self.write_raw(b"</")?;
        self.write_str(name)?;
        self.write_raw(b">")
    }

    /// `<name>text</name>` with escaped text
    pub fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.start_element(name)?;
        self.close_start_tag()?;
        self.write_escaped(text)?;
        self.end_element(name)
    }

    #[inline]
    pub fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.write_raw(b" ")?;
        self.write_str(name)?;
        self.write_raw(b"=\"")?;
        self.write_escaped(value)?;
        self.write_raw(b"\"")
    }

    #[inline]
    pub fn attribute_int(&mut self, name: &str, value: u64) -> Result<()> {
        let mut num = itoa::Buffer::new();
        self.write_raw(b" ")?;
        self.write_str(name)?;
        self.write_raw(b"=\"")?;
        self.write_str(num.format(value))?;
        self.write_raw(b"\"")
    }

    /// Write text with the five predefined entities escaped
    pub fn write_escaped(&mut self, text: &str) -> Result<()> {
        let bytes = text.as_bytes();
        let mut last = 0;

        for (idx, byte) in bytes.iter().enumerate() {
            let entity: &[u8] = match byte {
                b'&' => b"&amp;",
                b'<' => b"&lt;",
                b'>' => b"&gt;",
                b'"' => b"&quot;",
                b'\'' => b"&apos;",
                _ => continue,
            };
            self.buffer.extend_from_slice(&bytes[last..idx]);
            self.buffer.extend_from_slice(entity);
            last = idx + 1;
        }
        self.buffer.extend_from_slice(&bytes[last..]);
        self.flush_if_full()
    }

    #[inline]
    fn flush_if_full(&mut self) -> Result<()> {
        if self.buffer.len() > FLUSH_THRESHOLD {
            self.writer.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }

    /// Write out everything buffered and return the underlying writer
    pub fn finish(mut self) -> Result<W> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}
