//! Write options and environment-driven configuration

use std::path::PathBuf;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

/// Environment variable overriding the deflate level (0-9)
pub const ENV_COMPRESSION_LEVEL: &str = "EXCELSPLICE_COMPRESSION_LEVEL";
/// Environment variable overriding the I/O buffer size in bytes
pub const ENV_BUFFER_SIZE: &str = "EXCELSPLICE_BUFFER_SIZE";
/// Environment variable selecting the directory for the staged template
pub const ENV_TEMP_DIR: &str = "EXCELSPLICE_TEMP_DIR";

const DEFAULT_COMPRESSION_LEVEL: u32 = 6;
const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;
const MIN_BUFFER_SIZE: usize = 512;

/// Options controlling how a workbook is written
///
/// # Examples
///
/// ```
/// use excelsplice::WriteOptions;
///
/// let options = WriteOptions::default()
///     .with_compression_level(1)
///     .with_buffer_size(16 * 1024);
/// assert_eq!(options.compression_level(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    compression_level: u32,
    buffer_size: usize,
    temp_dir: Option<PathBuf>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            buffer_size: DEFAULT_BUFFER_SIZE,
            temp_dir: None,
        }
    }
}

impl WriteOptions {
    /// Build options from `EXCELSPLICE_*` environment variables.
    ///
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = WriteOptions::default();

        if let Some(level) = lookup(ENV_COMPRESSION_LEVEL).and_then(|s| s.trim().parse().ok()) {
            options = options.with_compression_level(level);
        }
        if let Some(size) = lookup(ENV_BUFFER_SIZE).and_then(|s| s.trim().parse().ok()) {
            options = options.with_buffer_size(size);
        }
        if let Some(dir) = lookup(ENV_TEMP_DIR).filter(|s| !s.trim().is_empty()) {
            options = options.with_temp_dir(dir);
        }

        options
    }

    /// Deflate level for every output entry, clamped to 0-9
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    /// Size of the read/write buffers used while copying entries
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(MIN_BUFFER_SIZE);
        self
    }

    /// Directory where the template archive is staged
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn temp_dir(&self) -> Option<&PathBuf> {
        self.temp_dir.as_ref()
    }

    /// ZIP entry options for parts the writer compresses itself.
    ///
    /// Level 0 stores entries uncompressed.
    pub fn entry_options(&self) -> SimpleFileOptions {
        let options = SimpleFileOptions::default();
        match self.compression_level {
            0 => options.compression_method(CompressionMethod::Stored),
            level => options
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(i64::from(level))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let options = WriteOptions::default();
        assert_eq!(options.compression_level(), 6);
        assert_eq!(options.buffer_size(), 64 * 1024);
        assert!(options.temp_dir().is_none());
    }

    #[test]
    fn test_from_lookup_reads_values() {
        let options = WriteOptions::from_lookup(lookup_from(&[
            (ENV_COMPRESSION_LEVEL, "3"),
            (ENV_BUFFER_SIZE, "4096"),
            (ENV_TEMP_DIR, "/var/tmp"),
        ]));

        assert_eq!(options.compression_level(), 3);
        assert_eq!(options.buffer_size(), 4096);
        assert_eq!(options.temp_dir(), Some(&PathBuf::from("/var/tmp")));
    }

    #[test]
    fn test_from_lookup_ignores_garbage() {
        let options = WriteOptions::from_lookup(lookup_from(&[
            (ENV_COMPRESSION_LEVEL, "fast"),
            (ENV_BUFFER_SIZE, "-1"),
            (ENV_TEMP_DIR, "  "),
        ]));

        assert_eq!(options, WriteOptions::default());
    }

    #[test]
    fn test_clamping() {
        let options = WriteOptions::default()
            .with_compression_level(42)
            .with_buffer_size(1);
        assert_eq!(options.compression_level(), 9);
        assert_eq!(options.buffer_size(), MIN_BUFFER_SIZE);
    }

    #[test]
    fn test_level_zero_stores_entries() {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = WriteOptions::default().with_compression_level(0);
        zip.start_file("a.xml", options.entry_options()).unwrap();
        std::io::Write::write_all(&mut zip, b"<a/>").unwrap();
        let archive = zip.finish().unwrap().into_inner();

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(archive)).unwrap();
        let entry = archive.by_index(0).unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Stored);
        assert_eq!(entry.size(), 4);
    }
}
