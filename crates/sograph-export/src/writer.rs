use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Dialect of the exported tables.
///
/// Rows end with CRLF unless configured otherwise, as RFC 4180 prescribes
/// and as spreadsheet tools and Gephi expect.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvWriterConfig {
    #[serde(default = "default_csv_delimiter")]
    pub delimiter: char,
    #[serde(default)]
    pub escape: Option<char>,
    #[serde(default = "default_csv_terminator")]
    pub terminator: CsvTerminator,
}

impl Default for CsvWriterConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            escape: None,
            terminator: CsvTerminator::CRLF,
        }
    }
}

fn default_csv_delimiter() -> char {
    CsvWriterConfig::default().delimiter
}

fn default_csv_terminator() -> CsvTerminator {
    CsvWriterConfig::default().terminator
}

/// Record terminator, `Any` taking a single ASCII character.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum CsvTerminator {
    CRLF,
    Any(char),
}

impl From<CsvTerminator> for csv::Terminator {
    fn from(source: CsvTerminator) -> Self {
        match source {
            CsvTerminator::CRLF => Self::CRLF,
            CsvTerminator::Any(c) => Self::Any(c as u8),
        }
    }
}

impl From<&CsvWriterConfig> for csv::WriterBuilder {
    fn from(c: &CsvWriterConfig) -> Self {
        let mut builder = csv::WriterBuilder::new();
        builder.delimiter(c.delimiter as u8);
        builder.terminator(c.terminator.into());
        // Headers are always written explicitly, even for empty tables
        builder.has_headers(false);
        if let Some(escape) = c.escape {
            builder.double_quote(false);
            builder.escape(escape as u8);
        } else {
            builder.double_quote(true);
        }
        builder
    }
}

/// How output files are opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileMode {
    /// Fail if the file already exists
    #[default]
    CreateNew,
    /// Replace any existing content
    Truncate,
}

impl From<FileMode> for fs_err::OpenOptions {
    fn from(mode: FileMode) -> Self {
        let mut opts = fs_err::OpenOptions::new();
        opts.write(true);
        match mode {
            FileMode::CreateNew => opts.create_new(true),
            FileMode::Truncate => opts.create(true).truncate(true),
        };
        opts
    }
}

pub fn open_csv(
    path: &Path,
    mode: FileMode,
    config: &CsvWriterConfig,
) -> io::Result<csv::Writer<fs_err::File>> {
    let file = fs_err::OpenOptions::from(mode).open(path)?;
    Ok(csv::WriterBuilder::from(config).from_writer(file))
}
