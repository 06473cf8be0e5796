//! I/O helpers for record input and CSV output.
//!
//! - **Format detection**: `.json` and `.csv`/`.tsv` by extension; the `-`
//!   path reads JSON from stdin.
//! - **Readers**: buffered file or stdin readers behind `Box<dyn Read>`.
//! - **Writers**: CSV writers to a file or stdout that quote only when a
//!   field needs it.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use csv::QuoteStyle;

use crate::error::{StatError, StatResult};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Csv { delimiter: u8 },
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn detect_input_format(path: &Path) -> StatResult<InputFormat> {
    if is_dash(path) {
        return Ok(InputFormat::Json);
    }
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(InputFormat::Json),
        Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(InputFormat::Csv {
            delimiter: DEFAULT_CSV_DELIMITER,
        }),
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => Ok(InputFormat::Csv {
            delimiter: DEFAULT_TSV_DELIMITER,
        }),
        _ => Err(StatError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

pub fn open_input(path: &Path) -> StatResult<Box<dyn Read>> {
    if is_dash(path) {
        let mut buffer = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut buffer)
            .map_err(StatError::Stdin)?;
        return Ok(Box::new(io::Cursor::new(buffer)));
    }
    let file = File::open(path).map_err(|source| StatError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Box::new(BufReader::new(file)))
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .trim(csv::Trim::Headers)
        .flexible(false);
    builder.from_reader(reader)
}

pub fn csv_writer<W>(writer: W, delimiter: u8) -> csv::Writer<W>
where
    W: Write,
{
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    builder.from_writer(writer)
}

pub fn open_output(path: Option<&Path>) -> io::Result<Box<dyn Write>> {
    match path {
        Some(p) if !is_dash(p) => Ok(Box::new(BufWriter::new(File::create(p)?))),
        _ => Ok(Box::new(io::stdout())),
    }
}
