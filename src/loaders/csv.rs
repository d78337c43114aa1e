//! Reader for delimited and whitespace-separated text files.
use std::{collections::BTreeSet, fs::File, io::{BufRead, BufReader}, path::Path};

use error_stack::ResultExt;

use crate::{error::LoadError, values::Value};

use super::{RawFrame, RawReader};

/// Reads text tables with one header line naming the columns.
///
/// Cells are inferred with [`Value::from_raw_str`]. Rows shorter than the header are
/// padded with missing values; extra cells are ignored.
#[derive(Debug, Clone)]
pub struct CsvReader {
    delimiter: u8,
    whitespace: bool,
    skip_after_header: usize,
}

impl Default for CsvReader {
    fn default() -> Self {
        Self { delimiter: b',', whitespace: false, skip_after_header: 0 }
    }
}

impl CsvReader {
    /// A reader for files delimited by `delimiter`.
    pub fn delimited(delimiter: u8) -> Self {
        Self { delimiter, ..Default::default() }
    }

    /// A reader for files whose cells are separated by any amount of whitespace.
    pub fn whitespace() -> Self {
        Self { whitespace: true, ..Default::default() }
    }

    /// Skip `n` lines after the header, e.g. a units line.
    pub fn skip_after_header(mut self, n: usize) -> Self {
        self.skip_after_header = n;
        self
    }

    fn read_delimited(&self, path: &Path) -> error_stack::Result<(Vec<String>, Vec<Vec<String>>), LoadError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .change_context_lazy(|| LoadError::could_not_read(path))?;

        let headers = rdr.headers()
            .change_context_lazy(|| LoadError::parsing_error(path, "could not read the header line"))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = vec![];
        for (i, record) in rdr.records().enumerate() {
            let record = record
                .change_context_lazy(|| LoadError::parsing_error(path, format!("bad record after line {}", i + 1)))?;
            if i < self.skip_after_header {
                continue;
            }
            rows.push(record.iter().map(|c| c.to_string()).collect());
        }
        Ok((headers, rows))
    }

    fn read_whitespace(&self, path: &Path) -> error_stack::Result<(Vec<String>, Vec<Vec<String>>), LoadError> {
        let f = File::open(path)
            .change_context_lazy(|| LoadError::could_not_read(path))?;
        let mut lines = BufReader::new(f).lines();

        let headers = match lines.next() {
            Some(line) => line.change_context_lazy(|| LoadError::could_not_read(path))?
                .split_whitespace()
                .map(|h| h.to_string())
                .collect(),
            None => return Err(LoadError::parsing_error(path, "the file is empty").into()),
        };

        let mut rows = vec![];
        for (i, line) in lines.enumerate() {
            let line = line.change_context_lazy(|| LoadError::could_not_read(path))?;
            if i < self.skip_after_header || line.trim().is_empty() {
                continue;
            }
            rows.push(line.split_whitespace().map(|c| c.to_string()).collect());
        }
        Ok((headers, rows))
    }
}

impl RawReader for CsvReader {
    fn format_name(&self) -> &'static str {
        if self.whitespace { "whitespace-delimited" } else { "CSV" }
    }

    fn read(&self, path: &Path, wanted: &BTreeSet<String>) -> error_stack::Result<RawFrame, LoadError> {
        let (headers, rows) = if self.whitespace {
            self.read_whitespace(path)?
        } else {
            self.read_delimited(path)?
        };

        let mut seen = BTreeSet::new();
        let mut frame = RawFrame::new(rows.len());
        for (icol, header) in headers.iter().enumerate() {
            if !wanted.contains(header) {
                continue;
            }
            if !seen.insert(header.as_str()) {
                log::warn!("Column {header} appears twice in {}, using the first one", path.display());
                continue;
            }
            let values = rows.iter()
                .map(|r| r.get(icol).map(|c| Value::from_raw_str(c)).unwrap_or_default())
                .collect();
            frame.push(header.as_str(), values)
                .map_err(|e| LoadError::parsing_error(path, e))?;
        }
        Ok(frame)
    }
}
