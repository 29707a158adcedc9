//! Row/record layer: lines, rows and records over a byte stream
//!
//! Logically this sits above the stage executor: the byte pipeline
//! delivers a decoded stream, a line splitter runs beneath, and the
//! [`Tabular`] engine turns lines into structured rows/records and back,
//! tracking the header state machine for the session.
//!
//! Readers are iterators yielding `Result` items, in the same shape as the
//! streaming parsers elsewhere in the crate; writers validate against the
//! fixed column list and emit the header line when the format needs one.

use std::io::{BufRead, BufReader, Read, Write};

use crate::error::Result;
use crate::types::{Record, Row};

pub mod header;
pub mod tabular;

pub use header::{cleanse_column_name, TabularHeader};
pub use tabular::{FixedColumn, FixedLayout, Tabular};

/// Iterator over the lines of a decoded stream
///
/// Yields each line with its trailing `\n`/`\r\n` removed. Blank lines are
/// preserved; the row/record readers above skip them.
pub struct LineReader<'a> {
    reader: BufReader<&'a mut dyn Read>,
    line_number: usize,
}

impl<'a> LineReader<'a> {
    /// Wrap a decoded stream
    pub fn new(stream: &'a mut dyn Read) -> Self {
        Self {
            reader: BufReader::new(stream),
            line_number: 0,
        }
    }

    /// The current line number (1-based), for error reporting
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl Iterator for LineReader<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                self.line_number += 1;
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }
                Some(Ok(line))
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}

/// Iterator over positional rows
///
/// CSV/PSV streams yield every line as a row, including the header line;
/// use [`RecordReader`] for header-aware reading.
pub struct RowReader<'a> {
    lines: LineReader<'a>,
    tabular: Tabular,
}

impl<'a> RowReader<'a> {
    /// Wrap a decoded stream with a tabular engine
    pub fn new(stream: &'a mut dyn Read, tabular: Tabular) -> Self {
        Self {
            lines: LineReader::new(stream),
            tabular,
        }
    }

    /// The engine, for header inspection
    pub fn tabular(&self) -> &Tabular {
        &self.tabular
    }
}

impl Iterator for RowReader<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(self.tabular.parse_row(&line));
        }
    }
}

/// Iterator over records, consuming the header first where the format has
/// one
pub struct RecordReader<'a> {
    lines: LineReader<'a>,
    tabular: Tabular,
}

impl<'a> RecordReader<'a> {
    /// Wrap a decoded stream with a tabular engine
    pub fn new(stream: &'a mut dyn Read, tabular: Tabular) -> Self {
        Self {
            lines: LineReader::new(stream),
            tabular,
        }
    }

    /// The engine, for header inspection
    pub fn tabular(&self) -> &Tabular {
        &self.tabular
    }

    fn next_data_line(&mut self) -> Option<Result<String>> {
        loop {
            match self.lines.next()? {
                Ok(line) if line.trim().is_empty() => continue,
                other => return Some(other),
            }
        }
    }
}

impl Iterator for RecordReader<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.tabular.parses_header_line() {
            let line = match self.next_data_line()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            if let Err(e) = self.tabular.parse_header(&line) {
                return Some(Err(e));
            }
        }
        loop {
            let line = match self.next_data_line()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            match self.tabular.parse_record(&line) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Line-oriented writer appending `\n` to each line
pub struct LineWriter<'a> {
    writer: &'a mut dyn Write,
    lines_written: usize,
}

impl<'a> LineWriter<'a> {
    /// Wrap an encoding stream
    pub fn new(writer: &'a mut dyn Write) -> Self {
        Self {
            writer,
            lines_written: 0,
        }
    }

    /// Write one line
    pub fn write(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.lines_written += 1;
        Ok(())
    }

    /// Number of lines written so far
    pub fn lines_written(&self) -> usize {
        self.lines_written
    }
}

/// Positional row writer
///
/// When columns are known and the format carries a header line, the header
/// is emitted ahead of the first row.
pub struct RowWriter<'a> {
    lines: LineWriter<'a>,
    tabular: Tabular,
    header_written: bool,
}

impl<'a> RowWriter<'a> {
    /// Wrap an encoding stream with a tabular engine
    pub fn new(writer: &'a mut dyn Write, tabular: Tabular) -> Self {
        Self {
            lines: LineWriter::new(writer),
            tabular,
            header_written: false,
        }
    }

    fn write_header_if_needed(&mut self) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        self.header_written = true;
        if self.tabular.header.has_columns() {
            if let Some(line) = self.tabular.render_header()? {
                self.lines.write(&line)?;
            }
        }
        Ok(())
    }

    /// Render and write one row
    pub fn write(&mut self, row: &Row) -> Result<()> {
        self.write_header_if_needed()?;
        let line = self.tabular.render_row(row)?;
        self.lines.write(&line)
    }
}

/// Record writer with header capture
///
/// With explicit columns the header line (for formats that have one) is
/// emitted on construction. Without them, the first record's keys become
/// the column list, the header is emitted, and every subsequent record is
/// rendered strictly against it: extra keys are silently ignored, missing
/// keys render empty.
pub struct RecordWriter<'a> {
    lines: LineWriter<'a>,
    tabular: Tabular,
    header_written: bool,
}

impl<'a> RecordWriter<'a> {
    /// Wrap an encoding stream with a tabular engine
    ///
    /// Emits the header line immediately when the columns are already
    /// known.
    pub fn new(writer: &'a mut dyn Write, tabular: Tabular) -> Result<Self> {
        let mut record_writer = Self {
            lines: LineWriter::new(writer),
            tabular,
            header_written: false,
        };
        if record_writer.tabular.header.has_columns() {
            record_writer.write_header()?;
        }
        Ok(record_writer)
    }

    fn write_header(&mut self) -> Result<()> {
        self.header_written = true;
        if let Some(line) = self.tabular.render_header()? {
            self.lines.write(&line)?;
        }
        Ok(())
    }

    /// Render and write one record
    pub fn write(&mut self, record: &Record) -> Result<()> {
        if !self.tabular.header.has_columns() {
            self.tabular.capture_columns_from(record)?;
        }
        if !self.header_written {
            self.write_header()?;
        }
        let line = self.tabular.render_record(record)?;
        self.lines.write(&line)
    }

    /// The engine, for header inspection
    pub fn tabular(&self) -> &Tabular {
        &self.tabular
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;
    use serde_json::json;

    fn tabular(format: Format) -> Tabular {
        Tabular::new(format, TabularHeader::new(), None).unwrap()
    }

    #[test]
    fn test_line_reader_trims_endings() {
        let mut data: &[u8] = b"one\r\ntwo\nthree";
        let lines: Vec<String> = LineReader::new(&mut data)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_record_reader_csv_consumes_header() {
        let mut data: &[u8] = b"name,zip\nJack,1\n\nJoe,2\n";
        let mut reader = RecordReader::new(&mut data, tabular(Format::Csv));

        let first = reader.next().unwrap().unwrap();
        assert_eq!(first.get("name"), Some(&json!("Jack")));
        let second = reader.next().unwrap().unwrap();
        assert_eq!(second.get("zip"), Some(&json!("2")));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_record_reader_cleanses_header() {
        let mut data: &[u8] = b"First Name,ZIP Code\nJack,10001\n";
        let mut reader = RecordReader::new(&mut data, tabular(Format::Csv));

        let record = reader.next().unwrap().unwrap();
        assert_eq!(record.get("first_name"), Some(&json!("Jack")));
        assert_eq!(record.get("zip_code"), Some(&json!("10001")));
    }

    #[test]
    fn test_row_reader_yields_header_row_too() {
        let mut data: &[u8] = b"name,zip\nJack,1\n";
        let rows: Vec<Row> = RowReader::new(&mut data, tabular(Format::Csv))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![json!("name"), json!("zip")]);
    }

    #[test]
    fn test_record_writer_captures_header_from_first_record() {
        let mut out = Vec::new();
        {
            let mut writer =
                RecordWriter::new(&mut out, tabular(Format::Csv)).unwrap();

            let mut first = Record::new();
            first.insert("name".into(), json!("Jack"));
            first.insert("zip".into(), json!(1));
            writer.write(&first).unwrap();

            let mut second = Record::new();
            second.insert("zip".into(), json!(2));
            second.insert("name".into(), json!("Joe"));
            second.insert("extra".into(), json!(9));
            writer.write(&second).unwrap();
        }
        assert_eq!(String::from_utf8(out).unwrap(), "name,zip\nJack,1\nJoe,2\n");
    }

    #[test]
    fn test_record_writer_explicit_columns_header_up_front() {
        let mut header = TabularHeader::new();
        header
            .set_columns(&["name".to_string(), "zip".to_string()])
            .unwrap();
        let tabular = Tabular::new(Format::Csv, header, None).unwrap();

        let mut out = Vec::new();
        {
            let _writer = RecordWriter::new(&mut out, tabular).unwrap();
            // No records written; the header still lands
        }
        assert_eq!(String::from_utf8(out).unwrap(), "name,zip\n");
    }

    #[test]
    fn test_record_writer_json_has_no_header_line() {
        let mut out = Vec::new();
        {
            let mut writer =
                RecordWriter::new(&mut out, tabular(Format::Json)).unwrap();
            let mut record = Record::new();
            record.insert("name".into(), json!("Jack"));
            writer.write(&record).unwrap();
        }
        assert_eq!(String::from_utf8(out).unwrap(), "{\"name\":\"Jack\"}\n");
    }

    #[test]
    fn test_row_writer_with_known_columns_writes_header() {
        let mut header = TabularHeader::new();
        header
            .set_columns(&["a".to_string(), "b".to_string()])
            .unwrap();
        let tabular = Tabular::new(Format::Psv, header, None).unwrap();

        let mut out = Vec::new();
        {
            let mut writer = RowWriter::new(&mut out, tabular);
            writer.write(&vec![json!(1), json!("x|y")]).unwrap();
        }
        assert_eq!(String::from_utf8(out).unwrap(), "a|b\n1|x:y\n");
    }
}
