//! Tabular render/parse engine
//!
//! One [`Tabular`] instance owns the header state machine for a single
//! reader/writer session and renders/parses lines for the resolved format.
//! It is deliberately line-oriented: the byte pipeline beneath it delivers
//! lines, this layer turns them into rows and records and back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StreamStackError};
use crate::format::Format;
use crate::row::header::TabularHeader;
use crate::types::{Record, Row};

/// One column of a fixed-width layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedColumn {
    /// Column name
    pub name: String,
    /// Width in characters
    pub width: usize,
}

impl FixedColumn {
    /// Create a fixed column
    pub fn new(name: impl Into<String>, width: usize) -> Self {
        Self {
            name: name.into(),
            width,
        }
    }
}

/// Externally supplied layout for the fixed-width format
///
/// The fixed format never infers its layout from data; construction
/// validates the description up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedLayout {
    /// Columns in render order
    pub columns: Vec<FixedColumn>,
    /// Truncate over-wide values instead of failing
    #[serde(default)]
    pub truncate: bool,
}

impl FixedLayout {
    /// Create a layout, validating it
    ///
    /// # Errors
    ///
    /// An empty column list or a zero-width column is an invalid layout.
    pub fn new(columns: Vec<FixedColumn>) -> Result<Self> {
        if columns.is_empty() {
            return Err(StreamStackError::InvalidLayout {
                reason: "layout has no columns".to_string(),
            });
        }
        if let Some(column) = columns.iter().find(|c| c.width == 0) {
            return Err(StreamStackError::InvalidLayout {
                reason: format!("column '{}' has zero width", column.name),
            });
        }
        Ok(Self {
            columns,
            truncate: false,
        })
    }

    /// Enable or disable truncation of over-wide values
    pub fn with_truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }
}

/// Render a JSON value into a single cell
fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse one CSV line into its fields (quote-aware)
pub(crate) fn parse_csv_line(line: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else {
            match c {
                '"' if field.is_empty() => in_quotes = true,
                ',' => fields.push(std::mem::take(&mut field)),
                _ => field.push(c),
            }
        }
    }
    if in_quotes {
        return Err(StreamStackError::TypeMismatch {
            expected: "well-formed CSV",
            actual: "unterminated quoted field".to_string(),
        });
    }
    fields.push(field);
    Ok(fields)
}

/// Render one CSV field, quoting when necessary
fn render_csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        let mut quoted = String::with_capacity(value.len() + 2);
        quoted.push('"');
        for c in value.chars() {
            if c == '"' {
                quoted.push('"');
            }
            quoted.push(c);
        }
        quoted.push('"');
        quoted
    } else {
        value.to_string()
    }
}

/// Render/parse engine plus header state machine for one session
#[derive(Debug, Clone)]
pub struct Tabular {
    /// Header contract for this session
    pub header: TabularHeader,
    format: Format,
    layout: Option<FixedLayout>,
}

impl Tabular {
    /// Create an engine for `format`
    ///
    /// The fixed format requires a layout; its column names become the
    /// header up front. Other formats ignore `layout`.
    pub fn new(format: Format, header: TabularHeader, layout: Option<FixedLayout>) -> Result<Self> {
        let mut tabular = Self {
            header,
            format,
            layout: None,
        };
        if format == Format::Fixed {
            let layout = layout.ok_or_else(|| StreamStackError::InvalidLayout {
                reason: "fixed format requires a layout".to_string(),
            })?;
            let names: Vec<String> = layout.columns.iter().map(|c| c.name.clone()).collect();
            tabular.header.set_columns_verbatim(&names)?;
            tabular.layout = Some(layout);
        }
        Ok(tabular)
    }

    /// The session's format
    pub fn format(&self) -> Format {
        self.format
    }

    /// Whether a header line precedes the data rows on write
    pub fn renders_header_line(&self) -> bool {
        self.format.renders_header_line()
    }

    /// Whether the first line is consumed as a header on read when columns
    /// are unknown
    pub fn parses_header_line(&self) -> bool {
        self.format.parses_header_line() && !self.header.has_columns()
    }

    /// Parse a header line and fix the columns
    pub fn parse_header(&mut self, line: &str) -> Result<()> {
        let raw = match self.format {
            Format::Csv => parse_csv_line(line)?,
            Format::Psv => line.split('|').map(str::to_string).collect(),
            _ => {
                return Err(StreamStackError::InvalidHeader {
                    reason: format!("format '{}' has no header line", self.format),
                })
            }
        };
        self.header.set_columns(&raw)
    }

    /// Capture columns from the keys of the first written record
    pub fn capture_columns_from(&mut self, record: &Record) -> Result<()> {
        let keys: Vec<String> = record.keys().cloned().collect();
        self.header.set_columns_verbatim(&keys)
    }

    /// Render the header line, if this format has one
    pub fn render_header(&self) -> Result<Option<String>> {
        if !self.renders_header_line() {
            return Ok(None);
        }
        let names = self.header.column_names().ok_or_else(|| {
            StreamStackError::InvalidHeader {
                reason: "columns are not known yet".to_string(),
            }
        })?;
        let line = match self.format {
            Format::Csv => names
                .iter()
                .map(|n| render_csv_field(n))
                .collect::<Vec<_>>()
                .join(","),
            Format::Psv => names.join("|"),
            Format::Fixed => {
                let values: Vec<Value> = names
                    .iter()
                    .map(|n| Value::String(n.to_string()))
                    .collect();
                // Column names wider than their column are always clipped
                self.render_fixed(&values, true)?
            }
            _ => return Ok(None),
        };
        Ok(Some(line))
    }

    /// Render a record against the fixed column list
    ///
    /// Extra keys are silently ignored; missing keys render empty.
    pub fn render_record(&self, record: &Record) -> Result<String> {
        let slots = self.header.slots().ok_or_else(|| {
            StreamStackError::InvalidHeader {
                reason: "columns are not known yet".to_string(),
            }
        })?;

        match self.format {
            Format::Csv | Format::Psv | Format::Fixed => {
                let values: Vec<Value> = slots
                    .iter()
                    .filter_map(|slot| slot.as_deref())
                    .map(|name| record.get(name).cloned().unwrap_or(Value::Null))
                    .collect();
                self.render_row_known(&values)
            }
            Format::Json | Format::Hash => {
                let mut object = Record::new();
                for name in slots.iter().filter_map(|slot| slot.as_deref()) {
                    object.insert(
                        name.to_string(),
                        record.get(name).cloned().unwrap_or(Value::Null),
                    );
                }
                Ok(serde_json::to_string(&Value::Object(object))?)
            }
            Format::Array => {
                let values: Vec<Value> = slots
                    .iter()
                    .filter_map(|slot| slot.as_deref())
                    .map(|name| record.get(name).cloned().unwrap_or(Value::Null))
                    .collect();
                Ok(serde_json::to_string(&Value::Array(values))?)
            }
        }
    }

    /// Render a positional row
    pub fn render_row(&self, row: &Row) -> Result<String> {
        self.render_row_known(row)
    }

    fn render_row_known(&self, values: &[Value]) -> Result<String> {
        match self.format {
            Format::Csv => Ok(values
                .iter()
                .map(|v| render_csv_field(&value_to_string(v)))
                .collect::<Vec<_>>()
                .join(",")),
            Format::Psv => Ok(values
                .iter()
                .map(|v| value_to_string(v).replace('|', ":"))
                .collect::<Vec<_>>()
                .join("|")),
            Format::Json | Format::Hash => match self.header.column_names() {
                Some(names) => {
                    let mut object = Record::new();
                    for (name, value) in names.iter().zip(values.iter()) {
                        object.insert(name.to_string(), value.clone());
                    }
                    Ok(serde_json::to_string(&Value::Object(object))?)
                }
                None => Ok(serde_json::to_string(&Value::Array(values.to_vec()))?),
            },
            Format::Array => Ok(serde_json::to_string(&Value::Array(values.to_vec()))?),
            Format::Fixed => self.render_fixed(values, false),
        }
    }

    fn render_fixed(&self, values: &[Value], clip: bool) -> Result<String> {
        let layout = self.layout.as_ref().ok_or_else(|| {
            StreamStackError::InvalidLayout {
                reason: "fixed format requires a layout".to_string(),
            }
        })?;
        let mut line = String::new();
        for (index, column) in layout.columns.iter().enumerate() {
            let value = values.get(index).cloned().unwrap_or(Value::Null);
            let text = value_to_string(&value);
            let length = text.chars().count();
            if length > column.width {
                if !(clip || layout.truncate) {
                    return Err(StreamStackError::ValueTooLong {
                        column: column.name.clone(),
                        width: column.width,
                        actual: length,
                    });
                }
                line.extend(text.chars().take(column.width));
            } else {
                line.push_str(&text);
                for _ in length..column.width {
                    line.push(' ');
                }
            }
        }
        Ok(line)
    }

    /// Parse one line into a positional row
    pub fn parse_row(&mut self, line: &str) -> Result<Row> {
        match self.format {
            Format::Csv => Ok(parse_csv_line(line)?
                .into_iter()
                .map(Value::String)
                .collect()),
            Format::Psv => Ok(line
                .split('|')
                .map(|s| Value::String(s.to_string()))
                .collect()),
            Format::Array => match serde_json::from_str::<Value>(line)? {
                Value::Array(values) => Ok(values),
                other => Err(StreamStackError::TypeMismatch {
                    expected: "JSON array",
                    actual: shape_of(&other).to_string(),
                }),
            },
            Format::Json | Format::Hash => match serde_json::from_str::<Value>(line)? {
                Value::Object(object) => {
                    if !self.header.has_columns() {
                        let keys: Vec<String> = object.keys().cloned().collect();
                        self.header.set_columns_verbatim(&keys)?;
                    }
                    let slots = self.header.slots().unwrap_or(&[]);
                    Ok(slots
                        .iter()
                        .filter_map(|slot| slot.as_deref())
                        .map(|name| object.get(name).cloned().unwrap_or(Value::Null))
                        .collect())
                }
                other => Err(StreamStackError::TypeMismatch {
                    expected: "JSON object",
                    actual: shape_of(&other).to_string(),
                }),
            },
            Format::Fixed => self.parse_fixed(line),
        }
    }

    /// Parse one line into a record
    ///
    /// Returns `None` when the line was consumed as a header (the first
    /// array of the array format). CSV/PSV header consumption is driven by
    /// the reader via [`Tabular::parse_header`].
    pub fn parse_record(&mut self, line: &str) -> Result<Option<Record>> {
        match self.format {
            Format::Json | Format::Hash => match serde_json::from_str::<Value>(line)? {
                Value::Object(object) => {
                    if !self.header.has_columns() {
                        let keys: Vec<String> = object.keys().cloned().collect();
                        self.header.set_columns_verbatim(&keys)?;
                    }
                    let slots = self.header.slots().unwrap_or(&[]);
                    let mut record = Record::new();
                    for name in slots.iter().filter_map(|slot| slot.as_deref()) {
                        record.insert(
                            name.to_string(),
                            object.get(name).cloned().unwrap_or(Value::Null),
                        );
                    }
                    Ok(Some(record))
                }
                other => Err(StreamStackError::TypeMismatch {
                    expected: "JSON object",
                    actual: shape_of(&other).to_string(),
                }),
            },
            Format::Array => {
                if !self.header.has_columns() {
                    match serde_json::from_str::<Value>(line)? {
                        Value::Array(values) => {
                            let raw: Vec<String> =
                                values.iter().map(value_to_string).collect();
                            self.header.set_columns(&raw)?;
                            return Ok(None);
                        }
                        other => {
                            return Err(StreamStackError::TypeMismatch {
                                expected: "JSON array",
                                actual: shape_of(&other).to_string(),
                            })
                        }
                    }
                }
                let row = self.parse_row(line)?;
                Ok(Some(self.zip_record(row)))
            }
            _ => {
                let row = self.parse_row(line)?;
                Ok(Some(self.zip_record(row)))
            }
        }
    }

    fn zip_record(&self, row: Row) -> Record {
        let mut record = Record::new();
        if let Some(slots) = self.header.slots() {
            for (slot, value) in slots.iter().zip(row.into_iter()) {
                if let Some(name) = slot {
                    record.insert(name.clone(), value);
                }
            }
        }
        record
    }

    fn parse_fixed(&self, line: &str) -> Result<Row> {
        let layout = self.layout.as_ref().ok_or_else(|| {
            StreamStackError::InvalidLayout {
                reason: "fixed format requires a layout".to_string(),
            }
        })?;
        let mut chars = line.chars();
        let mut row = Vec::with_capacity(layout.columns.len());
        for column in &layout.columns {
            let cell: String = chars.by_ref().take(column.width).collect();
            row.push(Value::String(cell.trim_end().to_string()));
        }
        Ok(row)
    }
}

fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
