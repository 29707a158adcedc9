//! Caller-facing stream facade
//!
//! A [`Stream`] ties a resource (path, stdin/stdout) to its pipeline
//! configuration and exposes closure-scoped entry points at three levels:
//! raw bytes, lines, and rows/records. The closure receives the fully
//! assembled stream; when it returns — normally or with an error — every
//! stage is torn down before the call returns.
//!
//! # Examples
//!
//! Read a gzipped CSV without caring that it is gzipped:
//!
//! ```no_run
//! use streamstack::Stream;
//!
//! # fn main() -> streamstack::Result<()> {
//! let total = Stream::path("sales.csv.gz").record_reader(|records| {
//!     let mut count = 0;
//!     for record in records {
//!         let _record = record?;
//!         count += 1;
//!     }
//!     Ok(count)
//! })?;
//! println!("{total} records");
//! # Ok(())
//! # }
//! ```
//!
//! Write an encrypted, gzipped file with an explicit stage option:
//!
//! ```no_run
//! use streamstack::{Stream, StageOptions};
//! use std::io::Write;
//!
//! # fn main() -> streamstack::Result<()> {
//! Stream::path("report.txt.gz.enc")
//!     .option("enc", StageOptions::new().set("passphrase", "secret"))?
//!     .writer(|w| {
//!         w.write_all(b"quarterly numbers\n")?;
//!         Ok(())
//!     })?;
//! # Ok(())
//! # }
//! ```

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, StreamStackError};
use crate::format::{resolve_format, Format};
use crate::pipeline::{executor, PipelineBuilder};
use crate::registry::Registry;
use crate::row::{
    FixedLayout, LineReader, LineWriter, RecordReader, RecordWriter, RowReader, RowWriter,
    Tabular, TabularHeader,
};
use crate::sink::Sink;
use crate::source::Source;
use crate::types::StageOptions;

#[derive(Debug, Clone)]
enum Resource {
    Path(std::path::PathBuf),
    Stdin,
    Stdout,
}

/// A resource plus its pipeline and tabular configuration
///
/// Construction never touches the filesystem; streams are opened lazily
/// inside the `reader`/`writer` family of calls and closed before they
/// return.
pub struct Stream {
    resource: Resource,
    builder: PipelineBuilder,
    format: Option<Format>,
    columns: Option<Vec<String>>,
    allowed_columns: Option<Vec<String>>,
    required_columns: Option<Vec<String>>,
    skip_unknown: bool,
    layout: Option<FixedLayout>,
    registry: Option<Arc<Registry>>,
}

impl Stream {
    /// Stream over a local file path
    ///
    /// The file name seeds extension inference.
    pub fn path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let builder = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => PipelineBuilder::with_resource(name),
            None => PipelineBuilder::new(),
        };
        Self::with_resource(Resource::Path(path), builder)
    }

    /// Stream over standard input
    ///
    /// No name, so no inference; use [`Stream::file_name`] or
    /// [`Stream::stream`] to apply stages.
    pub fn stdin() -> Self {
        Self::with_resource(Resource::Stdin, PipelineBuilder::new())
    }

    /// Stream over standard output
    pub fn stdout() -> Self {
        Self::with_resource(Resource::Stdout, PipelineBuilder::new())
    }

    fn with_resource(resource: Resource, builder: PipelineBuilder) -> Self {
        Self {
            resource,
            builder,
            format: None,
            columns: None,
            allowed_columns: None,
            required_columns: None,
            skip_unknown: false,
            layout: None,
            registry: None,
        }
    }

    /// Override the name used for extension and format inference
    ///
    /// Useful when the actual resource name carries no extensions, e.g.
    /// stdin or an upload with an opaque temporary name.
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.builder.set_resource(name);
        self
    }

    /// Use an injected registry instead of the process-wide default
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Add an explicit stage, disabling extension inference
    pub fn stream(mut self, name: &str, options: StageOptions) -> Result<Self> {
        self.builder.stream(name, options)?;
        Ok(self)
    }

    /// Attach options to a stage, applied if it is in the final pipeline
    pub fn option(mut self, name: &str, options: StageOptions) -> Result<Self> {
        self.builder.option(name, options)?;
        Ok(self)
    }

    /// Set the tabular format explicitly (wins over name inference)
    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Set the tabular format from a string, validating it
    pub fn format_str(self, format: &str) -> Result<Self> {
        Ok(self.format(format.parse()?))
    }

    /// Supply the column list up front
    pub fn columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Restrict retained columns to this set
    pub fn allowed_columns(mut self, allowed: Vec<String>) -> Self {
        self.allowed_columns = Some(allowed);
        self
    }

    /// Require these columns after cleansing
    pub fn required_columns(mut self, required: Vec<String>) -> Self {
        self.required_columns = Some(required);
        self
    }

    /// Null out unknown columns instead of failing on them
    pub fn skip_unknown(mut self, skip_unknown: bool) -> Self {
        self.skip_unknown = skip_unknown;
        self
    }

    /// Supply the fixed-width layout
    pub fn layout(mut self, layout: FixedLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    fn registry_ref(&self) -> &Registry {
        match &self.registry {
            Some(registry) => registry,
            None => Registry::global(),
        }
    }

    fn source(&self) -> Result<Source> {
        match &self.resource {
            Resource::Path(path) => Ok(Source::from_path(path)),
            Resource::Stdin => Ok(Source::stdin()),
            Resource::Stdout => Err(StreamStackError::Configuration(
                "stdout is not readable".to_string(),
            )),
        }
    }

    fn sink(&self) -> Result<Sink> {
        match &self.resource {
            Resource::Path(path) => Ok(Sink::from_path(path)),
            Resource::Stdout => Ok(Sink::stdout()),
            Resource::Stdin => Err(StreamStackError::Configuration(
                "stdin is not writable".to_string(),
            )),
        }
    }

    fn tabular(&self) -> Result<Tabular> {
        let registry = self.registry_ref();
        let format = resolve_format(self.format, self.builder.resource_name(), registry)
            .unwrap_or(Format::Csv);

        let mut header = TabularHeader::new().with_skip_unknown(self.skip_unknown);
        if let Some(allowed) = &self.allowed_columns {
            header = header.with_allowed_columns(allowed.clone());
        }
        if let Some(required) = &self.required_columns {
            header = header.with_required_columns(required.clone());
        }
        let mut tabular = Tabular::new(format, header, self.layout.clone())?;
        if let Some(columns) = &self.columns {
            if format != Format::Fixed {
                tabular.header.set_columns(columns)?;
            }
        }
        Ok(tabular)
    }

    /// Open the decoded byte stream and drive `block`
    pub fn reader<T>(&self, block: impl FnOnce(&mut dyn Read) -> Result<T>) -> Result<T> {
        let registry = self.registry_ref();
        let pipeline = self.builder.resolve(registry)?;
        let root = self.source()?.open()?;
        executor::execute_reader(registry, &pipeline, root, block)
    }

    /// Read the entire decoded stream into memory
    ///
    /// Convenience for small resources; large ones should stream through
    /// [`Stream::reader`].
    pub fn read(&self) -> Result<Vec<u8>> {
        self.reader(|reader| {
            let mut data = Vec::new();
            reader.read_to_end(&mut data)?;
            Ok(data)
        })
    }

    /// Iterate decoded lines
    pub fn line_reader<T>(
        &self,
        block: impl FnOnce(&mut LineReader<'_>) -> Result<T>,
    ) -> Result<T> {
        self.reader(|reader| block(&mut LineReader::new(reader)))
    }

    /// Iterate positional rows
    pub fn row_reader<T>(&self, block: impl FnOnce(&mut RowReader<'_>) -> Result<T>) -> Result<T> {
        let tabular = self.tabular()?;
        self.reader(move |reader| block(&mut RowReader::new(reader, tabular)))
    }

    /// Iterate records, consuming the header where the format has one
    pub fn record_reader<T>(
        &self,
        block: impl FnOnce(&mut RecordReader<'_>) -> Result<T>,
    ) -> Result<T> {
        let tabular = self.tabular()?;
        self.reader(move |reader| block(&mut RecordReader::new(reader, tabular)))
    }

    /// Open the encoding byte stream and drive `block`
    ///
    /// On success every stage is finished innermost-last; when `block`
    /// errors, teardown still runs and the error propagates.
    pub fn writer<T>(&self, block: impl FnOnce(&mut dyn Write) -> Result<T>) -> Result<T> {
        let registry = self.registry_ref();
        let pipeline = self.builder.resolve(registry)?;
        let root = self.sink()?.open()?;
        executor::execute_writer(registry, &pipeline, root, block)
    }

    /// Write one blob through the pipeline
    pub fn write(&self, data: &[u8]) -> Result<()> {
        self.writer(|writer| {
            writer.write_all(data)?;
            Ok(())
        })
    }

    /// Write lines
    pub fn line_writer<T>(
        &self,
        block: impl FnOnce(&mut LineWriter<'_>) -> Result<T>,
    ) -> Result<T> {
        self.writer(|writer| block(&mut LineWriter::new(writer)))
    }

    /// Write positional rows
    pub fn row_writer<T>(&self, block: impl FnOnce(&mut RowWriter<'_>) -> Result<T>) -> Result<T> {
        let tabular = self.tabular()?;
        self.writer(move |writer| block(&mut RowWriter::new(writer, tabular)))
    }

    /// Write records, capturing the header from the first one if columns
    /// were not supplied
    pub fn record_writer<T>(
        &self,
        block: impl FnOnce(&mut RecordWriter<'_>) -> Result<T>,
    ) -> Result<T> {
        let tabular = self.tabular()?;
        self.writer(move |writer| {
            let mut record_writer = RecordWriter::new(writer, tabular)?;
            block(&mut record_writer)
        })
    }
}
