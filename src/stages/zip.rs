//! zip archive stage (`zip`)
//!
//! Zip archives need random access (the central directory lives at the end
//! of the file), so neither direction can operate purely in-stream. Both
//! materialize through anonymous temporary files scoped to the stage: the
//! files are unlinked by the OS when the stage closes, on every exit path.
//!
//! Options:
//! - `entry`: archive member name. Reading defaults to the first file
//!   entry; writing defaults to `data`.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};

use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::{Result, StreamStackError};
use crate::stages::{BoxedReader, BoxedWriter, ReaderStage, StageWrite, WriterStage};
use crate::types::StageOptions;

const DEFAULT_ENTRY: &str = "data";

fn zip_error(err: zip::result::ZipError) -> StreamStackError {
    StreamStackError::Compression(format!("zip: {err}"))
}

/// zip extraction stage
///
/// Copies the wrapped stream to a temporary file, opens the archive, and
/// extracts the selected entry to a second temporary file which backs the
/// returned reader. Memory stays constant; disk usage is bounded by the
/// archive plus the extracted entry.
pub struct ZipReaderStage;

impl ReaderStage for ZipReaderStage {
    fn open(&self, mut inner: BoxedReader, options: &StageOptions) -> Result<BoxedReader> {
        let mut archive_file = tempfile::tempfile()?;
        io::copy(&mut inner, &mut archive_file)?;
        archive_file.seek(SeekFrom::Start(0))?;
        drop(inner);

        let mut archive = ZipArchive::new(archive_file).map_err(zip_error)?;
        let wanted = options.str("entry").map(str::to_string);

        let mut index = None;
        for i in 0..archive.len() {
            let entry = archive.by_index(i).map_err(zip_error)?;
            let matches = match &wanted {
                Some(name) => entry.name() == name,
                None => entry.is_file(),
            };
            if matches {
                index = Some(i);
                break;
            }
        }
        let Some(index) = index else {
            return Err(StreamStackError::Compression(match wanted {
                Some(name) => format!("zip: no entry named '{name}'"),
                None => "zip: archive contains no file entries".to_string(),
            }));
        };

        let mut extracted = tempfile::tempfile()?;
        {
            let mut entry = archive.by_index(index).map_err(zip_error)?;
            io::copy(&mut entry, &mut extracted)?;
        }
        extracted.seek(SeekFrom::Start(0))?;
        Ok(Box::new(extracted))
    }
}

/// zip creation stage
///
/// Builds the archive in a temporary file (the writer needs to seek back
/// to patch entry sizes), then streams it into the wrapped stream on
/// finish.
pub struct ZipWriterStage;

impl WriterStage for ZipWriterStage {
    fn open(&self, inner: BoxedWriter, options: &StageOptions) -> Result<BoxedWriter> {
        let entry = options.str("entry").unwrap_or(DEFAULT_ENTRY);
        let mut writer = ZipWriter::new(tempfile::tempfile()?);
        writer
            .start_file(entry, FileOptions::default())
            .map_err(zip_error)?;
        Ok(Box::new(ZipWriteStream {
            writer: Some(writer),
            inner: Some(inner),
        }))
    }
}

struct ZipWriteStream {
    writer: Option<ZipWriter<File>>,
    inner: Option<BoxedWriter>,
}

impl Write for ZipWriteStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.writer {
            Some(writer) => writer.write(buf),
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                "write to finished zip stream",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.writer {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl StageWrite for ZipWriteStream {
    fn finish(mut self: Box<Self>) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        let Some(mut inner) = self.inner.take() else {
            return Ok(());
        };
        let mut archive_file = writer.finish().map_err(zip_error)?;
        archive_file.seek(SeekFrom::Start(0))?;
        io::copy(&mut archive_file, &mut inner)?;
        inner.finish()
    }
}
