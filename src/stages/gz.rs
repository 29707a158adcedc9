//! gzip stage (`gz`, alias `gzip`)
//!
//! Decoding handles multi-member gzip streams. Encoding takes an optional
//! `level` option (0-9, default 6); `finish` writes the gzip trailer before
//! finishing the wrapped stream, and the trailer is written best-effort on
//! abandoned (dropped) writers.

use std::io::{self, Write};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Result, StreamStackError};
use crate::stages::{BoxedReader, BoxedWriter, ReaderStage, StageWrite, WriterStage};
use crate::types::StageOptions;

/// gzip decoding stage
pub struct GzReaderStage;

impl ReaderStage for GzReaderStage {
    fn open(&self, inner: BoxedReader, _options: &StageOptions) -> Result<BoxedReader> {
        Ok(Box::new(MultiGzDecoder::new(inner)))
    }
}

/// gzip encoding stage
pub struct GzWriterStage;

impl WriterStage for GzWriterStage {
    fn open(&self, inner: BoxedWriter, options: &StageOptions) -> Result<BoxedWriter> {
        let level = match options.u64("level") {
            Some(level) if level <= 9 => Compression::new(level as u32),
            Some(level) => {
                return Err(StreamStackError::Configuration(format!(
                    "gz level must be 0-9, got {level}"
                )))
            }
            None => Compression::default(),
        };
        Ok(Box::new(GzWriteStream {
            encoder: Some(GzEncoder::new(inner, level)),
        }))
    }
}

struct GzWriteStream {
    encoder: Option<GzEncoder<BoxedWriter>>,
}

impl Write for GzWriteStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.encoder {
            Some(encoder) => encoder.write(buf),
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                "write to finished gz stream",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.encoder {
            Some(encoder) => encoder.flush(),
            None => Ok(()),
        }
    }
}

impl StageWrite for GzWriteStream {
    fn finish(mut self: Box<Self>) -> Result<()> {
        if let Some(encoder) = self.encoder.take() {
            let inner = encoder.finish()?;
            inner.finish()?;
        }
        Ok(())
    }
}

impl Drop for GzWriteStream {
    fn drop(&mut self) {
        if let Some(encoder) = &mut self.encoder {
            let _ = encoder.try_finish();
        }
    }
}
