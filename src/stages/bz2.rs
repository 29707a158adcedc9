//! bzip2 stage (`bz2`)
//!
//! Mirror of the gzip stage over the bzip2 codec.

use std::io::{self, Write};

use bzip2::read::MultiBzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;

use crate::error::{Result, StreamStackError};
use crate::stages::{BoxedReader, BoxedWriter, ReaderStage, StageWrite, WriterStage};
use crate::types::StageOptions;

/// bzip2 decoding stage
pub struct Bz2ReaderStage;

impl ReaderStage for Bz2ReaderStage {
    fn open(&self, inner: BoxedReader, _options: &StageOptions) -> Result<BoxedReader> {
        Ok(Box::new(MultiBzDecoder::new(inner)))
    }
}

/// bzip2 encoding stage
pub struct Bz2WriterStage;

impl WriterStage for Bz2WriterStage {
    fn open(&self, inner: BoxedWriter, options: &StageOptions) -> Result<BoxedWriter> {
        let level = match options.u64("level") {
            Some(level) if (1..=9).contains(&level) => Compression::new(level as u32),
            Some(level) => {
                return Err(StreamStackError::Configuration(format!(
                    "bz2 level must be 1-9, got {level}"
                )))
            }
            None => Compression::default(),
        };
        Ok(Box::new(Bz2WriteStream {
            encoder: Some(BzEncoder::new(inner, level)),
        }))
    }
}

struct Bz2WriteStream {
    encoder: Option<BzEncoder<BoxedWriter>>,
}

impl Write for Bz2WriteStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.encoder {
            Some(encoder) => encoder.write(buf),
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                "write to finished bz2 stream",
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

impl StageWrite for Bz2WriteStream {
    fn finish(mut self: Box<Self>) -> Result<()> {
        if let Some(encoder) = self.encoder.take() {
            let inner = encoder.finish()?;
            inner.finish()?;
        }
        Ok(())
    }
}

impl Drop for Bz2WriteStream {
    fn drop(&mut self) {
        if let Some(encoder) = &mut self.encoder {
            let _ = encoder.try_finish();
        }
    }
}
