//! Stage implementations and the stage capability interface
//!
//! A stage is one named, pluggable transform (compression, encryption,
//! pass-through) applicable to a byte stream. Stages are registered against
//! symbolic names in a [`Registry`](crate::registry::Registry) and looked up
//! during pipeline resolution; the executor only ever talks to the two
//! traits defined here.
//!
//! # Contract
//!
//! A stage factory wraps the stream it is given and returns the decorated
//! stream. The decorated stream **owns** the wrapped one, so dropping the
//! outermost handle tears the whole chain down in reverse order of
//! construction. Writer stages additionally implement [`StageWrite::finish`]
//! which finalizes the stage (e.g. writes the gzip trailer) and then
//! finishes the wrapped stream; on error paths where `finish` is never
//! called, `Drop` implementations perform best-effort finalization.

use std::io::{Read, Write};

use crate::error::Result;
use crate::types::StageOptions;

mod bz2;
mod enc;
mod gz;
mod none;
mod pgp;
mod zip;

pub use self::bz2::{Bz2ReaderStage, Bz2WriterStage};
pub use self::enc::{EncReaderStage, EncWriterStage};
pub use self::gz::{GzReaderStage, GzWriterStage};
pub use self::none::{NoneReaderStage, NoneWriterStage};
pub use self::pgp::{PgpReaderStage, PgpWriterStage};
pub use self::zip::{ZipReaderStage, ZipWriterStage};

/// A boxed read-direction stream, as passed between stages
pub type BoxedReader = Box<dyn Read + Send>;

/// A boxed write-direction stream, as passed between stages
pub type BoxedWriter = Box<dyn StageWrite>;

/// A writable stream that can be finalized
///
/// `finish` consumes the stream, flushes and finalizes this stage (trailer
/// bytes, archive directory, subprocess drain), and then finishes the
/// stream it wraps. Callers should always `finish` explicitly rather than
/// relying on `Drop`, as `finish` can return errors that need handling.
pub trait StageWrite: Write + Send {
    /// Finalize this stage, then finish the wrapped stream
    fn finish(self: Box<Self>) -> Result<()>;
}

impl StageWrite for Box<dyn StageWrite> {
    fn finish(self: Box<Self>) -> Result<()> {
        (*self).finish()
    }
}

/// Factory for a read-direction stage
pub trait ReaderStage: Send + Sync {
    /// Wrap `inner` in this stage's decoding stream
    ///
    /// The returned stream owns `inner` and must release it on drop.
    fn open(&self, inner: BoxedReader, options: &StageOptions) -> Result<BoxedReader>;
}

/// Factory for a write-direction stage
pub trait WriterStage: Send + Sync {
    /// Wrap `inner` in this stage's encoding stream
    ///
    /// The returned stream owns `inner`; its [`StageWrite::finish`] must
    /// finalize this stage before finishing `inner`.
    fn open(&self, inner: BoxedWriter, options: &StageOptions) -> Result<BoxedWriter>;
}

/// Adapter turning any plain [`Write`] into a [`StageWrite`]
///
/// Used for externally supplied writers that have no finalization step of
/// their own beyond a flush.
pub struct PlainWriter<W: Write + Send> {
    inner: W,
}

impl<W: Write + Send> PlainWriter<W> {
    /// Wrap a plain writer
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write + Send> Write for PlainWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + Send> StageWrite for PlainWriter<W> {
    fn finish(mut self: Box<Self>) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}
