//! Pass-through stage
//!
//! Registered under `none` in every registry and not removable. Reads and
//! writes raw bytes with no transformation; used to explicitly disable
//! extension inference for a resource whose name would otherwise match.

use crate::error::Result;
use crate::stages::{BoxedReader, BoxedWriter, ReaderStage, WriterStage};
use crate::types::StageOptions;

/// Read-direction pass-through
pub struct NoneReaderStage;

impl ReaderStage for NoneReaderStage {
    fn open(&self, inner: BoxedReader, _options: &StageOptions) -> Result<BoxedReader> {
        Ok(inner)
    }
}

/// Write-direction pass-through
pub struct NoneWriterStage;

impl WriterStage for NoneWriterStage {
    fn open(&self, inner: BoxedWriter, _options: &StageOptions) -> Result<BoxedWriter> {
        Ok(inner)
    }
}
