//! Stage executor: build the nested stream chain, drive the user closure,
//! guarantee teardown
//!
//! For both directions the executor folds over the pipeline from the last
//! element (closest to the raw bytes) toward the first, wrapping the root
//! stream stage by stage; the first element's stream is handed to the user
//! closure. Because every stage stream owns the stream it wraps, dropping
//! the outermost handle tears the chain down last-constructed first —
//! standard nested-resource teardown — on every exit path.
//!
//! Writer chains additionally carry an explicit finish chain: on the
//! success path the outermost stream's [`StageWrite::finish`] finalizes
//! itself and then finishes the stream it wraps, recursively down to the
//! sink. On the error path the chain is dropped instead; stages finalize
//! best-effort in `Drop` and the original error propagates unmasked.
//!
//! An empty pipeline short-circuits: the user closure receives the root
//! stream itself, unwrapped and unboxed. This is what lets externally
//! supplied streams pass through untouched.

use std::io::{Read, Write};

use log::trace;

use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::registry::Registry;
use crate::stages::{BoxedReader, BoxedWriter, StageWrite};

/// Build the read-direction chain around `root` and drive `block`
///
/// Stages are opened innermost (closest to `root`) first; no stage begins
/// processing before the stage beneath it has opened. If a stage's `open`
/// fails mid-chain, the stages already opened beneath it are torn down by
/// drop before the error returns.
///
/// # Example
///
/// ```
/// use std::io::Read;
/// use streamstack::pipeline::{execute_reader, PipelineBuilder};
/// use streamstack::registry::Registry;
///
/// let registry = Registry::with_builtins();
/// let pipeline = PipelineBuilder::with_resource("a.txt").resolve(&registry).unwrap();
///
/// let text = execute_reader(&registry, &pipeline, "hello".as_bytes(), |reader| {
///     let mut out = String::new();
///     reader.read_to_string(&mut out)?;
///     Ok(out)
/// }).unwrap();
/// assert_eq!(text, "hello");
/// ```
pub fn execute_reader<R, T>(
    registry: &Registry,
    pipeline: &Pipeline,
    root: R,
    block: impl FnOnce(&mut dyn Read) -> Result<T>,
) -> Result<T>
where
    R: Read + Send + 'static,
{
    if pipeline.is_empty() {
        let mut root = root;
        return block(&mut root);
    }

    let mut stream: BoxedReader = Box::new(root);
    for spec in pipeline.iter().rev() {
        trace!("opening read stage '{}'", spec.name);
        let stage = registry.lookup_reader(&spec.name)?;
        stream = stage.open(stream, &spec.options)?;
    }
    block(&mut stream)
}

/// Build the write-direction chain around `root` and drive `block`
///
/// On success the chain is finished outermost-first, flushing each stage's
/// trailer into the stage beneath it before that one finalizes in turn.
/// When `block` returns an error, the chain is dropped without finishing
/// and the error propagates; sinks with compensating cleanup (e.g.
/// partial-file removal) observe the missing finish in their `Drop`.
pub fn execute_writer<W, T>(
    registry: &Registry,
    pipeline: &Pipeline,
    root: W,
    block: impl FnOnce(&mut dyn Write) -> Result<T>,
) -> Result<T>
where
    W: StageWrite + 'static,
{
    if pipeline.is_empty() {
        let mut root = root;
        let value = block(&mut root)?;
        Box::new(root).finish()?;
        return Ok(value);
    }

    let mut stream: BoxedWriter = Box::new(root);
    for spec in pipeline.iter().rev() {
        trace!("opening write stage '{}'", spec.name);
        let stage = registry.lookup_writer(&spec.name)?;
        stream = stage.open(stream, &spec.options)?;
    }
    let value = block(&mut stream)?;
    stream.finish()?;
    Ok(value)
}
