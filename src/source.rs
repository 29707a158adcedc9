//! Input endpoints producing the root byte stream
//!
//! A `Source` is where the raw (outermost-encoded) bytes come from before
//! any stage runs. Local files use smart I/O selection: files at or above
//! [`MMAP_THRESHOLD`] are memory-mapped, smaller files go through ordinary
//! buffered reads where mapping overhead dominates.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::Result;
use crate::stages::BoxedReader;

/// Memory-mapped file threshold (50 MB)
///
/// Below this size the cost of establishing the mapping outweighs the
/// benefit of page-cache readahead.
pub const MMAP_THRESHOLD: u64 = 50 * 1024 * 1024;

/// Input endpoint for the root byte stream
#[derive(Debug, Clone)]
pub enum Source {
    /// Local file path
    Path(PathBuf),

    /// Standard input
    Stdin,
}

impl Source {
    /// Create a local file source
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Source::Path(path.as_ref().to_path_buf())
    }

    /// Create a stdin source
    pub fn stdin() -> Self {
        Source::Stdin
    }

    /// Open the source and return the root byte stream
    pub fn open(&self) -> Result<BoxedReader> {
        match self {
            Source::Path(path) => open_local_file(path),
            Source::Stdin => Ok(Box::new(std::io::stdin())),
        }
    }
}

/// Open a local file with threshold-based I/O method selection
fn open_local_file(path: &Path) -> Result<BoxedReader> {
    let metadata = std::fs::metadata(path)?;
    if metadata.len() >= MMAP_THRESHOLD {
        open_mmap_file(path)
    } else {
        let file = File::open(path)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Open file with memory mapping and sequential-access hints where the
/// platform supports them
#[cfg(target_os = "macos")]
fn open_mmap_file(path: &Path) -> Result<BoxedReader> {
    use libc::{madvise, MADV_SEQUENTIAL, MADV_WILLNEED};

    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };

    unsafe {
        madvise(
            mmap.as_ptr() as *mut _,
            mmap.len(),
            MADV_SEQUENTIAL | MADV_WILLNEED,
        );
    }

    Ok(Box::new(std::io::Cursor::new(mmap)))
}

#[cfg(not(target_os = "macos"))]
fn open_mmap_file(path: &Path) -> Result<BoxedReader> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(Box::new(std::io::Cursor::new(mmap)))
}
