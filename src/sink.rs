//! Output endpoints consuming the root byte stream
//!
//! A `Sink` is where the raw (outermost-encoded) bytes land after the last
//! stage. The local-path sink performs compensating cleanup: when the
//! writer chain is dropped without `finish` (an error aborted the write),
//! the partially written file is removed so no truncated artifact is left
//! behind.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::stages::{BoxedWriter, PlainWriter, StageWrite};

/// Output endpoint for the root byte stream
#[derive(Debug, Clone)]
pub enum Sink {
    /// Write to a local file path
    Path(PathBuf),

    /// Write to standard output
    Stdout,
}

impl Sink {
    /// Create a sink from a file path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Sink::Path(path.as_ref().to_path_buf())
    }

    /// Create a sink for standard output
    pub fn stdout() -> Self {
        Sink::Stdout
    }

    /// Open the sink and return the root write stream
    pub fn open(&self) -> Result<BoxedWriter> {
        match self {
            Sink::Path(path) => {
                let file = File::create(path)?;
                Ok(Box::new(PathSink {
                    path: path.clone(),
                    writer: Some(BufWriter::new(file)),
                }))
            }
            Sink::Stdout => Ok(Box::new(PlainWriter::new(io::stdout()))),
        }
    }
}

/// Local file sink with partial-file cleanup
///
/// `finish` flushes and disarms the cleanup; dropping an unfinished sink
/// removes the file.
struct PathSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl Write for PathSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.writer {
            Some(writer) => writer.write(buf),
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                "write to finished sink",
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

impl StageWrite for PathSink {
    fn finish(mut self: Box<Self>) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for PathSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            drop(writer);
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_keeps_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.txt");

        let mut sink = Sink::from_path(&path).open().unwrap();
        sink.write_all(b"kept").unwrap();
        sink.finish().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "kept");
    }

    #[test]
    fn test_drop_without_finish_removes_partial_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.txt");

        {
            let mut sink = Sink::from_path(&path).open().unwrap();
            sink.write_all(b"partial").unwrap();
            // Dropped without finish, as after a write error
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_stdout_sink_opens() {
        let sink = Sink::stdout().open().unwrap();
        drop(sink);
    }
}
