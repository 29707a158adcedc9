//! PGP stage (`pgp`, alias `gpg`)
//!
//! Orchestrates the GnuPG binary rather than implementing OpenPGP. Both
//! directions materialize through a named temporary file so gpg can be run
//! with plain stdio in one direction only, avoiding pipe deadlock; the
//! temporary file is deleted when the stage closes, on every exit path.
//!
//! Options:
//! - write: `recipient` (required), `signer` (optional)
//! - read: `passphrase` (optional, loopback pinentry)
//! - both: `binary` (program name, default `gpg`)

use std::io::{self, Read, Write};
use std::process::{Child, ChildStdout, Command, Stdio};

use tempfile::NamedTempFile;

use crate::error::{Result, StreamStackError};
use crate::stages::{BoxedReader, BoxedWriter, ReaderStage, StageWrite, WriterStage};
use crate::types::StageOptions;

const DEFAULT_BINARY: &str = "gpg";

fn spawn_error(binary: &str, err: io::Error) -> StreamStackError {
    StreamStackError::Command(format!("failed to run '{binary}': {err}"))
}

/// Decrypting stage: `gpg --decrypt` over a materialized temp file
pub struct PgpReaderStage;

impl ReaderStage for PgpReaderStage {
    fn open(&self, mut inner: BoxedReader, options: &StageOptions) -> Result<BoxedReader> {
        let binary = options.str("binary").unwrap_or(DEFAULT_BINARY).to_string();

        let mut encrypted = NamedTempFile::new()?;
        io::copy(&mut inner, encrypted.as_file_mut())?;
        encrypted.as_file_mut().sync_all()?;
        drop(inner);

        let mut command = Command::new(&binary);
        command.args(["--batch", "--yes", "--quiet"]);
        if let Some(passphrase) = options.str("passphrase") {
            command.args(["--pinentry-mode", "loopback", "--passphrase", passphrase]);
        }
        command.arg("--decrypt").arg(encrypted.path());

        let mut child = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&binary, e))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StreamStackError::Command("gpg stdout unavailable".to_string()))?;

        Ok(Box::new(PgpReadStream {
            child: Some(child),
            stdout,
            _encrypted: encrypted,
        }))
    }
}

struct PgpReadStream {
    child: Option<Child>,
    stdout: ChildStdout,
    // Keeps the encrypted temp file alive until gpg has read it
    _encrypted: NamedTempFile,
}

impl Read for PgpReadStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.stdout.read(buf)?;
        if n == 0 {
            if let Some(mut child) = self.child.take() {
                let mut stderr_text = String::new();
                if let Some(stderr) = child.stderr.as_mut() {
                    let _ = stderr.read_to_string(&mut stderr_text);
                }
                let status = child.wait()?;
                if !status.success() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        StreamStackError::Command(format!(
                            "gpg decryption failed ({status}): {}",
                            stderr_text.trim()
                        )),
                    ));
                }
            }
        }
        Ok(n)
    }
}

impl Drop for PgpReadStream {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Encrypting stage: buffer plaintext to a temp file, `gpg --encrypt` on
/// finish, stream ciphertext into the wrapped stream
pub struct PgpWriterStage;

impl WriterStage for PgpWriterStage {
    fn open(&self, inner: BoxedWriter, options: &StageOptions) -> Result<BoxedWriter> {
        let recipient = options
            .str("recipient")
            .ok_or_else(|| {
                StreamStackError::Configuration(
                    "pgp writer requires a 'recipient' option".to_string(),
                )
            })?
            .to_string();
        let signer = options.str("signer").map(str::to_string);
        let binary = options.str("binary").unwrap_or(DEFAULT_BINARY).to_string();

        Ok(Box::new(PgpWriteStream {
            plaintext: Some(NamedTempFile::new()?),
            inner: Some(inner),
            recipient,
            signer,
            binary,
        }))
    }
}

struct PgpWriteStream {
    plaintext: Option<NamedTempFile>,
    inner: Option<BoxedWriter>,
    recipient: String,
    signer: Option<String>,
    binary: String,
}

impl Write for PgpWriteStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.plaintext {
            Some(file) => file.as_file_mut().write(buf),
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                "write to finished pgp stream",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.plaintext {
            Some(file) => file.as_file_mut().flush(),
            None => Ok(()),
        }
    }
}

impl StageWrite for PgpWriteStream {
    fn finish(mut self: Box<Self>) -> Result<()> {
        let Some(mut plaintext) = self.plaintext.take() else {
            return Ok(());
        };
        let Some(mut inner) = self.inner.take() else {
            return Ok(());
        };
        plaintext.as_file_mut().flush()?;
        plaintext.as_file_mut().sync_all()?;

        let mut command = Command::new(&self.binary);
        command.args(["--batch", "--yes", "--quiet", "--trust-model", "always"]);
        command.args(["--recipient", &self.recipient]);
        if let Some(signer) = &self.signer {
            command.args(["--sign", "--local-user", signer]);
        }
        command.args(["--encrypt", "--output", "-"]).arg(plaintext.path());

        let mut child = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&self.binary, e))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| StreamStackError::Command("gpg stdout unavailable".to_string()))?;
        io::copy(&mut stdout, &mut inner)?;

        let mut stderr_text = String::new();
        if let Some(stderr) = child.stderr.as_mut() {
            let _ = stderr.read_to_string(&mut stderr_text);
        }
        let status = child.wait()?;
        if !status.success() {
            return Err(StreamStackError::Command(format!(
                "gpg encryption failed ({status}): {}",
                stderr_text.trim()
            )));
        }

        inner.finish()
    }
}
