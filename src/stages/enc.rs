//! Symmetric authenticated encryption stage (`enc`)
//!
//! Segment-framed ChaCha20-Poly1305. The stream layout is:
//!
//! ```text
//! magic "SSE1" | nonce salt (4 bytes) | frame* | terminator frame
//! frame = ciphertext length (u32 LE) | ciphertext (plaintext + 16-byte tag)
//! ```
//!
//! Plaintext is split into segments of at most 64 KiB; each segment is
//! sealed with nonce = salt || segment counter (u64 LE), so frames cannot
//! be reordered or duplicated. The terminator is a sealed empty segment; a
//! stream ending without one fails closed as truncated, as does any frame
//! whose tag does not verify.
//!
//! Options:
//! - `key`: 64 hex characters (32 bytes), used directly
//! - `passphrase`: any string; the key is its SHA-256 digest
//!
//! One of the two is required in both directions.

use std::io::{self, Read, Write};

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use sha2::{Digest, Sha256};

use crate::error::{Result, StreamStackError};
use crate::stages::{BoxedReader, BoxedWriter, ReaderStage, StageWrite, WriterStage};
use crate::types::StageOptions;

const MAGIC: &[u8; 4] = b"SSE1";
const SALT_LEN: usize = 4;
const TAG_LEN: usize = 16;
const SEGMENT_SIZE: usize = 64 * 1024;
const MAX_FRAME: usize = SEGMENT_SIZE + TAG_LEN;

fn derive_key(options: &StageOptions) -> Result<[u8; 32]> {
    if let Some(hex_key) = options.str("key") {
        let bytes = hex::decode(hex_key)
            .map_err(|e| StreamStackError::Configuration(format!("enc key is not hex: {e}")))?;
        let key: [u8; 32] = bytes.try_into().map_err(|_| {
            StreamStackError::Configuration("enc key must be 32 bytes of hex".to_string())
        })?;
        return Ok(key);
    }
    if let Some(passphrase) = options.str("passphrase") {
        return Ok(Sha256::digest(passphrase.as_bytes()).into());
    }
    Err(StreamStackError::Configuration(
        "enc stage requires a 'key' or 'passphrase' option".to_string(),
    ))
}

fn cipher_for(options: &StageOptions) -> Result<ChaCha20Poly1305> {
    let key = derive_key(options)?;
    ChaCha20Poly1305::new_from_slice(&key)
        .map_err(|_| StreamStackError::Cipher("invalid key length".to_string()))
}

fn nonce_for(salt: &[u8; SALT_LEN], counter: u64) -> Nonce {
    let mut nonce = [0u8; 12];
    nonce[..SALT_LEN].copy_from_slice(salt);
    nonce[SALT_LEN..].copy_from_slice(&counter.to_le_bytes());
    Nonce::from(nonce)
}

/// Decrypting stage
pub struct EncReaderStage;

impl ReaderStage for EncReaderStage {
    fn open(&self, mut inner: BoxedReader, options: &StageOptions) -> Result<BoxedReader> {
        let cipher = cipher_for(options)?;

        let mut header = [0u8; MAGIC.len() + SALT_LEN];
        inner.read_exact(&mut header)?;
        if &header[..MAGIC.len()] != MAGIC {
            return Err(StreamStackError::Cipher(
                "stream is not streamstack-encrypted (bad magic)".to_string(),
            ));
        }
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&header[MAGIC.len()..]);

        Ok(Box::new(EncReadStream {
            cipher,
            salt,
            counter: 0,
            inner,
            plain: Vec::new(),
            pos: 0,
            done: false,
        }))
    }
}

struct EncReadStream {
    cipher: ChaCha20Poly1305,
    salt: [u8; SALT_LEN],
    counter: u64,
    inner: BoxedReader,
    plain: Vec<u8>,
    pos: usize,
    done: bool,
}

impl EncReadStream {
    fn read_frame(&mut self) -> io::Result<()> {
        let mut len_bytes = [0u8; 4];
        if let Err(e) = self.inner.read_exact(&mut len_bytes) {
            return Err(if e.kind() == io::ErrorKind::UnexpectedEof {
                cipher_io_error("stream truncated before terminator frame")
            } else {
                e
            });
        }
        let len = u32::from_le_bytes(len_bytes) as usize;
        if len < TAG_LEN || len > MAX_FRAME {
            return Err(cipher_io_error("invalid frame length"));
        }

        let mut ciphertext = vec![0u8; len];
        self.inner.read_exact(&mut ciphertext)?;

        let nonce = nonce_for(&self.salt, self.counter);
        let plain = self
            .cipher
            .decrypt(&nonce, ciphertext.as_ref())
            .map_err(|_| cipher_io_error("authentication failed"))?;
        self.counter += 1;

        if plain.is_empty() {
            self.done = true;
        }
        self.plain = plain;
        self.pos = 0;
        Ok(())
    }
}

fn cipher_io_error(msg: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        StreamStackError::Cipher(msg.to_string()),
    )
}

impl Read for EncReadStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.plain.len() {
            if self.done {
                return Ok(0);
            }
            self.read_frame()?;
        }

        let available = self.plain.len() - self.pos;
        let to_copy = available.min(buf.len());
        buf[..to_copy].copy_from_slice(&self.plain[self.pos..self.pos + to_copy]);
        self.pos += to_copy;
        Ok(to_copy)
    }
}

/// Encrypting stage
pub struct EncWriterStage;

impl WriterStage for EncWriterStage {
    fn open(&self, mut inner: BoxedWriter, options: &StageOptions) -> Result<BoxedWriter> {
        let cipher = cipher_for(options)?;
        let salt: [u8; SALT_LEN] = rand::random();

        inner.write_all(MAGIC)?;
        inner.write_all(&salt)?;

        Ok(Box::new(EncWriteStream {
            cipher,
            salt,
            counter: 0,
            buf: Vec::with_capacity(SEGMENT_SIZE),
            inner: Some(inner),
        }))
    }
}

struct EncWriteStream {
    cipher: ChaCha20Poly1305,
    salt: [u8; SALT_LEN],
    counter: u64,
    buf: Vec<u8>,
    inner: Option<BoxedWriter>,
}

impl EncWriteStream {
    fn emit_segment(&mut self, plaintext: &[u8]) -> io::Result<()> {
        let nonce = nonce_for(&self.salt, self.counter);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "encryption failed"))?;
        self.counter += 1;

        let inner = self
            .inner
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "write to finished enc stream"))?;
        inner.write_all(&(ciphertext.len() as u32).to_le_bytes())?;
        inner.write_all(&ciphertext)
    }

    fn drain_buffer(&mut self) -> io::Result<()> {
        while !self.buf.is_empty() {
            let take = self.buf.len().min(SEGMENT_SIZE);
            let segment: Vec<u8> = self.buf.drain(..take).collect();
            self.emit_segment(&segment)?;
        }
        Ok(())
    }
}

impl Write for EncWriteStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.inner.is_none() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "write to finished enc stream",
            ));
        }
        self.buf.extend_from_slice(buf);
        while self.buf.len() >= SEGMENT_SIZE {
            let segment: Vec<u8> = self.buf.drain(..SEGMENT_SIZE).collect();
            self.emit_segment(&segment)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain_buffer()?;
        match &mut self.inner {
            Some(inner) => inner.flush(),
            None => Ok(()),
        }
    }
}

impl StageWrite for EncWriteStream {
    fn finish(mut self: Box<Self>) -> Result<()> {
        self.drain_buffer()?;
        // Sealed empty segment marks authenticated end-of-stream
        self.emit_segment(&[])?;
        match self.inner.take() {
            Some(inner) => inner.finish(),
            None => Ok(()),
        }
    }
}
