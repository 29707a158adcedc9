//! Stage registry: symbolic name to reader/writer factory pair
//!
//! The registry maps lower-case word names (`gz`, `zip`, `pgp`, ...) to
//! stage factories. A process-wide default instance carries the built-in
//! stages; isolated instances can be constructed and injected for testing
//! or for applications that want a private stage set.
//!
//! Registration is a startup-time activity by convention. The table is
//! behind an `RwLock` so lookups are memory-safe regardless, but no
//! ordering guarantees are made for registration concurrent with pipeline
//! resolution.
//!
//! # Example
//!
//! ```
//! use streamstack::registry::Registry;
//!
//! let registry = Registry::with_builtins();
//! assert!(registry.is_registered("gz"));
//! assert!(registry.is_registered("none"));
//!
//! // `none` is always present and cannot be removed
//! assert!(!registry.deregister("none"));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

use log::debug;

use crate::error::{Result, StreamStackError};
use crate::stages;
use crate::stages::{ReaderStage, WriterStage};
use crate::types::Direction;

/// The always-registered pass-through stage name
pub const NONE_STAGE: &str = "none";

/// Reader/writer factory pair registered under one stage name
///
/// Either side may be absent: a read-only format registers no writer
/// factory, and lookups for that direction fail with `UnknownStage`.
#[derive(Clone)]
pub struct StageRegistration {
    /// Factory for the read direction, if supported
    pub reader: Option<Arc<dyn ReaderStage>>,
    /// Factory for the write direction, if supported
    pub writer: Option<Arc<dyn WriterStage>>,
}

impl StageRegistration {
    /// Registration supporting both directions
    pub fn new(reader: Arc<dyn ReaderStage>, writer: Arc<dyn WriterStage>) -> Self {
        Self {
            reader: Some(reader),
            writer: Some(writer),
        }
    }

    /// Read-only registration
    pub fn reader_only(reader: Arc<dyn ReaderStage>) -> Self {
        Self {
            reader: Some(reader),
            writer: None,
        }
    }

    /// Write-only registration
    pub fn writer_only(writer: Arc<dyn WriterStage>) -> Self {
        Self {
            reader: None,
            writer: Some(writer),
        }
    }
}

/// Process-wide default registry, populated with the built-in stages
static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::with_builtins);

/// Validate a stage name: non-empty ASCII word characters only
pub(crate) fn validate_stage_name(name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StreamStackError::Configuration(format!(
            "invalid stage name '{name}': word characters only"
        )));
    }
    Ok(())
}

/// Mapping from stage name to registered factories
pub struct Registry {
    entries: RwLock<HashMap<String, StageRegistration>>,
}

impl Registry {
    /// Create a registry containing only the pass-through `none` stage
    pub fn new() -> Self {
        let registry = Self {
            entries: RwLock::new(HashMap::new()),
        };
        registry
            .register(
                NONE_STAGE,
                StageRegistration::new(
                    Arc::new(stages::NoneReaderStage),
                    Arc::new(stages::NoneWriterStage),
                ),
            )
            .expect("none stage name is valid");
        registry
    }

    /// Create a registry with every built-in stage registered
    ///
    /// Built-ins: `none`, `gz`/`gzip`, `bz2`, `zip`, `enc`, `pgp`/`gpg`.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        let gz = StageRegistration::new(
            Arc::new(stages::GzReaderStage),
            Arc::new(stages::GzWriterStage),
        );
        registry.register("gz", gz.clone()).expect("valid name");
        registry.register("gzip", gz).expect("valid name");
        registry
            .register(
                "bz2",
                StageRegistration::new(
                    Arc::new(stages::Bz2ReaderStage),
                    Arc::new(stages::Bz2WriterStage),
                ),
            )
            .expect("valid name");
        registry
            .register(
                "zip",
                StageRegistration::new(
                    Arc::new(stages::ZipReaderStage),
                    Arc::new(stages::ZipWriterStage),
                ),
            )
            .expect("valid name");
        registry
            .register(
                "enc",
                StageRegistration::new(
                    Arc::new(stages::EncReaderStage),
                    Arc::new(stages::EncWriterStage),
                ),
            )
            .expect("valid name");
        let pgp = StageRegistration::new(
            Arc::new(stages::PgpReaderStage),
            Arc::new(stages::PgpWriterStage),
        );
        registry.register("pgp", pgp.clone()).expect("valid name");
        registry.register("gpg", pgp).expect("valid name");
        registry
    }

    /// The process-wide default registry
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Register (or overwrite) the stage factories for `name`
    ///
    /// Names are stored lower-cased; lookups are case-insensitive through
    /// that normalization. Non-word names are rejected.
    pub fn register(&self, name: &str, registration: StageRegistration) -> Result<()> {
        validate_stage_name(name)?;
        let key = name.to_ascii_lowercase();
        debug!("registering stage '{key}'");
        self.entries
            .write()
            .expect("registry lock poisoned")
            .insert(key, registration);
        Ok(())
    }

    /// Remove the registration for `name`, returning whether it existed
    ///
    /// The `none` stage cannot be removed.
    pub fn deregister(&self, name: &str) -> bool {
        let key = name.to_ascii_lowercase();
        if key == NONE_STAGE {
            return false;
        }
        debug!("deregistering stage '{key}'");
        self.entries
            .write()
            .expect("registry lock poisoned")
            .remove(&key)
            .is_some()
    }

    /// Whether `name` is registered (in either direction)
    pub fn is_registered(&self, name: &str) -> bool {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .contains_key(&name.to_ascii_lowercase())
    }

    /// Look up the read-direction factory for `name`
    pub fn lookup_reader(&self, name: &str) -> Result<Arc<dyn ReaderStage>> {
        self.lookup(name)?
            .reader
            .ok_or_else(|| StreamStackError::UnknownStage {
                name: name.to_string(),
                direction: Direction::Read,
            })
    }

    /// Look up the write-direction factory for `name`
    pub fn lookup_writer(&self, name: &str) -> Result<Arc<dyn WriterStage>> {
        self.lookup(name)?
            .writer
            .ok_or_else(|| StreamStackError::UnknownStage {
                name: name.to_string(),
                direction: Direction::Write,
            })
    }

    fn lookup(&self, name: &str) -> Result<StageRegistration> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| StreamStackError::UnknownStage {
                name: name.to_string(),
                direction: Direction::Read,
            })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
