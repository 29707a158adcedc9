//! streamstack: uniform streaming I/O with composable codec stages
//!
//! # Overview
//!
//! streamstack reads and writes data that may be compressed, encrypted
//! and/or tabular — without the caller needing to know which. The chain of
//! transforms is inferred from the resource name's extensions (or supplied
//! explicitly), assembled lazily around the raw byte stream, and torn down
//! in reverse order on every exit path.
//!
//! ## Key Features
//!
//! - **Naming conventions**: `"a.csv.gz.pgp"` resolves to decrypt → gunzip
//!   → CSV records, with no caller-side dispatch
//! - **Constant memory**: every stage streams; inputs of any size traverse
//!   in bounded memory
//! - **Guaranteed teardown**: stages close last-constructed first, even
//!   when the caller's closure fails mid-stream
//! - **Pluggable stages**: compression, encryption and custom transforms
//!   register against symbolic names in an injectable registry
//!
//! ## Quick Start
//!
//! ```no_run
//! use streamstack::Stream;
//!
//! # fn main() -> streamstack::Result<()> {
//! // Stream records from an encrypted, gzipped CSV (constant memory)
//! Stream::path("large.csv.gz.enc")
//!     .option("enc", streamstack::StageOptions::new().set("passphrase", "secret"))?
//!     .record_reader(|records| {
//!         for record in records {
//!             let record = record?;
//!             // Process one record at a time
//!         }
//!         Ok(())
//!     })?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`stream`]: caller-facing facade (paths, stdin/stdout, readers/writers)
//! - [`pipeline`]: extension inference, pipeline building, stage execution
//! - [`registry`]: stage name → factory registration and lookup
//! - [`stages`]: built-in stages (gz, bz2, zip, enc, pgp) and the stage
//!   capability interface
//! - [`row`]: line/row/record layer with the tabular header state machine
//! - [`format`]: tabular format resolution
//! - [`source`]/[`sink`]: local path and stdio endpoints

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod format;
pub mod pipeline;
pub mod registry;
pub mod row;
pub mod sink;
pub mod source;
pub mod stages;
pub mod stream;
pub mod types;

// Re-export commonly used types
pub use error::{Result, StreamStackError};
pub use format::Format;
pub use pipeline::{Pipeline, PipelineBuilder, StageSpec};
pub use registry::{Registry, StageRegistration};
pub use row::{FixedColumn, FixedLayout, TabularHeader};
pub use stream::Stream;
pub use types::{Direction, Record, Row, StageOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
