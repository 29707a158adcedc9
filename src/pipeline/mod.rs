//! Pipeline resolution and execution
//!
//! A pipeline is the resolved, ordered list of stages to apply to a given
//! resource. The list keeps file order: the last element is the stage
//! closest to the raw bytes (the last-applied extension in the resource
//! name). [`executor`] folds the list from the end toward the front for
//! both directions, so the stage closest to raw bytes is wrapped first and
//! torn down last.

use crate::types::StageOptions;

pub mod builder;
pub mod executor;
pub mod extensions;

pub use builder::PipelineBuilder;
pub use executor::{execute_reader, execute_writer};

/// One resolved pipeline stage: name plus options
///
/// Immutable once constructed; created during pipeline resolution and
/// consumed by the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSpec {
    /// Registered stage name, lower-case
    pub name: String,
    /// Options for this stage
    pub options: StageOptions,
}

impl StageSpec {
    /// Create a stage spec
    pub fn new(name: impl Into<String>, options: StageOptions) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }
}

/// The resolved, ordered stage list for one reader/writer invocation
///
/// Invariant: no two entries share a name. Built fresh per invocation,
/// never shared across calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    specs: Vec<StageSpec>,
}

impl Pipeline {
    /// An empty pipeline (raw byte pass-through)
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_specs(specs: Vec<StageSpec>) -> Self {
        Self { specs }
    }

    /// Whether no stages apply
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Iterate the stages in file order (closest to raw bytes last)
    pub fn iter(&self) -> std::slice::Iter<'_, StageSpec> {
        self.specs.iter()
    }

    /// Stage names in file order
    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a Pipeline {
    type Item = &'a StageSpec;
    type IntoIter = std::slice::Iter<'a, StageSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.iter()
    }
}
