//! Pipeline builder: accumulate stage instructions, resolve the final list
//!
//! Three independent instruction sets feed the final pipeline:
//!
//! 1. the stage list inferred from the resource name's extensions,
//! 2. an explicit stage list that, once set, disables inference entirely,
//! 3. per-stage options attachable to either of the above.
//!
//! Explicit streams carry their own options payload, so attaching a
//! standalone option for a stage that was already added as an explicit
//! stream (or vice versa) is a configuration error.

use indexmap::IndexMap;
use log::debug;

use crate::error::{Result, StreamStackError};
use crate::pipeline::{extensions, Pipeline, StageSpec};
use crate::registry::{validate_stage_name, Registry};
use crate::types::StageOptions;

/// Accumulates stage instructions for one resource
///
/// Built fresh per resource; resolved into a [`Pipeline`] once per
/// reader/writer invocation.
///
/// # Example
///
/// ```
/// use streamstack::pipeline::PipelineBuilder;
/// use streamstack::registry::Registry;
/// use streamstack::StageOptions;
///
/// let registry = Registry::with_builtins();
/// let mut builder = PipelineBuilder::with_resource("sales.csv.gz");
/// builder.option("gz", StageOptions::new().set("level", 9)).unwrap();
///
/// let pipeline = builder.resolve(&registry).unwrap();
/// assert_eq!(pipeline.names(), vec!["gz"]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct PipelineBuilder {
    resource_name: Option<String>,
    explicit: Option<Vec<StageSpec>>,
    options: IndexMap<String, StageOptions>,
}

impl PipelineBuilder {
    /// Builder with no resource name (explicit stages only)
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder inferring stages from `resource_name`'s extensions
    pub fn with_resource(resource_name: impl Into<String>) -> Self {
        Self {
            resource_name: Some(resource_name.into()),
            ..Self::default()
        }
    }

    /// Replace the resource name used for inference
    pub fn set_resource(&mut self, resource_name: impl Into<String>) {
        self.resource_name = Some(resource_name.into());
    }

    /// The resource name, if any
    pub fn resource_name(&self) -> Option<&str> {
        self.resource_name.as_deref()
    }

    /// Add an explicit stage with its options
    ///
    /// The first call disables extension inference; subsequent calls append
    /// in order. Adding a stage that already has a standalone option set,
    /// or adding the same stage twice, is a configuration error.
    pub fn stream(&mut self, name: &str, options: StageOptions) -> Result<&mut Self> {
        validate_stage_name(name)?;
        let name = name.to_ascii_lowercase();
        if self.options.contains_key(&name) {
            return Err(StreamStackError::Configuration(format!(
                "stage '{name}' already has options attached; \
                 explicit streams and standalone options are mutually exclusive"
            )));
        }
        let explicit = self.explicit.get_or_insert_with(Vec::new);
        if explicit.iter().any(|spec| spec.name == name) {
            return Err(StreamStackError::Configuration(format!(
                "stage '{name}' was already added as an explicit stream"
            )));
        }
        explicit.push(StageSpec::new(name, options));
        Ok(self)
    }

    /// Attach options to a named stage, applied if that stage is present
    /// in the final pipeline
    ///
    /// Errors if the stage was already added as an explicit stream, or if
    /// there is neither a resource name nor any explicit stage to attach
    /// options to.
    pub fn option(&mut self, name: &str, options: StageOptions) -> Result<&mut Self> {
        validate_stage_name(name)?;
        let name = name.to_ascii_lowercase();
        if let Some(explicit) = &self.explicit {
            if explicit.iter().any(|spec| spec.name == name) {
                return Err(StreamStackError::Configuration(format!(
                    "stage '{name}' was added as an explicit stream with its own options"
                )));
            }
        }
        if self.resource_name.is_none() && self.explicit.is_none() {
            return Err(StreamStackError::Configuration(format!(
                "cannot attach options for stage '{name}': no resource name to infer stages from"
            )));
        }
        self.options.insert(name, options);
        Ok(self)
    }

    /// Resolve the final ordered pipeline
    ///
    /// Uses the explicit stage list if one was set, otherwise the list
    /// inferred from the resource name's extensions (empty when there is no
    /// resource name). Standalone options are merged onto inferred stages
    /// by name.
    pub fn resolve(&self, registry: &Registry) -> Result<Pipeline> {
        let specs = match &self.explicit {
            Some(explicit) => explicit.clone(),
            None => {
                let names = match &self.resource_name {
                    Some(name) => extensions::infer(name, registry)?,
                    None => Vec::new(),
                };
                let mut specs = Vec::with_capacity(names.len());
                for name in names {
                    let options = self.options.get(&name).cloned().unwrap_or_default();
                    specs.push(StageSpec::new(name, options));
                }
                specs
            }
        };

        for (index, spec) in specs.iter().enumerate() {
            if specs[..index].iter().any(|prior| prior.name == spec.name) {
                return Err(StreamStackError::Configuration(format!(
                    "stage '{}' appears more than once in the pipeline",
                    spec.name
                )));
            }
        }

        debug!(
            "resolved pipeline for {:?}: {:?}",
            self.resource_name,
            specs.iter().map(|s| s.name.as_str()).collect::<Vec<_>>()
        );
        Ok(Pipeline::from_specs(specs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_inferred() {
        let registry = Registry::with_builtins();
        let builder = PipelineBuilder::with_resource("a.csv.gz.pgp");
        let pipeline = builder.resolve(&registry).unwrap();
        assert_eq!(pipeline.names(), vec!["gz", "pgp"]);
    }

    #[test]
    fn test_resolve_inferred_with_options() {
        let registry = Registry::with_builtins();
        let mut builder = PipelineBuilder::with_resource("a.csv.gz");
        builder
            .option("gz", StageOptions::new().set("level", 1))
            .unwrap();

        let pipeline = builder.resolve(&registry).unwrap();
        let spec = pipeline.iter().next().unwrap();
        assert_eq!(spec.name, "gz");
        assert_eq!(spec.options.u64("level"), Some(1));
    }

    #[test]
    fn test_explicit_disables_inference() {
        let registry = Registry::with_builtins();
        let mut builder = PipelineBuilder::with_resource("a.csv.gz.pgp");
        builder.stream("bz2", StageOptions::new()).unwrap();

        let pipeline = builder.resolve(&registry).unwrap();
        assert_eq!(pipeline.names(), vec!["bz2"]);
    }

    #[test]
    fn test_explicit_none_forces_raw() {
        let registry = Registry::with_builtins();
        let mut builder = PipelineBuilder::with_resource("a.csv.gz");
        builder.stream("none", StageOptions::new()).unwrap();

        let pipeline = builder.resolve(&registry).unwrap();
        assert_eq!(pipeline.names(), vec!["none"]);
    }

    #[test]
    fn test_option_then_stream_conflict() {
        let mut builder = PipelineBuilder::with_resource("a.csv.pgp");
        builder
            .option("pgp", StageOptions::new().set("passphrase", "x"))
            .unwrap();

        let result = builder.stream("pgp", StageOptions::new());
        assert!(matches!(result, Err(StreamStackError::Configuration(_))));
    }

    #[test]
    fn test_stream_then_option_conflict() {
        let mut builder = PipelineBuilder::with_resource("a.csv.pgp");
        builder.stream("pgp", StageOptions::new()).unwrap();

        let result = builder.option("pgp", StageOptions::new().set("passphrase", "x"));
        assert!(matches!(result, Err(StreamStackError::Configuration(_))));
    }

    #[test]
    fn test_option_without_resource_or_streams() {
        let mut builder = PipelineBuilder::new();
        let result = builder.option("gz", StageOptions::new());
        assert!(matches!(result, Err(StreamStackError::Configuration(_))));
    }

    #[test]
    fn test_option_allowed_after_explicit_stream_of_other_name() {
        let mut builder = PipelineBuilder::new();
        builder.stream("gz", StageOptions::new()).unwrap();
        // `pgp` is not in the explicit list; the option simply never applies
        builder.option("pgp", StageOptions::new()).unwrap();

        let registry = Registry::with_builtins();
        let pipeline = builder.resolve(&registry).unwrap();
        assert_eq!(pipeline.names(), vec!["gz"]);
    }

    #[test]
    fn test_duplicate_explicit_stream() {
        let mut builder = PipelineBuilder::new();
        builder.stream("gz", StageOptions::new()).unwrap();
        let result = builder.stream("gz", StageOptions::new());
        assert!(matches!(result, Err(StreamStackError::Configuration(_))));
    }

    #[test]
    fn test_no_resource_no_streams_resolves_empty() {
        let registry = Registry::with_builtins();
        let pipeline = PipelineBuilder::new().resolve(&registry).unwrap();
        assert!(pipeline.is_empty());
    }
}
