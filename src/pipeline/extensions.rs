//! Extension inference: map resource naming conventions to stage lists
//!
//! A resource named `"a.csv.gz.pgp"` is a pgp-encrypted gzip stream of CSV
//! text. The trailing extensions that match registered stage names encode
//! the pipeline: consumed right-to-left, they yield `["gz", "pgp"]` in file
//! order (last-applied extension last). Inference stops at the first
//! unrecognized segment; everything before it is the base name.

use crate::error::{Result, StreamStackError};
use crate::registry::Registry;

/// Infer the stage list from a resource name
///
/// Splits on `.` and greedily consumes trailing segments, case-insensitively,
/// while each matches a registered stage name. The base name (the first
/// segment) is never consumed. Returns matched names, lower-cased, in file
/// order. A name with no recognized extensions yields an empty list.
///
/// # Errors
///
/// An empty resource name is a configuration error.
///
/// # Example
///
/// ```
/// use streamstack::pipeline::extensions::infer;
/// use streamstack::registry::Registry;
///
/// let registry = Registry::with_builtins();
/// assert_eq!(infer("a.csv.gz.pgp", &registry).unwrap(), vec!["gz", "pgp"]);
/// assert_eq!(infer("a.xyz", &registry).unwrap(), Vec::<String>::new());
/// ```
pub fn infer(resource_name: &str, registry: &Registry) -> Result<Vec<String>> {
    if resource_name.is_empty() {
        return Err(StreamStackError::Configuration(
            "resource name must not be empty".to_string(),
        ));
    }

    let segments: Vec<&str> = resource_name.split('.').collect();
    let mut stages = Vec::new();

    // Walk from the right, keeping at least the base segment.
    for segment in segments.iter().skip(1).rev() {
        let name = segment.to_ascii_lowercase();
        if registry.is_registered(&name) {
            stages.push(name);
        } else {
            break;
        }
    }

    stages.reverse();
    Ok(stages)
}

/// Strip all recognized stage extensions from a resource name
///
/// Returns the base name whose final extension (if any) carries the
/// tabular format, e.g. `"a.csv.gz.pgp"` → `"a.csv"`. Used by the format
/// resolver.
pub fn base_name<'a>(resource_name: &'a str, registry: &Registry) -> &'a str {
    let mut base = resource_name;
    while let Some((prefix, extension)) = base.rsplit_once('.') {
        if prefix.is_empty() || !registry.is_registered(&extension.to_ascii_lowercase()) {
            break;
        }
        base = prefix;
    }
    base
}
