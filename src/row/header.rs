//! Header handling: column cleansing and the first-row contract
//!
//! The header is the first logical row of a tabular stream. Raw column
//! names are cleansed into canonical identifiers, validated against the
//! allowed/required sets, and then fixed for the life of the session.

use crate::error::{Result, StreamStackError};

/// Cleanse a raw column name into a canonical identifier
///
/// Trims surrounding whitespace, lower-cases, collapses every run of
/// non-alphanumeric characters to a single underscore, and strips leading
/// and trailing underscores. A name may cleanse to the empty string.
///
/// # Example
///
/// ```
/// use streamstack::row::header::cleanse_column_name;
///
/// assert_eq!(cleanse_column_name(" First Name "), "first_name");
/// assert_eq!(cleanse_column_name("Zip/Postal-Code"), "zip_postal_code");
/// assert_eq!(cleanse_column_name("***"), "");
/// ```
pub fn cleanse_column_name(raw: &str) -> String {
    let mut cleansed = String::with_capacity(raw.len());
    let mut pending_separator = false;
    for c in raw.trim().chars() {
        if c.is_alphanumeric() {
            if pending_separator && !cleansed.is_empty() {
                cleansed.push('_');
            }
            pending_separator = false;
            cleansed.extend(c.to_lowercase());
        } else {
            pending_separator = true;
        }
    }
    cleansed
}

/// First-row contract for row-based formats
///
/// `columns` is `None` until set explicitly or captured from the first
/// parsed/written row. After cleansing, a `None` entry inside the column
/// list marks a column rejected by `allowed_columns` under `skip_unknown`:
/// the position is kept so values still line up, but its values are
/// dropped.
#[derive(Debug, Clone, Default)]
pub struct TabularHeader {
    columns: Option<Vec<Option<String>>>,
    allowed_columns: Option<Vec<String>>,
    required_columns: Option<Vec<String>>,
    skip_unknown: bool,
}

impl TabularHeader {
    /// Header with no constraints and no columns yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the retained columns to this set
    pub fn with_allowed_columns(mut self, allowed: Vec<String>) -> Self {
        self.allowed_columns = Some(allowed);
        self
    }

    /// Require these columns to be present after cleansing
    pub fn with_required_columns(mut self, required: Vec<String>) -> Self {
        self.required_columns = Some(required);
        self
    }

    /// When a column is not in `allowed_columns`, drop its values instead
    /// of failing
    pub fn with_skip_unknown(mut self, skip_unknown: bool) -> Self {
        self.skip_unknown = skip_unknown;
        self
    }

    /// Whether columns are known yet
    pub fn has_columns(&self) -> bool {
        self.columns.is_some()
    }

    /// The retained column names, in order, once known
    ///
    /// Rejected (skipped) positions are omitted.
    pub fn column_names(&self) -> Option<Vec<&str>> {
        self.columns.as_ref().map(|columns| {
            columns
                .iter()
                .filter_map(|c| c.as_deref())
                .collect::<Vec<_>>()
        })
    }

    /// All column slots in order, `None` marking rejected positions
    pub(crate) fn slots(&self) -> Option<&[Option<String>]> {
        self.columns.as_deref()
    }

    /// Cleanse, validate and fix the column list
    ///
    /// # Errors
    ///
    /// - a column outside `allowed_columns` without `skip_unknown`
    /// - zero usable columns after cleansing
    /// - any `required_columns` entry missing after cleansing
    pub fn set_columns(&mut self, raw: &[String]) -> Result<()> {
        let mut slots = Vec::with_capacity(raw.len());
        for name in raw {
            let cleansed = cleanse_column_name(name);
            if cleansed.is_empty() {
                slots.push(None);
                continue;
            }
            if let Some(allowed) = &self.allowed_columns {
                if !allowed.iter().any(|a| a == &cleansed) {
                    if self.skip_unknown {
                        slots.push(None);
                        continue;
                    }
                    return Err(StreamStackError::InvalidHeader {
                        reason: format!("unknown column '{cleansed}'"),
                    });
                }
            }
            slots.push(Some(cleansed));
        }

        if slots.iter().all(Option::is_none) {
            return Err(StreamStackError::InvalidHeader {
                reason: "header cleansed to zero usable columns".to_string(),
            });
        }

        if let Some(required) = &self.required_columns {
            let missing: Vec<&str> = required
                .iter()
                .filter(|r| !slots.iter().flatten().any(|c| c == *r))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                return Err(StreamStackError::InvalidHeader {
                    reason: format!("missing required columns: {}", missing.join(", ")),
                });
            }
        }

        self.columns = Some(slots);
        Ok(())
    }

    /// Fix the column list verbatim, without cleansing
    ///
    /// Used by self-describing formats (json/hash) where keys are already
    /// canonical identifiers chosen by the producer. Allowed/required
    /// validation still applies.
    pub(crate) fn set_columns_verbatim(&mut self, raw: &[String]) -> Result<()> {
        let mut slots = Vec::with_capacity(raw.len());
        for name in raw {
            if let Some(allowed) = &self.allowed_columns {
                if !allowed.iter().any(|a| a == name) {
                    if self.skip_unknown {
                        slots.push(None);
                        continue;
                    }
                    return Err(StreamStackError::InvalidHeader {
                        reason: format!("unknown column '{name}'"),
                    });
                }
            }
            slots.push(Some(name.clone()));
        }

        if slots.iter().all(Option::is_none) {
            return Err(StreamStackError::InvalidHeader {
                reason: "record contains no usable columns".to_string(),
            });
        }

        if let Some(required) = &self.required_columns {
            let missing: Vec<&str> = required
                .iter()
                .filter(|r| !slots.iter().flatten().any(|c| c == *r))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                return Err(StreamStackError::InvalidHeader {
                    reason: format!("missing required columns: {}", missing.join(", ")),
                });
            }
        }

        self.columns = Some(slots);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanse_basic() {
        assert_eq!(cleanse_column_name("Name"), "name");
        assert_eq!(cleanse_column_name("  zip code  "), "zip_code");
        assert_eq!(cleanse_column_name("a--b__c"), "a_b_c");
        assert_eq!(cleanse_column_name("trailing-"), "trailing");
        assert_eq!(cleanse_column_name("-leading"), "leading");
    }

    fn raw(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_set_columns_cleanses() {
        let mut header = TabularHeader::new();
        header
            .set_columns(&raw(&["First Name", "ZIP", "e-mail"]))
            .unwrap();
        assert_eq!(
            header.column_names().unwrap(),
            vec!["first_name", "zip", "e_mail"]
        );
    }

    #[test]
    fn test_zero_usable_columns() {
        let mut header = TabularHeader::new();
        let result = header.set_columns(&raw(&["***", "  ", "---"]));
        assert!(matches!(
            result,
            Err(StreamStackError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn test_allowed_columns_rejects_unknown() {
        let mut header = TabularHeader::new().with_allowed_columns(raw(&["name"]));
        let result = header.set_columns(&raw(&["name", "age"]));
        match result {
            Err(StreamStackError::InvalidHeader { reason }) => {
                assert!(reason.contains("age"), "reason was: {reason}")
            }
            other => panic!("expected InvalidHeader, got {other:?}"),
        }
    }

    #[test]
    fn test_allowed_columns_skip_unknown_nulls_position() {
        let mut header = TabularHeader::new()
            .with_allowed_columns(raw(&["name"]))
            .with_skip_unknown(true);
        header.set_columns(&raw(&["name", "age"])).unwrap();
        assert_eq!(header.column_names().unwrap(), vec!["name"]);
        assert_eq!(header.slots().unwrap().len(), 2);
    }

    #[test]
    fn test_required_columns_missing_named() {
        let mut header =
            TabularHeader::new().with_required_columns(raw(&["first", "third"]));
        let result = header.set_columns(&raw(&["first", "second"]));
        match result {
            Err(StreamStackError::InvalidHeader { reason }) => {
                assert!(reason.contains("third"), "reason was: {reason}");
                assert!(!reason.contains("first"), "reason was: {reason}");
            }
            other => panic!("expected InvalidHeader, got {other:?}"),
        }
    }
}
