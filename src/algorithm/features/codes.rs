//! Diagnosis code sets
//!
//! A [`CodeSet`] matches a free-text diagnosis field when the field contains
//! any of its codes as a substring. There are no word boundaries: `F2`
//! matches `F20.1` and `XF2`. Exceptions are expressed by leaving a code out
//! of the set, which is how `F17` (tobacco use) is kept out of the
//! drug/alcohol flag even though the rest of `F10`-`F19` is in.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// A set of code fragments matched by substring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeSet {
    codes: Vec<String>,
}

impl CodeSet {
    /// Build a set from code fragments; blank fragments are ignored
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codes = codes
            .into_iter()
            .map(Into::into)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unique()
            .collect();
        Self { codes }
    }

    /// Codes `prefix` + two-digit number, e.g. `range("T", 80..=87)` is
    /// `T80`..`T87`
    #[must_use]
    pub fn range(prefix: &str, numbers: RangeInclusive<u32>) -> Self {
        Self::new(numbers.map(|n| format!("{prefix}{n:02}")))
    }

    /// The same set without one code
    #[must_use]
    pub fn without(mut self, code: &str) -> Self {
        self.codes.retain(|c| c != code);
        self
    }

    #[must_use]
    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    /// Whether the field contains any code of the set (case-sensitive)
    #[must_use]
    pub fn matches(&self, field: &str) -> bool {
        self.codes.iter().any(|code| field.contains(code.as_str()))
    }

    /// Procedural complication codes T80-T87
    #[must_use]
    pub fn complications() -> Self {
        Self::range("T", 80..=87)
    }

    /// Substance use codes F10-F16 and F18-F19
    #[must_use]
    pub fn drug_alcohol_disorders() -> Self {
        Self::range("F", 10..=19).without("F17")
    }

    /// Psychotic, mood and anxiety disorder blocks F2x, F3x, F4x
    #[must_use]
    pub fn mental_illnesses() -> Self {
        Self::new(["F2", "F3", "F4"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_zero_padded() {
        let set = CodeSet::range("F", 5..=6);
        assert_eq!(set.codes(), &["F05".to_string(), "F06".to_string()]);
    }

    #[test]
    fn complication_codes_span_t80_to_t87() {
        let set = CodeSet::complications();
        assert!(set.matches("T81.4"));
        assert!(set.matches("I10, T87"));
        assert!(!set.matches("T79"));
        assert!(!set.matches("T88.0"));
    }

    #[test]
    fn tobacco_is_not_a_drug_alcohol_disorder() {
        let set = CodeSet::drug_alcohol_disorders();
        assert!(!set.matches("F17.2"));
        assert!(!set.matches("F17"));
        assert!(set.matches("F17.2;F10.2"));
        assert!(set.matches("F19"));
        assert_eq!(set.codes().len(), 9);
    }

    #[test]
    fn matching_is_substring_and_case_sensitive() {
        let set = CodeSet::mental_illnesses();
        assert!(set.matches("XF2"));
        assert!(set.matches("F41.1"));
        assert!(!set.matches("f41.1"));
        assert!(!set.matches("NONE"));
    }
}
