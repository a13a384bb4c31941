//! Specialty allow-list and grouping

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;

/// Surgical specialties included in the general report
pub const SURGICAL_SPECIALTIES: [&str; 12] = [
    "OT1", "OT2", "CRS", "NS", "HNO", "PLS", "CTS", "VAS", "SOC", "ENT", "URO", "GIT",
];

/// Default grouping of raw specialty codes into consolidated labels
#[must_use]
pub fn default_specialty_groups() -> BTreeMap<String, String> {
    [
        ("OT1", "OT"),
        ("OT2", "OT"),
        ("CRS", "GS"),
        ("GIT", "GS"),
        ("SOC", "GS"),
        ("HNO", "ENT"),
    ]
    .into_iter()
    .map(|(code, group)| (code.to_string(), group.to_string()))
    .collect()
}

/// Which specialties are analysed and how they are grouped
#[derive(Debug, Clone, Default)]
pub struct SpecialtyTable {
    allowed: FxHashSet<String>,
    groups: FxHashMap<String, String>,
}

impl SpecialtyTable {
    pub fn new<'a, I>(allow_list: I, groups: &BTreeMap<String, String>) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        Self {
            allowed: allow_list.into_iter().cloned().collect(),
            groups: groups
                .iter()
                .map(|(code, group)| (code.clone(), group.clone()))
                .collect(),
        }
    }

    #[must_use]
    pub fn is_allowed(&self, specialty: &str) -> bool {
        self.allowed.contains(specialty)
    }

    /// Consolidated label, the code itself when it has no group
    #[must_use]
    pub fn group(&self, specialty: &str) -> String {
        self.groups
            .get(specialty)
            .cloned()
            .unwrap_or_else(|| specialty.to_string())
    }

    #[must_use]
    pub fn allowed_count(&self) -> usize {
        self.allowed.len()
    }
}
