//! Arrow data handling utilities
//!
//! Helpers for reading sheet record batches whatever their physical column
//! types, and for turning raw admissions back into batches.

pub mod extractors;

pub use extractors::{
    ColumnMap, admissions_to_batch, extract_admissions, extract_string, normalize_column_name,
    string_column,
};
