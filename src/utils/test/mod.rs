//! Test utilities
//!
//! Fixtures shared by unit tests and the integration test harness.


pub use fixtures::{analysis_record, raw_admission, sheet_to_csv, synthetic_cohort};
