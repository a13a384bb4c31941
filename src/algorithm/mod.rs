//! Analysis algorithms
//!
//! Feature derivation from raw admissions, stepwise model selection, and the
//! statistical routines both of them rely on.

pub mod features;
pub mod selection;
pub mod stats;
