//! Shared utilities: Arrow extraction, logging and test fixtures

pub mod arrow;
pub mod logging;
pub mod test;
