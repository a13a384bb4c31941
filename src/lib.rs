//! Surgical admission outcomes by housing status.
//!
//! Loads per-group admission sheets, derives outcome and exposure features,
//! fits two-round backward-elimination regressions per outcome, and builds
//! association tables comparing homeless and domiciled admissions.

pub mod algorithm;
pub mod cli;
pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod report;
pub mod utils;

// Core types
pub use config::{AnalysisConfig, FailurePolicy, ReportConfig, SheetConfig, TableOptions};
pub use error::{AnalysisError, ModelError, ModelFailure, Result};
pub use models::{AnalysisRecord, HousingStatus, RawSheet, RecordRejection, Variable};

// Pipeline stages
pub use algorithm::features::{Derivation, DerivationRules, DerivationSummary, FeatureDeriver};
pub use algorithm::selection::{ModelFamily, ModelResult, ModelSpec, select_model};
pub use algorithm::stats::FitOptions;
pub use loader::{load_sheet, load_sheets};
pub use report::{OutcomeModel, Report, ReportRunner, write_report};

// Arrow types
pub use arrow::record_batch::RecordBatch;
