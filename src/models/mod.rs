//! Record models
//!
//! Raw admissions as read from the sheets, analysis records produced by
//! feature derivation, and the variables that address their columns.

pub mod admission;
pub mod analysis;
pub mod variable;

pub use admission::{
    AdmissionField, AdmissionRecord, HousingStatus, RawAdmission, RawSheet, RecordRejection,
    RejectionReason, Sex,
};
pub use analysis::{AgeBand, AnalysisRecord, AnalysisRow, NO_DIAGNOSIS_CODES};
pub use variable::{Value, Variable, VariableKind};
