//! Report runner
//!
//! A report derives the analysis record set for its specialty allow-list,
//! builds the association tables, and fits every configured outcome on a
//! rayon pool. Fits share the record set read-only and their results are
//! collected in configuration order.

pub mod tables;
pub mod writer;

pub use tables::{AssociationTable, GroupSummary, SpecialtyDistribution};
pub use writer::{ReportFiles, render_text, write_report};

use chrono::{DateTime, Utc};
use indicatif::{ParallelProgressIterator, ProgressBar};
use log::{error, info};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::algorithm::features::{DerivationSummary, FeatureDeriver};
use crate::algorithm::selection::{ModelResult, ModelSpec, select_model};
use crate::config::{AnalysisConfig, FailurePolicy, ReportConfig};
use crate::error::{AnalysisError, Result};
use crate::models::{AnalysisRecord, RawSheet, RecordRejection, Variable};
use crate::utils::logging::{create_main_progress_bar, finish_progress_bar, hidden_progress_bar};

/// An outcome whose model could not be fitted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeFailure {
    pub outcome: Variable,
    pub predictors: Vec<Variable>,
    pub reason: String,
}

impl OutcomeFailure {
    fn from_error(spec: &ModelSpec, error: &AnalysisError) -> Self {
        match error {
            AnalysisError::Model(model_error) => Self {
                outcome: model_error.outcome,
                predictors: model_error.predictors.clone(),
                reason: model_error.failure.to_string(),
            },
            other => Self {
                outcome: spec.outcome,
                predictors: spec.predictors.clone(),
                reason: other.to_string(),
            },
        }
    }
}

/// Result slot of one configured outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeModel {
    Fitted(ModelResult),
    Failed(OutcomeFailure),
}

impl OutcomeModel {
    #[must_use]
    pub const fn outcome(&self) -> Variable {
        match self {
            Self::Fitted(result) => result.outcome,
            Self::Failed(failure) => failure.outcome,
        }
    }
}

/// Everything produced for one report variant
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub name: String,
    pub generated_at: DateTime<Utc>,
    pub specialties: Vec<String>,
    pub summary: DerivationSummary,
    pub rejections: Vec<RecordRejection>,
    pub cohort: Vec<GroupSummary>,
    pub outcome_tables: Vec<AssociationTable>,
    pub confounder_tables: Vec<AssociationTable>,
    pub specialty_distribution: SpecialtyDistribution,
    pub models: Vec<OutcomeModel>,
    #[serde(skip)]
    pub records: Arc<[AnalysisRecord]>,
}

impl Report {
    #[must_use]
    pub fn model(&self, outcome: Variable) -> Option<&ModelResult> {
        self.models.iter().find_map(|m| match m {
            OutcomeModel::Fitted(result) if result.outcome == outcome => Some(result),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &OutcomeFailure> {
        self.models.iter().filter_map(|m| match m {
            OutcomeModel::Failed(failure) => Some(failure),
            OutcomeModel::Fitted(_) => None,
        })
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Runs report variants against loaded sheets
pub struct ReportRunner<'a> {
    config: &'a AnalysisConfig,
    pool: rayon::ThreadPool,
    show_progress: bool,
}

impl<'a> ReportRunner<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Result<Self> {
        let threads = config.threads.unwrap_or_else(num_cpus::get);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| AnalysisError::Task(format!("cannot build fit pool: {e}")))?;
        Ok(Self {
            config,
            pool,
            show_progress: false,
        })
    }

    /// Draw a progress bar while outcomes are fitted
    #[must_use]
    pub const fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Run every configured report
    pub fn run(&self, sheets: &[RawSheet]) -> Result<Vec<Report>> {
        self.config
            .reports
            .iter()
            .map(|report| self.run_report(report, sheets))
            .collect()
    }

    /// Run one report variant
    pub fn run_report(&self, report: &ReportConfig, sheets: &[RawSheet]) -> Result<Report> {
        let start = Instant::now();
        info!("Running report '{}'", report.name);

        let derivation =
            FeatureDeriver::new(&self.config.derivation, &report.specialties).derive(sheets);
        let records = Arc::clone(&derivation.records);

        let cohort = tables::cohort_summary(&records);
        let outcome_tables =
            tables::outcome_tables(&records, self.config.tables.yates_correction)?;
        let confounder_tables = tables::confounder_tables(&records, &self.config.tables)?;
        let specialty_distribution =
            tables::specialty_distribution(&records, self.config.tables.yates_correction)?;

        let models = self.fit_outcomes(report, &records)?;

        info!(
            "Report '{}' finished in {:?} ({} of {} outcomes fitted)",
            report.name,
            start.elapsed(),
            models
                .iter()
                .filter(|m| matches!(m, OutcomeModel::Fitted(_)))
                .count(),
            models.len()
        );

        Ok(Report {
            name: report.name.clone(),
            generated_at: Utc::now(),
            specialties: report.specialties.clone(),
            summary: derivation.summary,
            rejections: derivation.rejections,
            cohort,
            outcome_tables,
            confounder_tables,
            specialty_distribution,
            models,
            records,
        })
    }

    fn progress_bar(&self, report: &ReportConfig) -> ProgressBar {
        let length = report.outcomes.len() as u64;
        if self.show_progress {
            create_main_progress_bar(length, Some(&format!("fitting {}", report.name)))
        } else {
            hidden_progress_bar(length)
        }
    }

    fn fit_outcomes(
        &self,
        report: &ReportConfig,
        records: &[AnalysisRecord],
    ) -> Result<Vec<OutcomeModel>> {
        let pb = self.progress_bar(report);
        let options = &self.config.model;

        let results: Vec<Result<ModelResult>> = self.pool.install(|| {
            report
                .outcomes
                .par_iter()
                .progress_with(pb.clone())
                .map(|spec| select_model(records, spec, options))
                .collect()
        });
        finish_progress_bar(&pb, Some("done"));

        let mut models = Vec::with_capacity(results.len());
        for (spec, result) in report.outcomes.iter().zip(results) {
            match result {
                Ok(model) => models.push(OutcomeModel::Fitted(model)),
                Err(e) => {
                    error!("Report '{}': {e}", report.name);
                    if self.config.on_model_error == FailurePolicy::Abort {
                        return Err(e);
                    }
                    models.push(OutcomeModel::Failed(OutcomeFailure::from_error(spec, &e)));
                }
            }
        }
        Ok(models)
    }
}
