//! Report output
//!
//! Four files per report: the full report as JSON, a plain-text summary,
//! the coefficient table as CSV, and the analysis record set as Parquet.

use arrow::csv::WriterBuilder;
use arrow::record_batch::RecordBatch;
use arrow_schema::FieldRef;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use serde_arrow::schema::{SchemaLike, TracingOptions};
use std::fmt::Write as _;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::{OutcomeModel, Report};
use crate::algorithm::selection::{CoefficientEstimate, ModelResult};
use crate::algorithm::stats::TestResult;
use crate::error::util::{ensure_directory, safe_create_file};
use crate::error::Result;
use crate::models::{AnalysisRecord, AnalysisRow};
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Paths written for one report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFiles {
    pub json: PathBuf,
    pub text: PathBuf,
    pub coefficients: PathBuf,
    pub analysis: PathBuf,
}

impl ReportFiles {
    #[must_use]
    pub fn in_dir(dir: &Path, report: &str) -> Self {
        Self {
            json: dir.join(format!("{report}.json")),
            text: dir.join(format!("{report}.txt")),
            coefficients: dir.join(format!("{report}_coefficients.csv")),
            analysis: dir.join(format!("{report}_analysis.parquet")),
        }
    }
}

/// Write all outputs of a report into `dir`
pub fn write_report(report: &Report, dir: &Path) -> Result<ReportFiles> {
    ensure_directory(dir, "report output")?;
    let files = ReportFiles::in_dir(dir, &report.name);

    write_json(report, &files.json)?;
    write_text(report, &files.text)?;
    write_coefficients_csv(report, &files.coefficients)?;
    write_analysis_parquet(&report.records, &files.analysis)?;

    Ok(files)
}

/// Serialize the full report
pub fn write_json(report: &Report, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(safe_create_file(path, "JSON report")?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush()?;
    Ok(())
}

/// Write the plain-text summary
pub fn write_text(report: &Report, path: &Path) -> Result<()> {
    let mut file = safe_create_file(path, "text report")?;
    file.write_all(render_text(report).as_bytes())?;
    Ok(())
}

/// One row of the coefficient CSV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientRow {
    pub outcome: String,
    pub family: String,
    /// `round_one` or `final`
    pub round: String,
    pub term: String,
    pub estimate: f64,
    pub std_error: f64,
    pub statistic: f64,
    pub p_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub effect: f64,
    pub effect_lower: f64,
    pub effect_upper: f64,
}

impl CoefficientRow {
    fn new(model: &ModelResult, round: &str, estimate: &CoefficientEstimate) -> Self {
        Self {
            outcome: model.outcome.name().to_string(),
            family: model.family.to_string(),
            round: round.to_string(),
            term: estimate.term.clone(),
            estimate: estimate.estimate,
            std_error: estimate.std_error,
            statistic: estimate.statistic,
            p_value: estimate.p_value,
            ci_lower: estimate.ci_lower,
            ci_upper: estimate.ci_upper,
            effect: estimate.effect,
            effect_lower: estimate.effect_lower,
            effect_upper: estimate.effect_upper,
        }
    }

    /// Round-1 and final coefficients of every fitted outcome
    #[must_use]
    pub fn from_report(report: &Report) -> Vec<Self> {
        let mut rows = Vec::new();
        for model in &report.models {
            let OutcomeModel::Fitted(model) = model else {
                continue;
            };
            rows.extend(
                model
                    .round_one_coefficients
                    .iter()
                    .map(|c| Self::new(model, "round_one", c)),
            );
            rows.push(Self::new(model, "final", &model.intercept));
            rows.extend(model.coefficients.iter().map(|c| Self::new(model, "final", c)));
        }
        rows
    }

    pub fn to_record_batch(rows: &[Self]) -> Result<RecordBatch> {
        let fields = Vec::<FieldRef>::from_type::<Self>(TracingOptions::default())?;
        Ok(serde_arrow::to_record_batch(&fields, &rows)?)
    }
}

/// Write the coefficient table as CSV
pub fn write_coefficients_csv(report: &Report, path: &Path) -> Result<()> {
    let batch = CoefficientRow::to_record_batch(&CoefficientRow::from_report(report))?;
    let file = safe_create_file(path, "coefficient table")?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer.write(&batch)?;
    Ok(())
}

/// Export the analysis record set
pub fn write_analysis_parquet(records: &[AnalysisRecord], path: &Path) -> Result<()> {
    let start = Instant::now();
    log_operation_start("Writing analysis records to", path);

    let batch = AnalysisRow::to_record_batch(records)?;
    let file = safe_create_file(path, "analysis record export")?;
    let properties = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(properties))?;
    writer.write(&batch)?;
    writer.close()?;

    log_operation_complete("wrote", path, records.len(), Some(start.elapsed()));
    Ok(())
}

fn format_p(p: Option<f64>) -> String {
    match p {
        Some(p) if p < 0.001 => "<0.001".to_string(),
        Some(p) => format!("{p:.3}"),
        None => "n/a".to_string(),
    }
}

fn format_test(test: &TestResult) -> String {
    let mut line = format!("{} ({})", test.method, test.alternative);
    if let Some(statistic) = test.statistic {
        let _ = write!(line, " stat={statistic:.3}");
    }
    if let Some(df) = test.df {
        let _ = write!(line, " df={df}");
    }
    let _ = write!(line, " p={}", format_p(test.p_value));
    for warning in &test.warnings {
        let _ = write!(line, " [warning: {warning}]");
    }
    line
}

fn format_option(value: Option<f64>, digits: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.digits$}"))
}

/// Plain-text summary of a report
#[must_use]
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    let s = &report.summary;

    let _ = writeln!(out, "Report: {}", report.name);
    let _ = writeln!(out, "Generated: {}", report.generated_at.to_rfc3339());
    let _ = writeln!(out, "Specialties: {}", report.specialties.join(", "));
    let _ = writeln!(
        out,
        "Rows read: {}, outside allow-list: {}, rejected: {}, analysed: {} (domiciled {}, homeless {})",
        s.total_rows,
        s.excluded_by_specialty,
        s.rejected,
        s.retained,
        s.retained_domiciled,
        s.retained_homeless
    );
    for rejection in &report.rejections {
        let _ = writeln!(out, "  rejected: {rejection}");
    }

    let _ = writeln!(out, "\nCohort");
    let _ = writeln!(
        out,
        "{:<10} {:>6} {:>7} {:>13} {:>18} {:>7}",
        "group", "n", "male%", "age mean(sd)", "LOS median[IQR]", "ICU%"
    );
    for g in &report.cohort {
        let _ = writeln!(
            out,
            "{:<10} {:>6} {:>7} {:>13} {:>18} {:>7}",
            g.housing_status.label(),
            g.admissions,
            format_option(g.male_percent, 1),
            format!(
                "{}({})",
                format_option(g.age_mean, 1),
                format_option(g.age_sd, 1)
            ),
            format!(
                "{}[{}-{}]",
                format_option(g.length_of_stay_median, 1),
                format_option(g.length_of_stay_q1, 1),
                format_option(g.length_of_stay_q3, 1)
            ),
            format_option(g.icu_admission_percent, 1),
        );
    }

    let sections = [
        ("Outcomes by housing status", &report.outcome_tables),
        ("Confounders by housing status", &report.confounder_tables),
    ];
    for (title, tables) in sections {
        let _ = writeln!(out, "\n{title}");
        for table in tables {
            render_association(&mut out, table);
        }
    }

    let _ = writeln!(out, "\nSpecialty distribution");
    render_association(&mut out, &report.specialty_distribution.association);
    for cell in &report.specialty_distribution.residuals {
        let _ = writeln!(
            out,
            "    {:<8} {:<10} obs={:>5} exp={:>8.2} resid={:>7.3} p_adj={}",
            cell.row,
            cell.column,
            cell.observed,
            cell.expected,
            cell.residual,
            format_p(Some(cell.adjusted_p_value))
        );
    }

    let _ = writeln!(out, "\nModels");
    for model in &report.models {
        match model {
            OutcomeModel::Fitted(result) => render_model(&mut out, result),
            OutcomeModel::Failed(failure) => {
                let _ = writeln!(
                    out,
                    "{}: FAILED ({}) with predictors [{}]",
                    failure.outcome,
                    failure.reason,
                    failure
                        .predictors
                        .iter()
                        .map(|p| p.name())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }
    }
    out
}

fn render_association(out: &mut String, table: &super::AssociationTable) {
    let _ = writeln!(out, "  {}", table.variable);
    for (r, label) in table.table.row_labels.iter().enumerate() {
        let _ = writeln!(
            out,
            "    {:<12} domiciled {:>5} ({:>5.1}%)  homeless {:>5} ({:>5.1}%)  total {:>5}",
            label,
            table.table.count(r, 0),
            table.proportions[r][0] * 100.0,
            table.table.count(r, 1),
            table.proportions[r][1] * 100.0,
            table.row_totals[r]
        );
    }
    for test in &table.tests {
        let _ = writeln!(out, "    {}", format_test(test));
    }
}

fn render_model(out: &mut String, model: &ModelResult) {
    let _ = writeln!(
        out,
        "{} ({}, n={}, threshold {})",
        model.outcome, model.family, model.fit.observations, model.threshold
    );
    let _ = writeln!(
        out,
        "    {:<28} {:>9} {:>9} {:>21} {:>8}",
        "term",
        "estimate",
        "exp",
        format!("{:.0}% CI (exp)", model.confidence_level * 100.0),
        "p"
    );
    for c in std::iter::once(&model.intercept).chain(&model.coefficients) {
        let _ = writeln!(
            out,
            "    {:<28} {:>9.4} {:>9.3} {:>21} {:>8}",
            c.term,
            c.estimate,
            c.effect,
            format!("{:.3}-{:.3}", c.effect_lower, c.effect_upper),
            format_p(Some(c.p_value))
        );
    }
    for dropped in &model.dropped {
        let _ = writeln!(
            out,
            "    dropped {} (round 1 p={})",
            dropped.predictor,
            format_p(Some(dropped.p_value))
        );
    }
    for warning in &model.warnings {
        let _ = writeln!(out, "    warning: {warning}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(round: &str, term: &str, estimate: f64) -> CoefficientRow {
        CoefficientRow {
            outcome: "complication".to_string(),
            family: "logistic".to_string(),
            round: round.to_string(),
            term: term.to_string(),
            estimate,
            std_error: 0.2,
            statistic: estimate / 0.2,
            p_value: 0.01,
            ci_lower: estimate - 0.4,
            ci_upper: estimate + 0.4,
            effect: estimate.exp(),
            effect_lower: (estimate - 0.4).exp(),
            effect_upper: (estimate + 0.4).exp(),
        }
    }

    #[test]
    fn coefficient_rows_convert_to_a_batch() {
        let rows = vec![
            row("round_one", "(intercept)", -1.5),
            row("final", "housing_status[homeless]", 0.8),
        ];
        let batch = CoefficientRow::to_record_batch(&rows).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert!(batch.schema().field_with_name("term").is_ok());
        assert!(batch.schema().field_with_name("effect_upper").is_ok());
    }

    #[test]
    fn empty_coefficient_table_converts() {
        let batch = CoefficientRow::to_record_batch(&[]).unwrap();
        assert_eq!(batch.num_rows(), 0);
    }
}
