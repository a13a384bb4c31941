//! Reports from sheets on disk to written outputs

use std::fs;
use std::path::Path;

use surgical_outcomes::algorithm::selection::{ModelSpec, default_predictors};
use surgical_outcomes::loader::{read_csv, read_parquet};
use surgical_outcomes::models::{AnalysisRow, Variable};
use surgical_outcomes::report::render_text;
use surgical_outcomes::utils::test::{sheet_to_csv, synthetic_cohort};
use surgical_outcomes::{
    AnalysisConfig, AnalysisError, FailurePolicy, OutcomeModel, ReportConfig, ReportRunner,
    SheetConfig, load_sheets, write_report,
};
use tempfile::TempDir;

const HEADERS: [&str; 7] = [
    "sex",
    "age",
    "associated_diagnosis_codes",
    "specialty",
    "length_of_stay",
    "icu_hours",
    "discharge_status",
];

fn config_in(dir: &Path, seed: u64, per_group: usize) -> AnalysisConfig {
    let sheets = synthetic_cohort(seed, per_group)
        .iter()
        .map(|sheet| {
            let path = dir.join(format!("{}.csv", sheet.name));
            fs::write(&path, sheet_to_csv(sheet, &HEADERS)).unwrap();
            SheetConfig {
                name: sheet.name.clone(),
                path,
                housing_status: sheet.housing_status,
            }
        })
        .collect();
    AnalysisConfig {
        sheets,
        output_dir: dir.join("output"),
        threads: Some(2),
        ..AnalysisConfig::default()
    }
}

/// Orthopaedic report that wrongly keeps the specialty group, which is
/// constant once only OT1 and OT2 remain
fn orthopaedic_with_specialty_group() -> ReportConfig {
    let mut report = ReportConfig::orthopaedic();
    report.outcomes = vec![
        ModelSpec::new(Variable::LengthOfStay, default_predictors()),
        ModelSpec::new(
            Variable::Complication,
            default_predictors()
                .into_iter()
                .filter(|&p| p != Variable::SpecialtyGroup)
                .collect(),
        ),
    ];
    report
}

#[tokio::test]
async fn test_default_reports_are_written() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path(), 51, 400);
    config.validate().unwrap();

    let sheets = load_sheets(&config.sheets, &config.column_aliases).await.unwrap();
    let reports = ReportRunner::new(&config).unwrap().run(&sheets).unwrap();
    assert_eq!(reports.len(), 2);

    let general = &reports[0];
    assert_eq!(general.name, "general");
    assert_eq!(general.models.len(), 6);
    assert!(general.model(Variable::Complication).is_some());
    assert!(general.model(Variable::LengthOfStay).is_some());
    assert_eq!(general.summary.total_rows, 800);
    assert!(general.summary.excluded_specialties.contains("PSY"));

    let orthopaedic = &reports[1];
    assert_eq!(orthopaedic.models.len(), 3);
    assert!(orthopaedic
        .records
        .iter()
        .all(|r| r.specialty == "OT1" || r.specialty == "OT2"));
    assert!(orthopaedic.summary.retained < general.summary.retained);

    for report in &reports {
        let files = write_report(report, &config.output_dir).unwrap();
        for path in [&files.json, &files.text, &files.coefficients, &files.analysis] {
            assert!(path.is_file(), "{} was not written", path.display());
        }

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&files.json).unwrap()).unwrap();
        assert_eq!(json["name"], report.name.as_str());
        assert_eq!(json["models"].as_array().unwrap().len(), report.models.len());
        assert!(json.get("records").is_none());

        let rows: usize = read_parquet(&files.analysis)
            .unwrap()
            .iter()
            .map(|batch| AnalysisRow::from_record_batch(batch).unwrap().len())
            .sum();
        assert_eq!(rows, report.summary.retained);

        let coefficients = read_csv(&files.coefficients).unwrap();
        assert!(coefficients.iter().map(|b| b.num_rows()).sum::<usize>() > 0);
        assert!(coefficients[0].schema().field_with_name("term").is_ok());

        let text = fs::read_to_string(&files.text).unwrap();
        assert_eq!(text, render_text(report));
    }
}

#[test]
fn test_failed_outcome_is_recorded_and_others_still_fit() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(dir.path(), 52, 300);
    config.reports = vec![orthopaedic_with_specialty_group()];
    config.on_model_error = FailurePolicy::Continue;

    let sheets = tokio_free_load(&config);
    let runner = ReportRunner::new(&config).unwrap();
    let report = runner.run_report(&config.reports[0], &sheets).unwrap();

    assert!(report.has_failures());
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].outcome, Variable::LengthOfStay);
    assert!(failures[0].reason.contains("specialty_group"));
    assert!(matches!(report.models[1], OutcomeModel::Fitted(_)));
}

#[test]
fn test_abort_policy_stops_at_failed_outcome() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(dir.path(), 53, 300);
    config.reports = vec![orthopaedic_with_specialty_group()];
    config.on_model_error = FailurePolicy::Abort;

    let sheets = tokio_free_load(&config);
    let runner = ReportRunner::new(&config).unwrap();
    match runner.run_report(&config.reports[0], &sheets) {
        Err(AnalysisError::Model(error)) => assert_eq!(error.outcome, Variable::LengthOfStay),
        other => panic!("expected a model error, got {other:?}"),
    }
}

fn tokio_free_load(config: &AnalysisConfig) -> Vec<surgical_outcomes::RawSheet> {
    config
        .sheets
        .iter()
        .map(|sheet| surgical_outcomes::load_sheet(sheet, &config.column_aliases).unwrap())
        .collect()
}
