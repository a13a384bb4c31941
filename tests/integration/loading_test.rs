//! Loading sheets from CSV and Parquet

use std::fs;
use std::path::Path;

use parquet::arrow::ArrowWriter;
use surgical_outcomes::config::default_column_aliases;
use surgical_outcomes::models::{HousingStatus, RawSheet};
use surgical_outcomes::utils::arrow::admissions_to_batch;
use surgical_outcomes::utils::test::{sheet_to_csv, synthetic_cohort};
use surgical_outcomes::{AnalysisError, SheetConfig, load_sheet, load_sheets};
use tempfile::TempDir;

const EXPORT_HEADERS: [&str; 7] = [
    "Gender",
    "Age",
    "Associated Diagnosis Codes",
    "Specialty",
    "LOS",
    "ICU Hours",
    "Discharge Status",
];

fn sheet_config(sheet: &RawSheet, path: &Path) -> SheetConfig {
    SheetConfig {
        name: sheet.name.clone(),
        path: path.to_path_buf(),
        housing_status: sheet.housing_status,
    }
}

#[test]
fn test_csv_sheet_with_aliased_headers() {
    let dir = TempDir::new().unwrap();
    let original = synthetic_cohort(41, 120).remove(1);
    let path = dir.path().join("homeless.csv");
    fs::write(&path, sheet_to_csv(&original, &EXPORT_HEADERS)).unwrap();

    let loaded = load_sheet(&sheet_config(&original, &path), &default_column_aliases()).unwrap();
    assert_eq!(loaded.housing_status, HousingStatus::Homeless);
    assert_eq!(loaded, original);
}

#[test]
fn test_missing_required_column_is_a_schema_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.csv");
    fs::write(&path, "Sex,Age,LOS,ICU Hours,Discharge Status\nF,50,3,,Home\n").unwrap();

    let config = SheetConfig {
        name: "broken".to_string(),
        path,
        housing_status: HousingStatus::Domiciled,
    };
    let error = load_sheet(&config, &default_column_aliases()).unwrap_err();
    match error {
        AnalysisError::Schema(message) => assert!(message.contains("specialty")),
        other => panic!("expected a schema error, got {other:?}"),
    }
}

#[test]
fn test_missing_recoverable_columns_read_as_blank() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("partial.csv");
    fs::write(&path, "Sex,Age,Specialty,LOS,Discharge Status\nM,61,URO,5,Home\nF,44,NS,2,Died\n")
        .unwrap();

    let config = SheetConfig {
        name: "partial".to_string(),
        path,
        housing_status: HousingStatus::Domiciled,
    };
    let loaded = load_sheet(&config, &default_column_aliases()).unwrap();
    assert_eq!(loaded.len(), 2);
    assert!(loaded.rows.iter().all(|r| r.icu_hours.is_none()));
    assert!(loaded.rows.iter().all(|r| r.associated_diagnosis_codes.is_none()));
    assert_eq!(loaded.rows[1].row, 1);
    assert_eq!(loaded.rows[1].discharge_status.as_deref(), Some("Died"));
}

#[test]
fn test_parquet_sheet() {
    let dir = TempDir::new().unwrap();
    let original = synthetic_cohort(42, 80).remove(0);
    let path = dir.path().join("domiciled.parquet");

    let batch = admissions_to_batch(&original.rows).unwrap();
    let file = fs::File::create(&path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let loaded = load_sheet(&sheet_config(&original, &path), &default_column_aliases()).unwrap();
    assert_eq!(loaded, original);
}

#[tokio::test]
async fn test_sheets_load_concurrently_in_configuration_order() {
    let dir = TempDir::new().unwrap();
    let cohort = synthetic_cohort(43, 60);
    let configs: Vec<SheetConfig> = cohort
        .iter()
        .map(|sheet| {
            let path = dir.path().join(format!("{}.csv", sheet.name));
            fs::write(&path, sheet_to_csv(sheet, &EXPORT_HEADERS)).unwrap();
            sheet_config(sheet, &path)
        })
        .collect();

    let loaded = load_sheets(&configs, &default_column_aliases()).await.unwrap();
    assert_eq!(loaded, cohort);
}

#[tokio::test]
async fn test_one_missing_file_fails_the_load() {
    let dir = TempDir::new().unwrap();
    let configs = vec![SheetConfig {
        name: "absent".to_string(),
        path: dir.path().join("absent.csv"),
        housing_status: HousingStatus::Homeless,
    }];
    let result = load_sheets(&configs, &default_column_aliases()).await;
    assert!(matches!(result, Err(AnalysisError::Io { .. })));
}
