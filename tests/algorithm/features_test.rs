//! Feature derivation over raw sheets

use proptest::prelude::*;
use surgical_outcomes::algorithm::features::{
    CodeSet, DerivationRules, FeatureDeriver, SURGICAL_SPECIALTIES,
};
use surgical_outcomes::algorithm::selection::{ModelFamily, fitting_set};
use surgical_outcomes::models::{HousingStatus, RawAdmission, RawSheet, Variable};
use surgical_outcomes::report::tables::outcome_tables;
use surgical_outcomes::utils::test::{raw_admission, synthetic_cohort};

fn general_deriver() -> FeatureDeriver {
    let allow: Vec<String> = SURGICAL_SPECIALTIES.iter().map(|s| s.to_string()).collect();
    FeatureDeriver::new(&DerivationRules::default(), &allow)
}

fn sheet(housing: HousingStatus, rows: Vec<RawAdmission>) -> RawSheet {
    let mut sheet = RawSheet::new(housing.label(), housing);
    sheet.rows = rows;
    sheet
}

fn with_codes(row: usize, codes: &str) -> RawAdmission {
    let mut raw = raw_admission("codes", row);
    raw.associated_diagnosis_codes = Some(codes.to_string());
    raw
}

#[test]
fn test_tobacco_only_codes_do_not_flag_substance_use() {
    let rows = vec![with_codes(0, "F17.2"), with_codes(1, "F17, F17.1"), with_codes(2, "F17.2; F10.2")];
    let derivation = general_deriver().derive(&[sheet(HousingStatus::Domiciled, rows)]);

    assert!(!derivation.records[0].drug_alcohol_disorder);
    assert!(!derivation.records[1].drug_alcohol_disorder);
    assert!(derivation.records[2].drug_alcohol_disorder);
}

#[test]
fn test_psychiatric_blocks_flag_mental_illness() {
    let rows = vec![
        with_codes(0, "F20.0"),
        with_codes(1, "I10, F31.2"),
        with_codes(2, "F41"),
        with_codes(3, "F10.2"),
    ];
    let derivation = general_deriver().derive(&[sheet(HousingStatus::Homeless, rows)]);
    let flags: Vec<bool> = derivation.records.iter().map(|r| r.mental_illness).collect();
    assert_eq!(flags, vec![true, true, true, false]);
}

#[test]
fn test_missing_or_zero_icu_hours_are_not_icu_admissions() {
    let mut missing = raw_admission("icu", 0);
    missing.icu_hours = None;
    let mut zero = raw_admission("icu", 1);
    zero.icu_hours = Some("0".to_string());
    let mut some = raw_admission("icu", 2);
    some.icu_hours = Some("12".to_string());

    let derivation =
        general_deriver().derive(&[sheet(HousingStatus::Domiciled, vec![missing, zero, some])]);
    let records = &derivation.records;
    assert!(!records[0].icu_admission);
    assert!(!records[1].icu_admission);
    assert!(records[2].icu_admission);
    assert_eq!(records[0].icu_hours, 0.0);

    let (fitting, response) = fitting_set(records, Variable::IcuHours, ModelFamily::LogLinear);
    assert_eq!(fitting.len(), 1);
    assert_eq!(fitting[0].row, 2);
    assert!((response[0] - 12.0_f64.ln()).abs() < 1e-12);
}

#[test]
fn test_own_risk_discharge_flag_matches_status_exactly() {
    let mut own_risk = raw_admission("discharge", 0);
    own_risk.discharge_status = Some("Discharge at Own Risk".to_string());
    let home = raw_admission("discharge", 1);

    let derivation =
        general_deriver().derive(&[sheet(HousingStatus::Homeless, vec![own_risk, home])]);
    for record in derivation.records.iter() {
        assert_eq!(
            record.discharge_against_advice,
            record.discharge_status == "Discharge at Own Risk"
        );
    }
    assert!(derivation.records[0].discharge_against_advice);
}

#[test]
fn test_derivation_is_idempotent() {
    let sheets = synthetic_cohort(11, 150);
    let deriver = general_deriver();
    let first = deriver.derive(&sheets);
    let second = deriver.derive(&sheets);

    assert_eq!(*first.records, *second.records);
    assert_eq!(first.summary, second.summary);
    assert_eq!(first.rejections, second.rejections);
}

#[test]
fn test_excluded_specialty_is_absent_from_records_and_tables() {
    let sheets = synthetic_cohort(3, 200);
    let derivation = general_deriver().derive(&sheets);

    assert!(derivation.summary.excluded_by_specialty > 0);
    assert!(derivation.summary.excluded_specialties.contains("PSY"));
    assert!(derivation.records.iter().all(|r| r.specialty != "PSY"));

    let tables = outcome_tables(&derivation.records, true).unwrap();
    for table in &tables {
        assert_eq!(table.table.total() as usize, derivation.records.len());
    }
}

#[test]
fn test_every_row_is_accounted_for() {
    let mut sheets = synthetic_cohort(5, 100);
    sheets[0].rows[3].age = Some("unknown".to_string());
    sheets[1].rows[7].sex = None;
    sheets[1].rows[8].specialty = None;

    let derivation = general_deriver().derive(&sheets);
    let s = &derivation.summary;
    assert_eq!(s.total_rows, 200);
    assert_eq!(s.total_rows, s.excluded_by_specialty + s.rejected + s.retained);
    assert_eq!(s.retained, derivation.records.len());
    assert_eq!(s.retained, s.retained_domiciled + s.retained_homeless);
    assert_eq!(derivation.rejections.len(), s.rejected);
    assert!(
        derivation
            .rejections
            .iter()
            .any(|r| r.field == "specialty" && r.row == 8 && r.housing_status == HousingStatus::Homeless)
    );
}

#[test]
fn test_records_keep_sheet_then_row_order() {
    let sheets = synthetic_cohort(9, 60);
    let derivation = general_deriver().derive(&sheets);
    let keys: Vec<(HousingStatus, usize)> = derivation
        .records
        .iter()
        .map(|r| (r.housing_status, r.row))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

proptest! {
    #[test]
    fn prop_any_complication_code_sets_the_flag(
        prefix in "[A-Z0-9., ]{0,6}",
        number in 80u32..=87,
        suffix in "[0-9.]{0,3}",
    ) {
        let codes = format!("{prefix}T{number}{suffix}");
        prop_assert!(CodeSet::complications().matches(&codes));
    }

    #[test]
    fn prop_tobacco_codes_never_flag_substance_use(
        subcodes in proptest::collection::vec(0u32..10, 1..5),
    ) {
        let codes = subcodes
            .iter()
            .map(|d| format!("F17.{d}"))
            .collect::<Vec<_>>()
            .join(", ");
        prop_assert!(!CodeSet::drug_alcohol_disorders().matches(&codes));
    }
}
