//! Outcome and distribution tables

use surgical_outcomes::algorithm::features::{DerivationRules, FeatureDeriver, SURGICAL_SPECIALTIES};
use surgical_outcomes::algorithm::stats::{Alternative, adjusted_residuals};
use surgical_outcomes::config::TableOptions;
use surgical_outcomes::models::{AnalysisRecord, HousingStatus, RawSheet, Variable};
use surgical_outcomes::report::tables::{
    AssociationTable, confounder_tables, crosstab, outcome_tables, specialty_distribution,
};
use surgical_outcomes::utils::test::{raw_admission, synthetic_cohort};

/// `per_group` admissions per housing group; `homeless_events` homeless
/// admissions carry a complication code, no domiciled admission does
fn complication_cohort(per_group: usize, homeless_events: usize) -> Vec<AnalysisRecord> {
    let sheets: Vec<RawSheet> = HousingStatus::ALL
        .iter()
        .map(|&housing| {
            let mut sheet = RawSheet::new(housing.label(), housing);
            sheet.rows = (0..per_group)
                .map(|row| {
                    let mut raw = raw_admission(housing.label(), row);
                    if housing.is_homeless() && row < homeless_events {
                        raw.associated_diagnosis_codes = Some("T81.4".to_string());
                    }
                    raw
                })
                .collect();
            sheet
        })
        .collect();
    let allow: Vec<String> = SURGICAL_SPECIALTIES.iter().map(|s| s.to_string()).collect();
    FeatureDeriver::new(&DerivationRules::default(), &allow)
        .derive(&sheets)
        .records
        .to_vec()
}

fn complication_table(records: &[AnalysisRecord]) -> AssociationTable {
    outcome_tables(records, true)
        .unwrap()
        .into_iter()
        .find(|t| t.variable == Variable::Complication)
        .unwrap()
}

#[test]
fn test_small_complication_table() {
    let records = complication_cohort(4, 2);
    let table = complication_table(&records);

    assert_eq!(table.table.row_labels, vec!["true", "false"]);
    assert_eq!(table.count("true", HousingStatus::Domiciled), Some(0));
    assert_eq!(table.count("true", HousingStatus::Homeless), Some(2));
    assert_eq!(table.count("false", HousingStatus::Domiciled), Some(4));
    assert_eq!(table.count("false", HousingStatus::Homeless), Some(2));
    assert_eq!(table.column_totals, vec![4, 4]);

    let chi_square = table.chi_square().unwrap();
    assert!(!chi_square.warnings.is_empty());

    let greater = table.fisher(Alternative::Greater).unwrap().p_value.unwrap();
    assert!((greater - 6.0 / 28.0).abs() < 1e-9);
}

#[test]
fn test_homeless_lower_alternative_does_not_reject() {
    let records = complication_cohort(4, 2);
    let table = crosstab(&records, Variable::Complication).unwrap();
    let less = surgical_outcomes::algorithm::stats::fisher_exact_test(&table, Alternative::Less)
        .unwrap();
    assert!(!less.rejects_at(0.05));
    assert!((less.p_value.unwrap() - 1.0).abs() < 1e-9);
}

#[test]
fn test_greater_p_value_shrinks_as_groups_grow() {
    let small = complication_table(&complication_cohort(4, 2));
    let large = complication_table(&complication_cohort(8, 4));

    let small_p = small.fisher(Alternative::Greater).unwrap().p_value.unwrap();
    let large_p = large.fisher(Alternative::Greater).unwrap().p_value.unwrap();
    assert!(large_p < small_p);
    assert!((large_p - 70.0 / 1820.0).abs() < 1e-9);
}

#[test]
fn test_tables_cover_every_retained_record() {
    let allow: Vec<String> = SURGICAL_SPECIALTIES.iter().map(|s| s.to_string()).collect();
    let derivation = FeatureDeriver::new(&DerivationRules::default(), &allow)
        .derive(&synthetic_cohort(31, 300));
    let records = &derivation.records;

    let confounders = confounder_tables(records, &TableOptions::default()).unwrap();
    assert_eq!(confounders.len(), TableOptions::default().confounders.len());
    for table in &confounders {
        assert_eq!(table.table.total() as usize, records.len());
        let fisher = table.fisher(Alternative::TwoSided);
        assert_eq!(fisher.is_some(), table.table.rows() == 2);
    }

    let sex = confounders.iter().find(|t| t.variable == Variable::Sex).unwrap();
    assert_eq!(sex.table.row_labels, vec!["M", "F"]);
}

#[test]
fn test_specialty_residuals_mirror_across_housing_groups() {
    let allow: Vec<String> = SURGICAL_SPECIALTIES.iter().map(|s| s.to_string()).collect();
    let derivation = FeatureDeriver::new(&DerivationRules::default(), &allow)
        .derive(&synthetic_cohort(32, 300));
    let distribution = specialty_distribution(&derivation.records, true).unwrap();
    let table = &distribution.association.table;

    assert_eq!(distribution.residuals.len(), table.rows() * table.columns());
    assert_eq!(distribution.residuals, adjusted_residuals(table).unwrap());
    for label in &table.row_labels {
        let cells: Vec<f64> = distribution
            .residuals
            .iter()
            .filter(|c| &c.row == label)
            .map(|c| c.residual)
            .collect();
        assert_eq!(cells.len(), 2);
        assert!((cells[0] + cells[1]).abs() < 1e-9);
    }
    for cell in &distribution.residuals {
        assert!(cell.adjusted_p_value >= cell.p_value);
        assert!(cell.adjusted_p_value <= 1.0);
    }
}
