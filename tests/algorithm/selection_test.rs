//! Two-round backward elimination on the synthetic cohort

use std::collections::BTreeSet;

use surgical_outcomes::algorithm::features::{DerivationRules, FeatureDeriver, SURGICAL_SPECIALTIES};
use surgical_outcomes::algorithm::selection::{
    ModelFamily, ModelSpec, default_predictors, fitting_set, select_model,
};
use surgical_outcomes::models::{AnalysisRecord, HousingStatus, Variable};
use surgical_outcomes::utils::test::{analysis_record, synthetic_cohort};
use surgical_outcomes::{AnalysisError, FitOptions, ModelFailure};

fn cohort_records(seed: u64, per_group: usize) -> Vec<AnalysisRecord> {
    let allow: Vec<String> = SURGICAL_SPECIALTIES.iter().map(|s| s.to_string()).collect();
    let derivation =
        FeatureDeriver::new(&DerivationRules::default(), &allow).derive(&synthetic_cohort(seed, per_group));
    derivation.records.to_vec()
}

fn failure_of(result: surgical_outcomes::Result<impl std::fmt::Debug>) -> ModelFailure {
    match result {
        Err(AnalysisError::Model(error)) => error.failure,
        other => panic!("expected a model error, got {other:?}"),
    }
}

#[test]
fn test_threshold_one_retains_every_predictor() {
    let records = cohort_records(21, 400);
    let spec = ModelSpec::new(Variable::Complication, default_predictors()).with_threshold(1.0);
    let result = select_model(&records, &spec, &FitOptions::default()).unwrap();

    assert_eq!(result.retained, default_predictors());
    assert!(result.dropped.is_empty());
    assert_eq!(result.coefficients, result.round_one_coefficients[1..]);
    assert_eq!(result.family, ModelFamily::Logistic);
}

#[test]
fn test_threshold_zero_reports_intercept_only_model() {
    let records = cohort_records(22, 400);
    let spec = ModelSpec::new(Variable::LengthOfStay, default_predictors()).with_threshold(0.0);
    let result = select_model(&records, &spec, &FitOptions::default()).unwrap();

    assert!(result.is_intercept_only());
    assert!(result.coefficients.is_empty());
    assert_eq!(result.dropped.len(), default_predictors().len());
    assert!(!result.warnings.is_empty());

    let (_, response) = fitting_set(&records, Variable::LengthOfStay, ModelFamily::LogLinear);
    let mean = response.sum() / response.len() as f64;
    assert!((result.intercept.estimate - mean).abs() < 1e-9);
}

#[test]
fn test_threshold_zero_drops_even_overwhelming_predictors() {
    // homeless stays are roughly ten times longer than domiciled stays
    let records: Vec<AnalysisRecord> = (0..400)
        .map(|row| {
            let mut record = analysis_record(row);
            record.age = 20.0 + (row % 50) as f64;
            record.length_of_stay = (3 + row % 4) as f64;
            if row % 2 == 1 {
                record.housing_status = HousingStatus::Homeless;
                record.length_of_stay *= 10.0;
            }
            record
        })
        .collect();
    let spec = ModelSpec::new(
        Variable::LengthOfStay,
        vec![Variable::HousingStatus, Variable::Age],
    )
    .with_threshold(0.0);
    let result = select_model(&records, &spec, &FitOptions::default()).unwrap();

    let housing = result.round_one_test(Variable::HousingStatus).unwrap();
    assert!(housing.p_value < 1e-12);
    assert!(result.retained.is_empty());
    assert!(result.is_intercept_only());
    assert_eq!(result.dropped.len(), 2);
}

#[test]
fn test_dropped_set_is_exactly_round_one_above_threshold() {
    let records = cohort_records(23, 400);
    for outcome in [Variable::Complication, Variable::LengthOfStay] {
        let spec = ModelSpec::new(outcome, default_predictors());
        let result = select_model(&records, &spec, &FitOptions::default()).unwrap();

        let above: BTreeSet<&str> = result
            .round_one
            .iter()
            .filter(|t| t.p_value > spec.threshold)
            .map(|t| t.predictor.name())
            .collect();
        let dropped: BTreeSet<&str> = result.dropped.iter().map(|d| d.predictor.name()).collect();
        assert_eq!(above, dropped);

        let expected: Vec<Variable> = spec
            .predictors
            .iter()
            .copied()
            .filter(|p| !dropped.contains(p.name()))
            .collect();
        assert_eq!(result.retained, expected);
        for coefficient in &result.coefficients {
            let predictor = coefficient.predictor.unwrap();
            assert!(result.retains(predictor));
        }
    }
}

#[test]
fn test_housing_status_is_retained_for_complications() {
    let records = cohort_records(24, 500);
    let spec = ModelSpec::new(Variable::Complication, default_predictors());
    let result = select_model(&records, &spec, &FitOptions::default()).unwrap();

    assert!(result.retains(Variable::HousingStatus));
    let term = result.coefficient("housing_status[homeless]").unwrap();
    assert!(term.estimate > 0.0);
    assert!((term.effect - term.estimate.exp()).abs() < 1e-12);
    assert!(term.ci_lower < term.estimate && term.estimate < term.ci_upper);
}

#[test]
fn test_specialty_group_is_tested_jointly() {
    let records = cohort_records(25, 300);
    let spec = ModelSpec::new(Variable::LengthOfStay, default_predictors()).with_threshold(1.0);
    let result = select_model(&records, &spec, &FitOptions::default()).unwrap();

    let groups: BTreeSet<&str> = records.iter().map(|r| r.specialty_group.as_str()).collect();
    let test = result.round_one_test(Variable::SpecialtyGroup).unwrap();
    assert_eq!(test.df, groups.len() - 1);
    assert_eq!(test.terms.len(), test.df);
    assert!((0.0..=1.0).contains(&test.p_value));
}

#[test]
fn test_icu_hours_model_uses_only_icu_admissions() {
    let records = cohort_records(26, 500);
    let spec = ModelSpec::new(Variable::IcuHours, default_predictors()).with_threshold(1.0);
    let result = select_model(&records, &spec, &FitOptions::default()).unwrap();

    let admitted = records.iter().filter(|r| r.icu_hours > 0.0).count();
    assert_eq!(result.fit.observations, admitted);
    assert!(admitted < records.len());
    assert_eq!(result.family, ModelFamily::LogLinear);
}

#[test]
fn test_selection_is_deterministic() {
    let records = cohort_records(27, 200);
    let spec = ModelSpec::new(Variable::Complication, default_predictors());
    let first = select_model(&records, &spec, &FitOptions::default()).unwrap();
    let second = select_model(&records, &spec, &FitOptions::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_constant_outcome_fails() {
    let records: Vec<AnalysisRecord> = (0..50)
        .map(|row| {
            let mut record = analysis_record(row);
            record.age = 20.0 + row as f64;
            record
        })
        .collect();
    let spec = ModelSpec::new(Variable::Mortality, vec![Variable::Age]);
    assert_eq!(
        failure_of(select_model(&records, &spec, &FitOptions::default())),
        ModelFailure::ZeroVarianceOutcome
    );
}

#[test]
fn test_constant_predictor_fails() {
    let records: Vec<AnalysisRecord> = (0..50)
        .map(|row| {
            let mut record = analysis_record(row);
            record.age = 20.0 + row as f64;
            record.complication = row % 3 == 0;
            record
        })
        .collect();
    let spec = ModelSpec::new(
        Variable::Complication,
        vec![Variable::Age, Variable::SpecialtyGroup],
    );
    assert_eq!(
        failure_of(select_model(&records, &spec, &FitOptions::default())),
        ModelFailure::ZeroVariancePredictor(Variable::SpecialtyGroup)
    );
}

#[test]
fn test_invalid_specs_fail_before_fitting() {
    let records = vec![analysis_record(0)];
    let family_mismatch = ModelSpec::new(Variable::Mortality, vec![Variable::Age])
        .with_family(ModelFamily::LogLinear);
    let self_predicting = ModelSpec::new(Variable::LengthOfStay, vec![Variable::LengthOfStay]);
    let age_outcome = ModelSpec::new(Variable::Age, vec![Variable::Sex]);

    for spec in [family_mismatch, self_predicting, age_outcome] {
        assert!(matches!(
            failure_of(select_model(&records, &spec, &FitOptions::default())),
            ModelFailure::InvalidSpec(_)
        ));
    }
}
