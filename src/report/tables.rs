//! Association tables by housing status
//!
//! Every table has housing status as its columns (`domiciled`, `homeless`)
//! and one row per level of the row variable. Binary variables put their
//! indicator level first, so a one-sided Fisher test with
//! [`Alternative::Greater`] asks whether homeless admissions have the higher
//! rate.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::algorithm::stats::descriptive::{mean, median, proportion, quantile, std_dev};
use crate::algorithm::stats::{
    Alternative, CellResidual, ContingencyTable, TestMethod, TestResult, adjusted_residuals,
    chi_square_test, fisher_exact_test,
};
use crate::config::TableOptions;
use crate::error::{AnalysisError, Result};
use crate::models::{AgeBand, AnalysisRecord, HousingStatus, Variable, VariableKind};

/// A cross-tabulation against housing status with its tests
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociationTable {
    pub variable: Variable,
    pub table: ContingencyTable,
    pub row_totals: Vec<u64>,
    pub column_totals: Vec<u64>,
    /// Share of each housing group in each row
    pub proportions: Vec<Vec<f64>>,
    pub tests: Vec<TestResult>,
}

impl AssociationTable {
    fn new(variable: Variable, table: ContingencyTable, tests: Vec<TestResult>) -> Self {
        Self {
            variable,
            row_totals: table.row_totals(),
            column_totals: table.column_totals(),
            proportions: table.column_proportions(),
            table,
            tests,
        }
    }

    /// Count for a row label and housing group
    #[must_use]
    pub fn count(&self, row: &str, housing_status: HousingStatus) -> Option<u64> {
        self.table
            .row_labels
            .iter()
            .position(|label| label == row)
            .map(|r| self.table.count(r, housing_status.index()))
    }

    /// Fisher exact test with the given alternative, when one was run
    #[must_use]
    pub fn fisher(&self, alternative: Alternative) -> Option<&TestResult> {
        self.tests
            .iter()
            .find(|t| t.method == TestMethod::FisherExact && t.alternative == alternative)
    }

    #[must_use]
    pub fn chi_square(&self) -> Option<&TestResult> {
        self.tests
            .iter()
            .find(|t| t.method != TestMethod::FisherExact)
    }
}

/// Specialty-group distribution with per-cell post-hoc tests
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecialtyDistribution {
    pub association: AssociationTable,
    pub residuals: Vec<CellResidual>,
}

/// Descriptive summary of one housing group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub housing_status: HousingStatus,
    pub admissions: usize,
    pub male_percent: Option<f64>,
    pub age_mean: Option<f64>,
    pub age_sd: Option<f64>,
    pub length_of_stay_median: Option<f64>,
    pub length_of_stay_q1: Option<f64>,
    pub length_of_stay_q3: Option<f64>,
    pub icu_admission_percent: Option<f64>,
}

/// Row levels of a variable in table order
fn row_levels(records: &[AnalysisRecord], variable: Variable) -> Vec<String> {
    match variable {
        Variable::HousingStatus => HousingStatus::ALL
            .iter()
            .rev()
            .map(|h| h.label().to_string())
            .collect(),
        Variable::Sex => vec!["M".to_string(), "F".to_string()],
        Variable::AgeBand => {
            let present: BTreeSet<AgeBand> = records.iter().map(|r| r.age_band).collect();
            present.into_iter().map(|b| b.label().to_string()).collect()
        }
        _ if variable.kind() == VariableKind::Binary => {
            vec!["true".to_string(), "false".to_string()]
        }
        _ => records
            .iter()
            .filter_map(|r| variable.level_label(r))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    }
}

/// Cross-tabulate a variable against housing status
pub fn crosstab(records: &[AnalysisRecord], variable: Variable) -> Result<ContingencyTable> {
    if variable.kind() == VariableKind::Continuous {
        return Err(AnalysisError::Statistics(format!(
            "continuous variable {variable} cannot be cross-tabulated"
        )));
    }
    let levels = row_levels(records, variable);
    let mut table = ContingencyTable::new(
        levels.clone(),
        HousingStatus::ALL.iter().map(|h| h.label().to_string()).collect(),
    );
    for record in records {
        if let Some(row) = variable
            .level_label(record)
            .and_then(|label| levels.iter().position(|l| *l == label))
        {
            table.increment(row, record.housing_status.index());
        }
    }
    Ok(table)
}

/// Binary outcomes by housing status: chi-square, two-sided Fisher and
/// one-sided "homeless higher" Fisher
pub fn outcome_tables(records: &[AnalysisRecord], yates: bool) -> Result<Vec<AssociationTable>> {
    Variable::binary_outcomes()
        .into_iter()
        .map(|outcome| {
            let table = crosstab(records, outcome)?;
            let tests = vec![
                chi_square_test(&table, yates)?,
                fisher_exact_test(&table, Alternative::TwoSided)?,
                fisher_exact_test(&table, Alternative::Greater)?,
            ];
            Ok(AssociationTable::new(outcome, table, tests))
        })
        .collect()
}

/// Confounders by housing status: chi-square, plus two-sided Fisher for
/// 2x2 tables
pub fn confounder_tables(
    records: &[AnalysisRecord],
    options: &TableOptions,
) -> Result<Vec<AssociationTable>> {
    options
        .confounders
        .iter()
        .map(|&confounder| {
            let table = crosstab(records, confounder)?;
            let mut tests = vec![chi_square_test(&table, options.yates_correction)?];
            if table.rows() == 2 && table.columns() == 2 {
                tests.push(fisher_exact_test(&table, Alternative::TwoSided)?);
            }
            Ok(AssociationTable::new(confounder, table, tests))
        })
        .collect()
}

/// Specialty groups by housing status with adjusted residuals
pub fn specialty_distribution(
    records: &[AnalysisRecord],
    yates: bool,
) -> Result<SpecialtyDistribution> {
    let table = crosstab(records, Variable::SpecialtyGroup)?;
    let residuals = adjusted_residuals(&table)?;
    let chi_square = chi_square_test(&table, yates)?;
    Ok(SpecialtyDistribution {
        association: AssociationTable::new(Variable::SpecialtyGroup, table, vec![chi_square]),
        residuals,
    })
}

/// Per-group descriptive summary
#[must_use]
pub fn cohort_summary(records: &[AnalysisRecord]) -> Vec<GroupSummary> {
    HousingStatus::ALL
        .iter()
        .map(|&housing_status| {
            let group: Vec<&AnalysisRecord> = records
                .iter()
                .filter(|r| r.housing_status == housing_status)
                .collect();
            let ages: Vec<f64> = group.iter().map(|r| r.age).collect();
            let stays: Vec<f64> = group.iter().map(|r| r.length_of_stay).collect();
            GroupSummary {
                housing_status,
                admissions: group.len(),
                male_percent: proportion(group.iter().map(|r| r.sex.is_male())).map(|p| p * 100.0),
                age_mean: mean(&ages),
                age_sd: std_dev(&ages),
                length_of_stay_median: median(&stays),
                length_of_stay_q1: quantile(&stays, 0.25),
                length_of_stay_q3: quantile(&stays, 0.75),
                icu_admission_percent: proportion(group.iter().map(|r| r.icu_admission))
                    .map(|p| p * 100.0),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test::fixtures::analysis_record;

    #[test]
    fn age_bands_follow_band_order() {
        let mut young = analysis_record(0);
        young.age_band = AgeBand::Under40;
        let mut old = analysis_record(1);
        old.age_band = AgeBand::From80;
        old.housing_status = HousingStatus::Homeless;

        let table = crosstab(&[old, young], Variable::AgeBand).unwrap();
        assert_eq!(table.row_labels, vec!["<40", "80+"]);
        assert_eq!(table.counts, vec![vec![1, 0], vec![0, 1]]);
    }

    #[test]
    fn continuous_variables_are_not_tabulated() {
        assert!(crosstab(&[analysis_record(0)], Variable::Age).is_err());
    }

    #[test]
    fn summary_covers_both_groups() {
        let mut a = analysis_record(0);
        a.sex = crate::models::Sex::Male;
        a.icu_admission = true;
        let b = analysis_record(1);
        let summary = cohort_summary(&[a, b]);
        assert_eq!(summary[0].admissions, 2);
        assert_eq!(summary[0].male_percent, Some(50.0));
        assert_eq!(summary[0].icu_admission_percent, Some(50.0));
        assert_eq!(summary[1].admissions, 0);
        assert_eq!(summary[1].age_mean, None);
    }
}
