//! Contingency tables and association tests
//!
//! Problems with a table (empty rows, small expected counts, a table that
//! collapses below 2×2) never fail the run; they are attached as warnings
//! to the test result.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, Discrete, Hypergeometric, Normal};
use std::fmt;

use crate::error::{AnalysisError, Result};

/// Expected counts below this trigger the chi-square approximation warning
pub const MIN_EXPECTED_COUNT: f64 = 5.0;
/// Relative tolerance when comparing table probabilities in Fisher's test
const FISHER_RELATIVE_TOLERANCE: f64 = 1e-7;

/// Counts cross-classified by a row variable and a column variable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContingencyTable {
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    /// `counts[row][column]`
    pub counts: Vec<Vec<u64>>,
}

impl ContingencyTable {
    /// An all-zero table with the given labels
    #[must_use]
    pub fn new(row_labels: Vec<String>, column_labels: Vec<String>) -> Self {
        let counts = vec![vec![0; column_labels.len()]; row_labels.len()];
        Self {
            row_labels,
            column_labels,
            counts,
        }
    }

    /// Build a table directly from counts
    pub fn from_counts(
        row_labels: Vec<String>,
        column_labels: Vec<String>,
        counts: Vec<Vec<u64>>,
    ) -> Result<Self> {
        if counts.len() != row_labels.len()
            || counts.iter().any(|row| row.len() != column_labels.len())
        {
            return Err(AnalysisError::Statistics(format!(
                "counts do not match a {}x{} table",
                row_labels.len(),
                column_labels.len()
            )));
        }
        Ok(Self {
            row_labels,
            column_labels,
            counts,
        })
    }

    pub fn increment(&mut self, row: usize, column: usize) {
        self.counts[row][column] += 1;
    }

    #[must_use]
    pub fn count(&self, row: usize, column: usize) -> u64 {
        self.counts[row][column]
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.row_labels.len()
    }

    #[must_use]
    pub fn columns(&self) -> usize {
        self.column_labels.len()
    }

    #[must_use]
    pub fn row_totals(&self) -> Vec<u64> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    #[must_use]
    pub fn column_totals(&self) -> Vec<u64> {
        (0..self.columns())
            .map(|c| self.counts.iter().map(|row| row[c]).sum())
            .collect()
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    /// Share of each column falling in each row (columns sum to 1)
    #[must_use]
    pub fn column_proportions(&self) -> Vec<Vec<f64>> {
        let totals = self.column_totals();
        self.counts
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&totals)
                    .map(|(&count, &total)| {
                        if total == 0 {
                            0.0
                        } else {
                            count as f64 / total as f64
                        }
                    })
                    .collect()
            })
            .collect()
    }

    /// Expected counts under independence
    #[must_use]
    pub fn expected(&self) -> Vec<Vec<f64>> {
        let rows = self.row_totals();
        let columns = self.column_totals();
        let total = self.total() as f64;
        rows.iter()
            .map(|&r| {
                columns
                    .iter()
                    .map(|&c| {
                        if total == 0.0 {
                            0.0
                        } else {
                            r as f64 * c as f64 / total
                        }
                    })
                    .collect()
            })
            .collect()
    }

    /// Copy of the table without all-zero rows and columns
    #[must_use]
    pub fn without_empty_margins(&self) -> Self {
        let row_totals = self.row_totals();
        let column_totals = self.column_totals();
        let keep_rows: Vec<usize> = (0..self.rows()).filter(|&r| row_totals[r] > 0).collect();
        let keep_columns: Vec<usize> = (0..self.columns())
            .filter(|&c| column_totals[c] > 0)
            .collect();

        Self {
            row_labels: keep_rows.iter().map(|&r| self.row_labels[r].clone()).collect(),
            column_labels: keep_columns
                .iter()
                .map(|&c| self.column_labels[c].clone())
                .collect(),
            counts: keep_rows
                .iter()
                .map(|&r| keep_columns.iter().map(|&c| self.counts[r][c]).collect())
                .collect(),
        }
    }
}

/// Alternative hypothesis of Fisher's exact test
///
/// One-sided alternatives compare the share of the first row in the second
/// column against the first column. With rows `(true, false)` and columns
/// `(domiciled, homeless)`, `Greater` reads "homeless has the higher rate".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alternative {
    TwoSided,
    Less,
    Greater,
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TwoSided => f.write_str("two-sided"),
            Self::Less => f.write_str("less"),
            Self::Greater => f.write_str("greater"),
        }
    }
}

/// Which test produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMethod {
    ChiSquare,
    ChiSquareYates,
    FisherExact,
}

impl fmt::Display for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChiSquare => f.write_str("Pearson chi-square"),
            Self::ChiSquareYates => f.write_str("Pearson chi-square (Yates)"),
            Self::FisherExact => f.write_str("Fisher exact"),
        }
    }
}

/// Outcome of an association test
///
/// `statistic` and `p_value` are absent when the table did not support the
/// test; `warnings` then says why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub method: TestMethod,
    pub alternative: Alternative,
    pub statistic: Option<f64>,
    pub df: Option<f64>,
    pub p_value: Option<f64>,
    pub warnings: Vec<String>,
}

impl TestResult {
    fn unavailable(method: TestMethod, alternative: Alternative, warnings: Vec<String>) -> Self {
        for warning in &warnings {
            log::warn!("{method}: {warning}");
        }
        Self {
            method,
            alternative,
            statistic: None,
            df: None,
            p_value: None,
            warnings,
        }
    }

    /// Whether the test rejects independence at the given level
    #[must_use]
    pub fn rejects_at(&self, alpha: f64) -> bool {
        self.p_value.is_some_and(|p| p < alpha)
    }
}

/// Pearson's chi-square test of independence
///
/// With `yates` set, 2×2 tables use the continuity correction
/// `|O - E| - min(0.5, |O - E|)`.
pub fn chi_square_test(table: &ContingencyTable, yates: bool) -> Result<TestResult> {
    let mut warnings = Vec::new();
    let reduced = table.without_empty_margins();
    if reduced.rows() != table.rows() || reduced.columns() != table.columns() {
        warnings.push("removed all-zero rows or columns before testing".to_string());
    }

    let two_by_two = reduced.rows() == 2 && reduced.columns() == 2;
    let method = if yates && two_by_two {
        TestMethod::ChiSquareYates
    } else {
        TestMethod::ChiSquare
    };

    if reduced.rows() < 2 || reduced.columns() < 2 {
        warnings.push(format!(
            "table reduces to {}x{}; independence cannot be tested",
            reduced.rows(),
            reduced.columns()
        ));
        return Ok(TestResult::unavailable(method, Alternative::TwoSided, warnings));
    }

    let expected = reduced.expected();
    let mut statistic = 0.0;
    let mut small_expected = false;
    for (observed_row, expected_row) in reduced.counts.iter().zip(&expected) {
        for (&observed, &e) in observed_row.iter().zip(expected_row) {
            if e < MIN_EXPECTED_COUNT {
                small_expected = true;
            }
            let deviation = (observed as f64 - e).abs();
            let corrected = if method == TestMethod::ChiSquareYates {
                deviation - deviation.min(0.5)
            } else {
                deviation
            };
            statistic += corrected * corrected / e;
        }
    }
    if small_expected {
        warnings.push(format!(
            "expected count below {MIN_EXPECTED_COUNT}; chi-square approximation may be incorrect"
        ));
    }
    for warning in &warnings {
        log::warn!("{method}: {warning}");
    }

    let df = ((reduced.rows() - 1) * (reduced.columns() - 1)) as f64;
    let p_value = ChiSquared::new(df)
        .map_err(|e| AnalysisError::statistics("chi-square distribution", e))?
        .sf(statistic);

    Ok(TestResult {
        method,
        alternative: Alternative::TwoSided,
        statistic: Some(statistic),
        df: Some(df),
        p_value: Some(p_value),
        warnings,
    })
}

/// Fisher's exact test for a 2×2 table
///
/// Conditions on all margins: the count in row 0, column 1 follows a
/// hypergeometric distribution. The statistic reported is the conditional
/// sample odds ratio `(a·d)/(b·c)` with `a` at row 0, column 0.
pub fn fisher_exact_test(table: &ContingencyTable, alternative: Alternative) -> Result<TestResult> {
    if table.rows() != 2 || table.columns() != 2 {
        return Ok(TestResult::unavailable(
            TestMethod::FisherExact,
            alternative,
            vec![format!(
                "Fisher exact test needs a 2x2 table, got {}x{}",
                table.rows(),
                table.columns()
            )],
        ));
    }

    let total = table.total();
    if total == 0 {
        return Ok(TestResult::unavailable(
            TestMethod::FisherExact,
            alternative,
            vec!["table is empty".to_string()],
        ));
    }

    let first_row = table.row_totals()[0];
    let second_column = table.column_totals()[1];
    let observed = table.count(0, 1);

    let distribution = Hypergeometric::new(total, second_column, first_row)
        .map_err(|e| AnalysisError::statistics("hypergeometric distribution", e))?;
    let low = first_row.saturating_sub(total - second_column);
    let high = first_row.min(second_column);

    let p_value = match alternative {
        Alternative::Greater => (observed..=high).map(|k| distribution.pmf(k)).sum::<f64>(),
        Alternative::Less => (low..=observed).map(|k| distribution.pmf(k)).sum::<f64>(),
        Alternative::TwoSided => {
            let threshold = distribution.pmf(observed) * (1.0 + FISHER_RELATIVE_TOLERANCE);
            (low..=high)
                .map(|k| distribution.pmf(k))
                .filter(|&p| p <= threshold)
                .sum::<f64>()
        }
    }
    .min(1.0);

    let (a, b) = (table.count(0, 0) as f64, table.count(0, 1) as f64);
    let (c, d) = (table.count(1, 0) as f64, table.count(1, 1) as f64);
    let odds_ratio = if b * c == 0.0 {
        if a * d == 0.0 { f64::NAN } else { f64::INFINITY }
    } else {
        (a * d) / (b * c)
    };

    Ok(TestResult {
        method: TestMethod::FisherExact,
        alternative,
        statistic: odds_ratio.is_finite().then_some(odds_ratio),
        df: None,
        p_value: Some(p_value),
        warnings: Vec::new(),
    })
}

/// Post-hoc test of one cell after a chi-square test
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellResidual {
    pub row: String,
    pub column: String,
    pub observed: u64,
    pub expected: f64,
    /// Adjusted standardized residual, approximately N(0, 1) under independence
    pub residual: f64,
    pub p_value: f64,
    /// Bonferroni adjusted over all tested cells
    pub adjusted_p_value: f64,
}

/// Adjusted standardized residuals `(O − E) / sqrt(E (1 − r/N) (1 − c/N))`
///
/// All-zero rows and columns are skipped. Cells are listed row by row.
pub fn adjusted_residuals(table: &ContingencyTable) -> Result<Vec<CellResidual>> {
    let reduced = table.without_empty_margins();
    if reduced.rows() < 2 || reduced.columns() < 2 {
        return Ok(Vec::new());
    }

    let normal =
        Normal::new(0.0, 1.0).map_err(|e| AnalysisError::statistics("normal distribution", e))?;
    let expected = reduced.expected();
    let row_totals = reduced.row_totals();
    let column_totals = reduced.column_totals();
    let total = reduced.total() as f64;
    let cells = (reduced.rows() * reduced.columns()) as f64;

    let mut residuals = Vec::with_capacity(cells as usize);
    for (r, row_label) in reduced.row_labels.iter().enumerate() {
        for (c, column_label) in reduced.column_labels.iter().enumerate() {
            let observed = reduced.count(r, c);
            let e = expected[r][c];
            let scale = e
                * (1.0 - row_totals[r] as f64 / total)
                * (1.0 - column_totals[c] as f64 / total);
            let residual = (observed as f64 - e) / scale.sqrt();
            let p_value = (2.0 * normal.sf(residual.abs())).min(1.0);
            residuals.push(CellResidual {
                row: row_label.clone(),
                column: column_label.clone(),
                observed,
                expected: e,
                residual,
                p_value,
                adjusted_p_value: (p_value * cells).min(1.0),
            });
        }
    }
    Ok(residuals)
}
