//! Median-total gene filtering.

use crate::data::ExpressionMatrix;
use crate::error::{EdaError, Result};
use serde::{Deserialize, Serialize};

/// Summary of a median-total filter pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSummary {
    /// Genes retained.
    pub kept: usize,
    /// Genes removed (total at or below the median).
    pub removed: usize,
    /// The median of per-gene totals used as the threshold.
    pub median_total: f64,
}

/// Drop genes whose total expression does not exceed the cohort median.
///
/// The total per gene is the sum across all samples, ignoring missing
/// values. Retention is strict: a gene whose total ties the median is
/// removed. Gene order is preserved; the sample columns are untouched.
pub fn filter_by_median_total(
    expression: &ExpressionMatrix,
) -> Result<(ExpressionMatrix, FilterSummary)> {
    let totals = expression.gene_totals();
    if totals.is_empty() {
        return Err(EdaError::EmptyData("No genes to filter".to_string()));
    }

    let median_total = median(&totals);

    let keep_indices: Vec<usize> = totals
        .iter()
        .enumerate()
        .filter(|(_, &total)| total > median_total)
        .map(|(i, _)| i)
        .collect();

    if keep_indices.is_empty() {
        return Err(EdaError::EmptyData(format!(
            "No genes have total expression above the median ({})",
            median_total
        )));
    }

    let summary = FilterSummary {
        kept: keep_indices.len(),
        removed: expression.n_genes() - keep_indices.len(),
        median_total,
    };

    let filtered = expression.subset_genes(&keep_indices)?;
    Ok((filtered, summary))
}

/// Median of a slice; even-length inputs average the two middle values.
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    fn matrix_with_totals(totals: &[f64]) -> ExpressionMatrix {
        // 2 samples per gene; each row sums to the requested total
        let n = totals.len();
        let mut values = Vec::with_capacity(n * 2);
        for &t in totals {
            values.push(t / 2.0);
            values.push(t / 2.0);
        }
        let data = DMatrix::from_row_slice(n, 2, &values);
        let gene_ids = (0..n).map(|i| format!("g{}", i)).collect();
        let sample_ids = vec!["S1".to_string(), "S2".to_string()];
        ExpressionMatrix::new(data, gene_ids, sample_ids).unwrap()
    }

    #[test]
    fn test_median_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
    }

    #[test]
    fn test_median_even() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_filter_keeps_above_median() {
        let mat = matrix_with_totals(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let (filtered, summary) = filter_by_median_total(&mat).unwrap();

        // median of totals is 30; strictly greater keeps g3, g4
        assert_eq!(summary.median_total, 30.0);
        assert_eq!(filtered.gene_ids(), &["g3", "g4"]);
        assert_eq!(summary.kept, 2);
        assert_eq!(summary.removed, 3);
    }

    #[test]
    fn test_gene_at_median_excluded() {
        let mat = matrix_with_totals(&[10.0, 20.0, 30.0]);
        let (filtered, _) = filter_by_median_total(&mat).unwrap();
        // g1 sits exactly at the median and must be dropped
        assert_eq!(filtered.gene_ids(), &["g2"]);
    }

    #[test]
    fn test_order_preserved() {
        let mat = matrix_with_totals(&[50.0, 10.0, 40.0, 20.0, 30.0]);
        let (filtered, _) = filter_by_median_total(&mat).unwrap();
        assert_eq!(filtered.gene_ids(), &["g0", "g2"]);
    }

    #[test]
    fn test_missing_values_ignored_in_totals() {
        let data = DMatrix::from_row_slice(
            3,
            2,
            &[
                5.0,
                f64::NAN, // total 5
                10.0,
                10.0, // total 20
                20.0,
                20.0, // total 40
            ],
        );
        let mat = ExpressionMatrix::new(
            data,
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec!["S1".to_string(), "S2".to_string()],
        )
        .unwrap();

        let (filtered, summary) = filter_by_median_total(&mat).unwrap();
        assert_eq!(summary.median_total, 20.0);
        assert_eq!(filtered.gene_ids(), &["c"]);
    }

    #[test]
    fn test_all_equal_is_empty() {
        let mat = matrix_with_totals(&[10.0, 10.0, 10.0]);
        assert!(filter_by_median_total(&mat).is_err());
    }
}
