//! Pairwise Euclidean distance matrices.

use crate::data::ExpressionMatrix;
use crate::error::{EdaError, Result};
use rayon::prelude::*;

/// Which axis of an expression matrix to treat as the items being compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Compare samples (matrix columns).
    Samples,
    /// Compare genes (matrix rows).
    Genes,
}

/// Symmetric distance matrix stored in condensed upper-triangle form.
///
/// For `n` items the condensed vector has `n*(n-1)/2` elements.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    condensed: Vec<f64>,
    n: usize,
}

impl DistanceMatrix {
    /// Build a distance matrix from item vectors.
    pub fn from_vectors(data: &[Vec<f64>]) -> Result<Self> {
        let n = data.len();
        if n < 2 {
            return Err(EdaError::InvalidParameter(
                "Need at least 2 items for a distance matrix".to_string(),
            ));
        }
        let dim = data[0].len();
        if dim == 0 {
            return Err(EdaError::EmptyData("Empty item vectors".to_string()));
        }
        for row in data {
            if row.len() != dim {
                return Err(EdaError::DimensionMismatch {
                    expected: dim,
                    actual: row.len(),
                });
            }
        }

        let condensed: Vec<f64> = (0..n)
            .into_par_iter()
            .flat_map_iter(|i| {
                let row = &data[i];
                ((i + 1)..n).map(move |j| euclidean(row, &data[j]))
            })
            .collect();

        Ok(Self { condensed, n })
    }

    /// Build a distance matrix over one axis of an expression matrix.
    ///
    /// Recomputed from scratch per invocation; sample-level and gene-level
    /// matrices share nothing.
    pub fn from_expression(expression: &ExpressionMatrix, axis: Axis) -> Result<Self> {
        let vectors: Vec<Vec<f64>> = match axis {
            Axis::Samples => (0..expression.n_samples())
                .map(|j| expression.sample_col(j))
                .collect(),
            Axis::Genes => (0..expression.n_genes())
                .map(|i| expression.gene_row(i))
                .collect(),
        };
        Self::from_vectors(&vectors)
    }

    /// Number of items.
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Distance between items `i` and `j`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i == j {
            return 0.0;
        }
        let (a, b) = if i < j { (i, j) } else { (j, i) };
        // condensed index for the (a, b) pair, a < b
        let idx = a * self.n - a * (a + 1) / 2 + (b - a - 1);
        self.condensed[idx]
    }
}

/// Euclidean distance, skipping coordinate pairs with a missing value.
fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}
