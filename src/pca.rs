//! Principal component analysis of samples in gene space.

use crate::data::ExpressionMatrix;
use crate::error::{EdaError, Result};
use nalgebra::DMatrix;

/// PCA scores and variance decomposition.
#[derive(Debug, Clone)]
pub struct PcaResult {
    /// Sample scores, one row per sample, one column per component.
    scores: DMatrix<f64>,
    /// Variance captured by each retained component.
    explained_variance: Vec<f64>,
    /// Fraction of total variance captured by each retained component.
    explained_ratio: Vec<f64>,
    sample_ids: Vec<String>,
    n_components: usize,
}

impl PcaResult {
    pub fn scores(&self) -> &DMatrix<f64> {
        &self.scores
    }

    pub fn explained_variance(&self) -> &[f64] {
        &self.explained_variance
    }

    pub fn explained_ratio(&self) -> &[f64] {
        &self.explained_ratio
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Score of one sample on one component.
    pub fn score(&self, sample: usize, component: usize) -> f64 {
        self.scores[(sample, component)]
    }

    /// Write scores as TSV, one row per sample.
    pub fn to_tsv(&self) -> String {
        let mut out = String::from("sample_id");
        for c in 0..self.n_components {
            out.push_str(&format!("\tPC{}", c + 1));
        }
        out.push('\n');
        for (i, id) in self.sample_ids.iter().enumerate() {
            out.push_str(id);
            for c in 0..self.n_components {
                out.push_str(&format!("\t{}", self.scores[(i, c)]));
            }
            out.push('\n');
        }
        out
    }
}

/// Z-score each gene row; constant or degenerate rows become all zeros so
/// they contribute nothing to the decomposition.
fn zscore_rows(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    let (n_rows, n_cols) = matrix.shape();
    let mut scaled = DMatrix::zeros(n_rows, n_cols);
    for i in 0..n_rows {
        let row: Vec<f64> = (0..n_cols)
            .map(|j| {
                let v = matrix[(i, j)];
                if v.is_finite() {
                    v
                } else {
                    0.0
                }
            })
            .collect();
        let mean = row.iter().sum::<f64>() / n_cols as f64;
        let var = row.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n_cols - 1) as f64;
        let sd = var.sqrt();
        if sd > 0.0 {
            for j in 0..n_cols {
                scaled[(i, j)] = (row[j] - mean) / sd;
            }
        }
    }
    scaled
}

/// Run PCA on samples, treating each z-scored gene as a feature.
///
/// Computed from the SVD of the centered samples-by-genes matrix; singular
/// values come back in descending order, so components are already ranked by
/// explained variance.
pub fn pca(expression: &ExpressionMatrix, n_components: usize) -> Result<PcaResult> {
    let n_samples = expression.n_samples();
    let n_genes = expression.n_genes();
    if n_samples < 2 {
        return Err(EdaError::InvalidParameter(
            "PCA requires at least 2 samples".to_string(),
        ));
    }
    let max_components = n_samples.min(n_genes);
    if n_components == 0 || n_components > max_components {
        return Err(EdaError::InvalidParameter(format!(
            "Cannot extract {} components from a {} x {} matrix",
            n_components, n_genes, n_samples
        )));
    }

    // samples x genes, gene rows standardized (which also centers columns
    // of the transpose), so no further centering is needed.
    let centered = zscore_rows(expression.matrix()).transpose();

    let svd = centered.svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| EdaError::Numerical("SVD failed to produce U".to_string()))?;

    let mut scores = DMatrix::zeros(n_samples, n_components);
    let mut explained_variance = Vec::with_capacity(n_components);
    let denom = (n_samples - 1) as f64;
    let total: f64 = svd
        .singular_values
        .iter()
        .map(|s| s * s / denom)
        .sum();

    for c in 0..n_components {
        let sigma = svd.singular_values[c];
        for i in 0..n_samples {
            scores[(i, c)] = u[(i, c)] * sigma;
        }
        explained_variance.push(sigma * sigma / denom);
    }

    let explained_ratio = explained_variance
        .iter()
        .map(|&v| if total > 0.0 { v / total } else { 0.0 })
        .collect();

    Ok(PcaResult {
        scores,
        explained_variance,
        explained_ratio,
        sample_ids: expression.sample_ids().to_vec(),
        n_components,
    })
}
