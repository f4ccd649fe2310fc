//! Per-gene linear model fitting via OLS.

use crate::data::{DesignMatrix, ExpressionMatrix};
use crate::error::{EdaError, Result};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

/// Results from fitting a linear model to a single gene.
#[derive(Debug, Clone)]
pub struct GeneFitSingle {
    /// Gene identifier.
    pub gene_id: String,
    /// Estimated coefficients.
    pub coefficients: Vec<f64>,
    /// Standard errors of coefficients.
    pub std_errors: Vec<f64>,
    /// Residual standard error (sigma).
    pub sigma: f64,
    /// Degrees of freedom (residual).
    pub df_residual: usize,
    /// Whether the fit is well-defined. Genes with non-finite expression
    /// values are flagged degenerate and carry NaN estimates.
    pub converged: bool,
}

/// Results from fitting linear models to all genes.
#[derive(Debug, Clone)]
pub struct GeneFits {
    /// Individual fits, in gene order.
    pub fits: Vec<GeneFitSingle>,
    /// Coefficient names from the design matrix.
    pub coefficient_names: Vec<String>,
    /// Number of samples.
    pub n_samples: usize,
}

impl GeneFits {
    /// Get the fit for a specific gene by id.
    pub fn get_gene(&self, gene_id: &str) -> Option<&GeneFitSingle> {
        self.fits.iter().find(|f| f.gene_id == gene_id)
    }

    /// Number of genes fitted.
    pub fn n_genes(&self) -> usize {
        self.fits.len()
    }

    /// Count how many fits are well-defined.
    pub fn n_converged(&self) -> usize {
        self.fits.iter().filter(|f| f.converged).count()
    }
}

/// Fit an additive linear model to every gene against the design matrix.
///
/// Uses the normal equations with a single precomputed `(XᵀX)⁻¹`, shared
/// across genes since the design is identical for all of them. Genes are
/// fitted independently and in parallel.
pub fn fit_genes(expression: &ExpressionMatrix, design: &DesignMatrix) -> Result<GeneFits> {
    let n_genes = expression.n_genes();
    let n_samples = expression.n_samples();
    let n_coef = design.n_coefficients();

    if design.n_samples() != n_samples {
        return Err(EdaError::DimensionMismatch {
            expected: n_samples,
            actual: design.n_samples(),
        });
    }

    let df_residual = n_samples.saturating_sub(n_coef);
    if df_residual == 0 {
        return Err(EdaError::Numerical(
            "Model is saturated (n_samples <= n_coefficients)".to_string(),
        ));
    }

    let x = design.matrix();
    let xtx = x.transpose() * x;
    let xtx_inv = xtx.try_inverse().ok_or_else(|| {
        EdaError::Numerical("Design matrix is singular (XᵀX not invertible)".to_string())
    })?;

    let fits: Vec<GeneFitSingle> = (0..n_genes)
        .into_par_iter()
        .map(|i| {
            fit_single_gene(
                &expression.gene_row(i),
                &expression.gene_ids()[i],
                x,
                &xtx_inv,
                n_coef,
                df_residual,
            )
        })
        .collect();

    Ok(GeneFits {
        fits,
        coefficient_names: design.coefficient_names().to_vec(),
        n_samples,
    })
}

/// Fit a single gene using the precomputed `(XᵀX)⁻¹`.
fn fit_single_gene(
    y: &[f64],
    gene_id: &str,
    x: &DMatrix<f64>,
    xtx_inv: &DMatrix<f64>,
    n_coef: usize,
    df_residual: usize,
) -> GeneFitSingle {
    // Missing or non-finite intensities make the fit ill-defined for this
    // gene; flag it and move on rather than aborting the whole pass.
    if y.iter().any(|v| !v.is_finite()) {
        return GeneFitSingle {
            gene_id: gene_id.to_string(),
            coefficients: vec![f64::NAN; n_coef],
            std_errors: vec![f64::NAN; n_coef],
            sigma: f64::NAN,
            df_residual,
            converged: false,
        };
    }

    let y_vec = DVector::from_column_slice(y);

    // beta = (X'X)^-1 X'y
    let xty = x.transpose() * &y_vec;
    let beta = xtx_inv * xty;
    let coefficients: Vec<f64> = beta.iter().cloned().collect();

    // Residual sum of squares
    let y_hat = x * &beta;
    let residuals = &y_vec - &y_hat;
    let rss: f64 = residuals.iter().map(|e| e * e).sum();

    let sigma = (rss / df_residual as f64).sqrt();

    // SE = sigma * sqrt(diag((X'X)^-1))
    let std_errors: Vec<f64> = (0..n_coef)
        .map(|j| sigma * xtx_inv[(j, j)].sqrt())
        .collect();

    GeneFitSingle {
        gene_id: gene_id.to_string(),
        coefficients,
        std_errors,
        sigma,
        df_residual,
        converged: true,
    }
}
