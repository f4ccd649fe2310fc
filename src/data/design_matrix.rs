//! Design matrix construction from metadata and formula.

use crate::data::{Formula, SampleMetadata, Variable, VariableType};
use crate::error::{EdaError, Result};
use nalgebra::DMatrix;
use std::collections::HashMap;

/// A design matrix for linear modeling.
///
/// Categorical factors are dummy-coded against an alphabetically-first
/// reference level; continuous variables contribute a single column.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    /// The design matrix (samples × coefficients).
    matrix: DMatrix<f64>,
    /// Names of the coefficients (columns).
    coefficient_names: Vec<String>,
    /// Sample ids (rows).
    sample_ids: Vec<String>,
    /// Reference levels for categorical variables.
    reference_levels: HashMap<String, String>,
}

impl DesignMatrix {
    /// Build a design matrix from metadata and an additive formula.
    pub fn from_formula(metadata: &SampleMetadata, formula: &Formula) -> Result<Self> {
        let sample_ids = metadata.sample_ids().to_vec();
        let n_samples = sample_ids.len();

        for var in formula.variables() {
            if !metadata.has_column(var) {
                return Err(EdaError::MissingColumn(var.to_string()));
            }
        }

        // Reference level = alphabetically first (metadata levels are sorted)
        let mut reference_levels = HashMap::new();
        for var in formula.variables() {
            if metadata.column_type(var) == Some(VariableType::Categorical) {
                let levels = metadata.levels(var)?;
                if !levels.is_empty() {
                    reference_levels.insert(var.to_string(), levels[0].clone());
                }
            }
        }

        let mut coefficient_names = Vec::new();
        let mut columns: Vec<Vec<f64>> = Vec::new();

        if formula.intercept {
            coefficient_names.push("(Intercept)".to_string());
            columns.push(vec![1.0; n_samples]);
        }

        for var_name in &formula.terms {
            let values = metadata.column(var_name)?;

            match metadata.column_type(var_name) {
                Some(VariableType::Continuous) => {
                    coefficient_names.push(var_name.clone());
                    let col: Vec<f64> = values
                        .iter()
                        .map(|v| match v {
                            Variable::Continuous(x) => *x,
                            _ => 0.0,
                        })
                        .collect();
                    columns.push(col);
                }
                Some(VariableType::Categorical) | None => {
                    let levels = metadata.levels(var_name)?;
                    let ref_level = reference_levels.get(var_name);

                    for level in &levels {
                        // Reference level dropped only when there is an intercept
                        if formula.intercept && Some(level) == ref_level {
                            continue;
                        }
                        coefficient_names.push(format!("{}{}", var_name, level));
                        let col: Vec<f64> = values
                            .iter()
                            .map(|v| {
                                if let Variable::Categorical(s) = v {
                                    if s == level {
                                        1.0
                                    } else {
                                        0.0
                                    }
                                } else {
                                    0.0
                                }
                            })
                            .collect();
                        columns.push(col);
                    }
                }
            }
        }

        let n_coef = columns.len();
        let mut matrix = DMatrix::zeros(n_samples, n_coef);
        for (col_idx, col) in columns.iter().enumerate() {
            for (row_idx, &val) in col.iter().enumerate() {
                matrix[(row_idx, col_idx)] = val;
            }
        }

        Ok(Self {
            matrix,
            coefficient_names,
            sample_ids,
            reference_levels,
        })
    }

    /// Get the design matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Get coefficient names.
    pub fn coefficient_names(&self) -> &[String] {
        &self.coefficient_names
    }

    /// Get sample ids.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Number of samples (rows).
    pub fn n_samples(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of coefficients (columns).
    pub fn n_coefficients(&self) -> usize {
        self.matrix.ncols()
    }

    /// Reference level for a categorical variable.
    pub fn reference_level(&self, variable: &str) -> Option<&str> {
        self.reference_levels.get(variable).map(|s| s.as_str())
    }

    /// Check if the matrix has an intercept.
    pub fn has_intercept(&self) -> bool {
        self.coefficient_names.first() == Some(&"(Intercept)".to_string())
    }

    /// Indices of all coefficients except the intercept.
    pub fn non_intercept_indices(&self) -> Vec<usize> {
        self.coefficient_names
            .iter()
            .enumerate()
            .filter(|(_, name)| name.as_str() != "(Intercept)")
            .map(|(i, _)| i)
            .collect()
    }
}
