//! Dense expression matrix for microarray intensity data.

use crate::error::{EdaError, Result};
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A dense expression matrix of log-intensity values.
///
/// Rows represent genes (probe/gene ids), columns represent samples
/// (accessions). Missing measurements are stored as `NaN`.
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    /// Dense matrix (genes × samples).
    data: DMatrix<f64>,
    /// Gene identifiers (row names).
    gene_ids: Vec<String>,
    /// Sample identifiers (column names).
    sample_ids: Vec<String>,
}

impl ExpressionMatrix {
    /// Create a new ExpressionMatrix from a dense matrix and identifiers.
    pub fn new(data: DMatrix<f64>, gene_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != gene_ids.len() {
            return Err(EdaError::DimensionMismatch {
                expected: nrows,
                actual: gene_ids.len(),
            });
        }
        if ncols != sample_ids.len() {
            return Err(EdaError::DimensionMismatch {
                expected: ncols,
                actual: sample_ids.len(),
            });
        }
        Ok(Self {
            data,
            gene_ids,
            sample_ids,
        })
    }

    /// Load an expression matrix from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with sample ids (first column is the gene id header)
    /// - Subsequent rows: gene id followed by intensity values
    ///
    /// Empty fields and `NA` are read as missing (`NaN`).
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| EdaError::EmptyData("Empty TSV file".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(EdaError::EmptyData(
                "TSV must have at least one sample".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header[1..].iter().map(|s| s.to_string()).collect();
        let n_samples = sample_ids.len();

        let mut gene_ids: Vec<String> = Vec::new();
        let mut values: Vec<f64> = Vec::new();

        for (row_idx, line_result) in lines.enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != n_samples + 1 {
                return Err(EdaError::DimensionMismatch {
                    expected: n_samples + 1,
                    actual: fields.len(),
                });
            }

            gene_ids.push(fields[0].to_string());

            for (col_idx, value_str) in fields[1..].iter().enumerate() {
                let trimmed = value_str.trim();
                if trimmed.is_empty() || trimmed == "NA" || trimmed == "na" {
                    values.push(f64::NAN);
                } else {
                    let value: f64 = trimmed.parse().map_err(|_| EdaError::InvalidValue {
                        value: value_str.to_string(),
                        row: row_idx,
                        col: col_idx,
                    })?;
                    values.push(value);
                }
            }
        }

        let n_genes = gene_ids.len();
        if n_genes == 0 {
            return Err(EdaError::EmptyData("No genes in TSV".to_string()));
        }

        let data = DMatrix::from_row_slice(n_genes, n_samples, &values);
        Self::new(data, gene_ids, sample_ids)
    }

    /// Write the expression matrix to a TSV file. Missing values become `NA`.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "gene_id")?;
        for sample_id in &self.sample_ids {
            write!(writer, "\t{}", sample_id)?;
        }
        writeln!(writer)?;

        for (row_idx, gene_id) in self.gene_ids.iter().enumerate() {
            write!(writer, "{}", gene_id)?;
            for col_idx in 0..self.n_samples() {
                let value = self.data[(row_idx, col_idx)];
                if value.is_nan() {
                    write!(writer, "\tNA")?;
                } else {
                    write!(writer, "\t{}", value)?;
                }
            }
            writeln!(writer)?;
        }

        Ok(())
    }

    /// Get the value at (gene, sample).
    #[inline]
    pub fn get(&self, gene: usize, sample: usize) -> f64 {
        self.data[(gene, sample)]
    }

    /// Number of genes (rows).
    #[inline]
    pub fn n_genes(&self) -> usize {
        self.data.nrows()
    }

    /// Number of samples (columns).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Gene identifiers.
    #[inline]
    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    /// Sample identifiers.
    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get the underlying dense matrix.
    #[inline]
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Get a gene's expression across samples as a dense vector.
    pub fn gene_row(&self, gene: usize) -> Vec<f64> {
        self.data.row(gene).iter().cloned().collect()
    }

    /// Get a sample's expression across genes as a dense vector.
    pub fn sample_col(&self, sample: usize) -> Vec<f64> {
        self.data.column(sample).iter().cloned().collect()
    }

    /// Total expression per gene, summed across samples.
    ///
    /// Missing values are ignored rather than poisoning the total.
    pub fn gene_totals(&self) -> Vec<f64> {
        (0..self.n_genes())
            .into_par_iter()
            .map(|row| {
                self.data
                    .row(row)
                    .iter()
                    .filter(|v| !v.is_nan())
                    .sum::<f64>()
            })
            .collect()
    }

    /// Subset the matrix to the specified genes (by index), preserving the
    /// order given.
    pub fn subset_genes(&self, indices: &[usize]) -> Result<Self> {
        let n_samples = self.n_samples();
        let mut new_gene_ids = Vec::with_capacity(indices.len());
        let mut values = Vec::with_capacity(indices.len() * n_samples);

        for &old_row in indices {
            if old_row >= self.n_genes() {
                return Err(EdaError::InvalidParameter(format!(
                    "Gene index {} out of bounds",
                    old_row
                )));
            }
            new_gene_ids.push(self.gene_ids[old_row].clone());
            values.extend(self.data.row(old_row).iter().cloned());
        }

        let data = DMatrix::from_row_slice(indices.len(), n_samples, &values);
        Self::new(data, new_gene_ids, self.sample_ids.clone())
    }

    /// Reorder samples (columns) by the given permutation of indices.
    ///
    /// The data is never mutated; a reordered copy is returned for display.
    pub fn reorder_samples(&self, order: &[usize]) -> Result<Self> {
        if order.len() != self.n_samples() {
            return Err(EdaError::DimensionMismatch {
                expected: self.n_samples(),
                actual: order.len(),
            });
        }
        let n_genes = self.n_genes();
        let mut data = DMatrix::zeros(n_genes, order.len());
        let mut new_sample_ids = Vec::with_capacity(order.len());

        for (new_col, &old_col) in order.iter().enumerate() {
            if old_col >= self.n_samples() {
                return Err(EdaError::InvalidParameter(format!(
                    "Sample index {} out of bounds",
                    old_col
                )));
            }
            new_sample_ids.push(self.sample_ids[old_col].clone());
            data.set_column(new_col, &self.data.column(old_col));
        }

        Self::new(data, self.gene_ids.clone(), new_sample_ids)
    }
}
