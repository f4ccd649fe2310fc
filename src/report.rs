//! Report tables: z-scored heatmap data, display orderings, and the
//! category-to-color mapping used when rendering.

use crate::data::{ExpressionMatrix, SampleMetadata, Variable};
use crate::error::{EdaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default level colors, assigned in order.
const PALETTE: [&str; 8] = [
    "steelblue",
    "firebrick",
    "seagreen",
    "goldenrod",
    "orchid",
    "sienna",
    "teal",
    "slategrey",
];

/// Declarative mapping from category level to a display color, with an
/// explicit fallback for levels not present in the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorMap {
    colors: HashMap<String, String>,
    fallback: String,
}

impl ColorMap {
    pub fn new(colors: HashMap<String, String>, fallback: impl Into<String>) -> Self {
        Self {
            colors,
            fallback: fallback.into(),
        }
    }

    /// Assign palette colors to levels in order, cycling through the
    /// palette when there are more levels than colors.
    pub fn from_levels(levels: &[String]) -> Self {
        let colors = levels
            .iter()
            .enumerate()
            .map(|(i, level)| (level.clone(), PALETTE[i % PALETTE.len()].to_string()))
            .collect();
        Self {
            colors,
            fallback: "grey".to_string(),
        }
    }

    /// Color for a level; unrecognized levels get the fallback.
    pub fn color(&self, level: &str) -> &str {
        self.colors.get(level).map_or(&self.fallback, |c| c)
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }
}

impl Default for ColorMap {
    fn default() -> Self {
        Self {
            colors: HashMap::new(),
            fallback: "grey".to_string(),
        }
    }
}

/// Gene-by-sample table of z-scored expression values, rows and columns
/// already permuted into display order.
#[derive(Debug, Clone)]
pub struct HeatmapTable {
    values: Vec<Vec<f64>>,
    gene_ids: Vec<String>,
    sample_ids: Vec<String>,
}

impl HeatmapTable {
    /// Build a heatmap table from an expression matrix.
    ///
    /// Each gene row is z-scored first (constant rows become all zeros),
    /// then rows and columns are permuted by the given orders. Orders must
    /// be permutations of the matrix axes.
    pub fn new(
        expression: &ExpressionMatrix,
        gene_order: &[usize],
        sample_order: &[usize],
    ) -> Result<Self> {
        if gene_order.len() != expression.n_genes() {
            return Err(EdaError::DimensionMismatch {
                expected: expression.n_genes(),
                actual: gene_order.len(),
            });
        }
        if sample_order.len() != expression.n_samples() {
            return Err(EdaError::DimensionMismatch {
                expected: expression.n_samples(),
                actual: sample_order.len(),
            });
        }

        let mut values = Vec::with_capacity(gene_order.len());
        let mut gene_ids = Vec::with_capacity(gene_order.len());
        for &g in gene_order {
            let row = expression.gene_row(g);
            let scaled = zscore(&row);
            values.push(sample_order.iter().map(|&s| scaled[s]).collect());
            gene_ids.push(expression.gene_ids()[g].clone());
        }
        let sample_ids = sample_order
            .iter()
            .map(|&s| expression.sample_ids()[s].clone())
            .collect();

        Ok(Self {
            values,
            gene_ids,
            sample_ids,
        })
    }

    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row][col]
    }

    /// Write the table as TSV with a gene_id column and one column per sample.
    pub fn to_tsv(&self) -> String {
        let mut out = String::from("gene_id");
        for sid in &self.sample_ids {
            out.push('\t');
            out.push_str(sid);
        }
        out.push('\n');
        for (gid, row) in self.gene_ids.iter().zip(&self.values) {
            out.push_str(gid);
            for v in row {
                if v.is_nan() {
                    out.push_str("\tNA");
                } else {
                    out.push_str(&format!("\t{}", v));
                }
            }
            out.push('\n');
        }
        out
    }
}

/// Z-score a single row; missing values stay missing, and a constant row
/// comes back as all zeros.
fn zscore(row: &[f64]) -> Vec<f64> {
    let finite: Vec<f64> = row.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return row.iter().map(|v| if v.is_finite() { 0.0 } else { *v }).collect();
    }
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (finite.len() - 1) as f64;
    let sd = var.sqrt();
    row.iter()
        .map(|&v| {
            if !v.is_finite() {
                v
            } else if sd > 0.0 {
                (v - mean) / sd
            } else {
                0.0
            }
        })
        .collect()
}

/// Sample display order grouped by a categorical metadata attribute.
///
/// Stable sort: samples keep their input order within each level, and
/// levels appear alphabetically with missing values last.
pub fn sample_order_by_attribute(
    metadata: &SampleMetadata,
    column: &str,
) -> Result<Vec<usize>> {
    let values = metadata.column(column)?;
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| sort_key(values[a]).cmp(&sort_key(values[b])));
    Ok(order)
}

fn sort_key(v: &Variable) -> (bool, String) {
    match v {
        Variable::Categorical(s) => (false, s.clone()),
        Variable::Continuous(x) => (false, format!("{:020.6}", x)),
        Variable::Missing => (true, String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn small_matrix() -> ExpressionMatrix {
        let data = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 5.0, 5.0, 5.0]);
        ExpressionMatrix::new(
            data,
            vec!["g1".to_string(), "g2".to_string()],
            vec!["S1".to_string(), "S2".to_string(), "S3".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_heatmap_zscores_rows() {
        let table = HeatmapTable::new(&small_matrix(), &[0, 1], &[0, 1, 2]).unwrap();
        assert_relative_eq!(table.get(0, 0), -1.0);
        assert_relative_eq!(table.get(0, 1), 0.0);
        assert_relative_eq!(table.get(0, 2), 1.0);
        // constant row collapses to zeros
        assert_relative_eq!(table.get(1, 0), 0.0);
        assert_relative_eq!(table.get(1, 2), 0.0);
    }

    #[test]
    fn test_heatmap_respects_orders() {
        let table = HeatmapTable::new(&small_matrix(), &[1, 0], &[2, 0, 1]).unwrap();
        assert_eq!(table.gene_ids(), &["g2", "g1"]);
        assert_eq!(table.sample_ids(), &["S3", "S1", "S2"]);
        assert_relative_eq!(table.get(1, 0), 1.0);
    }

    #[test]
    fn test_heatmap_order_length_checked() {
        assert!(HeatmapTable::new(&small_matrix(), &[0], &[0, 1, 2]).is_err());
        assert!(HeatmapTable::new(&small_matrix(), &[0, 1], &[0]).is_err());
    }

    #[test]
    fn test_heatmap_tsv() {
        let table = HeatmapTable::new(&small_matrix(), &[0, 1], &[0, 1, 2]).unwrap();
        let tsv = table.to_tsv();
        assert!(tsv.starts_with("gene_id\tS1\tS2\tS3\n"));
        assert_eq!(tsv.lines().count(), 3);
    }

    #[test]
    fn test_color_map_fallback() {
        let mut colors = HashMap::new();
        colors.insert("wt".to_string(), "steelblue".to_string());
        colors.insert("mut1".to_string(), "firebrick".to_string());
        let map = ColorMap::new(colors, "grey");
        assert_eq!(map.color("wt"), "steelblue");
        assert_eq!(map.color("unknown_strain"), "grey");
        assert_eq!(ColorMap::default().color("anything"), "grey");
    }

    #[test]
    fn test_color_map_from_levels() {
        let levels = vec!["high".to_string(), "low".to_string(), "medium".to_string()];
        let map = ColorMap::from_levels(&levels);
        // each level gets its own palette color, unknown levels fall back
        assert_eq!(map.color("high"), "steelblue");
        assert_eq!(map.color("low"), "firebrick");
        assert_ne!(map.color("medium"), map.color("high"));
        assert_eq!(map.color("absent"), map.fallback());
    }

    #[test]
    fn test_sample_order_by_attribute() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\tgenotype").unwrap();
        writeln!(file, "S1\twt").unwrap();
        writeln!(file, "S2\tmut").unwrap();
        writeln!(file, "S3\twt").unwrap();
        writeln!(file, "S4\tNA").unwrap();
        writeln!(file, "S5\tmut").unwrap();
        file.flush().unwrap();
        let meta = SampleMetadata::from_tsv(file.path()).unwrap();

        let order = sample_order_by_attribute(&meta, "genotype").unwrap();
        // mut levels first alphabetically, stable within level, missing last
        assert_eq!(order, vec![1, 4, 0, 2, 3]);
        assert!(sample_order_by_attribute(&meta, "strain").is_err());
    }
}
