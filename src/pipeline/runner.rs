//! End-to-end exploratory analysis: validate, cluster samples, filter,
//! rank, build the heatmap table, evaluate gene clusterings, run PCA.

use crate::cluster::{linkage_average, silhouette, Axis, Dendrogram, DistanceMatrix};
use crate::data::{DesignMatrix, ExpressionMatrix, Formula, SampleMetadata};
use crate::error::{EdaError, Result};
use crate::filter::{filter_by_median_total, FilterSummary};
use crate::pca::{pca, PcaResult};
use crate::rank::{rank_genes, RankingTable};
use crate::data::VariableType;
use crate::report::{sample_order_by_attribute, ColorMap, HeatmapTable};
use crate::validate::check_correspondence;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// How heatmap columns are ordered.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub enum SampleOrdering {
    /// Leaf order of the sample dendrogram.
    #[default]
    Dendrogram,
    /// Grouped by a categorical metadata attribute.
    Attribute(String),
}

/// Analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdaConfig {
    /// Model formula for gene ranking, e.g. `~ genotype + nutrient + time`.
    pub formula: String,
    /// How many top-ranked genes to retain.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Candidate cluster counts for the gene dendrogram.
    #[serde(default = "default_candidate_ks")]
    pub candidate_ks: Vec<usize>,
    /// Number of principal components to extract.
    #[serde(default = "default_n_components")]
    pub n_components: usize,
    /// Heatmap column ordering.
    #[serde(default)]
    pub sample_ordering: SampleOrdering,
}

fn default_top_n() -> usize {
    1000
}

fn default_candidate_ks() -> Vec<usize> {
    vec![3, 4, 5]
}

fn default_n_components() -> usize {
    2
}

impl Default for EdaConfig {
    fn default() -> Self {
        Self {
            formula: "~ genotype + nutrient + time".to_string(),
            top_n: default_top_n(),
            candidate_ks: default_candidate_ks(),
            n_components: default_n_components(),
            sample_ordering: SampleOrdering::default(),
        }
    }
}

impl EdaConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(EdaError::from)
    }

    /// Load from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(EdaError::from)
    }
}

/// Mean silhouette width for one candidate k.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SilhouetteSummary {
    pub k: usize,
    pub mean_width: f64,
}

/// Everything the analysis produces.
pub struct EdaReport {
    pub filter_summary: FilterSummary,
    pub sample_dendrogram: Dendrogram,
    pub gene_dendrogram: Dendrogram,
    pub ranking: RankingTable,
    pub heatmap: HeatmapTable,
    pub silhouettes: Vec<SilhouetteSummary>,
    /// Gene cluster labels for each candidate k, indexed by the selected
    /// genes in their pre-reorder (leaf-index) order.
    pub gene_clusters: Vec<(usize, Vec<usize>)>,
    /// Display colors for the levels of each categorical model factor,
    /// consumed by the report renderer.
    pub annotation_colors: HashMap<String, ColorMap>,
    pub pca: PcaResult,
}

impl EdaReport {
    /// Write the report tables into a directory.
    ///
    /// Produces `ranking.tsv`, `heatmap.tsv`, `silhouette.json`,
    /// `pca_scores.tsv`, and `colors.json` (the renderer's color legend).
    pub fn write_artifacts<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        self.ranking.to_tsv(dir.join("ranking.tsv"))?;
        fs::write(dir.join("heatmap.tsv"), self.heatmap.to_tsv())?;
        fs::write(
            dir.join("silhouette.json"),
            serde_json::to_string_pretty(&self.silhouettes)?,
        )?;
        fs::write(dir.join("pca_scores.tsv"), self.pca.to_tsv())?;
        fs::write(
            dir.join("colors.json"),
            serde_json::to_string_pretty(&self.annotation_colors)?,
        )?;
        Ok(())
    }
}

/// Run the full analysis on a loaded dataset.
///
/// Stages run strictly forward; each stage consumes the previous stage's
/// immutable output. Any stage failure aborts the run with the stage name
/// attached.
pub fn run_eda(
    expression: &ExpressionMatrix,
    metadata: &SampleMetadata,
    config: &EdaConfig,
) -> Result<EdaReport> {
    log::info!(
        "Starting analysis: {} genes x {} samples",
        expression.n_genes(),
        expression.n_samples()
    );

    stage("validate", || check_correspondence(expression, metadata))?;

    let sample_dendrogram = stage("cluster-samples", || {
        let distances = DistanceMatrix::from_expression(expression, Axis::Samples)?;
        linkage_average(&distances)
    })?;

    let (filtered, filter_summary) = stage("filter", || filter_by_median_total(expression))?;
    log::info!(
        "Filter kept {} of {} genes (median total {})",
        filter_summary.kept,
        filter_summary.kept + filter_summary.removed,
        filter_summary.median_total
    );

    let (formula, ranking) = stage("rank", || {
        let formula = Formula::parse(&config.formula)?;
        let design = DesignMatrix::from_formula(metadata, &formula)?;
        let ranking = rank_genes(&filtered, &design, config.top_n)?;
        Ok((formula, ranking))
    })?;
    if ranking.n_degenerate > 0 {
        log::warn!("{} genes had degenerate fits", ranking.n_degenerate);
    }
    if ranking.selected.is_empty() {
        return Err(EdaError::Pipeline(
            "No genes survived ranking".to_string(),
        ));
    }

    // Restrict to the selected genes, keeping the filtered matrix's row order.
    let selected_indices: Vec<usize> = filtered
        .gene_ids()
        .iter()
        .enumerate()
        .filter(|(_, id)| ranking.is_selected(id))
        .map(|(i, _)| i)
        .collect();
    let selected = filtered.subset_genes(&selected_indices)?;

    let (gene_dendrogram, silhouettes, gene_clusters) = stage("cluster-genes", || {
        let distances = DistanceMatrix::from_expression(&selected, Axis::Genes)?;
        let dendrogram = linkage_average(&distances)?;

        let mut summaries = Vec::new();
        let mut clusterings = Vec::new();
        for &k in &config.candidate_ks {
            let labels = dendrogram.cut(k)?;
            let result = silhouette(&distances, &labels)?;
            log::info!("k={}: mean silhouette width {:.4}", k, result.mean);
            summaries.push(SilhouetteSummary {
                k,
                mean_width: result.mean,
            });
            clusterings.push((k, labels));
        }
        Ok((dendrogram, summaries, clusterings))
    })?;

    let heatmap = stage("heatmap", || {
        let gene_order = gene_dendrogram.leaf_order();
        let sample_order = match &config.sample_ordering {
            SampleOrdering::Dendrogram => sample_dendrogram.leaf_order(),
            SampleOrdering::Attribute(column) => sample_order_by_attribute(metadata, column)?,
        };
        HeatmapTable::new(&selected, &gene_order, &sample_order)
    })?;

    let annotation_colors = stage("colors", || {
        let mut colors = HashMap::new();
        for var in formula.variables() {
            if metadata.column_type(var) == Some(VariableType::Categorical) {
                colors.insert(var.to_string(), ColorMap::from_levels(&metadata.levels(var)?));
            }
        }
        Ok(colors)
    })?;

    let pca_result = stage("pca", || pca(&selected, config.n_components))?;
    log::info!(
        "PC1 explains {:.1}% of variance",
        pca_result.explained_ratio()[0] * 100.0
    );

    Ok(EdaReport {
        filter_summary,
        sample_dendrogram,
        gene_dendrogram,
        ranking,
        heatmap,
        silhouettes,
        gene_clusters,
        annotation_colors,
        pca: pca_result,
    })
}

fn stage<T, F: FnOnce() -> Result<T>>(name: &str, f: F) -> Result<T> {
    log::debug!("Stage {} starting", name);
    f().map_err(|e| EdaError::Pipeline(format!("Stage {} failed: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// 18 samples across genotype (3 levels) x nutrient (3) x time (2).
    fn create_test_metadata() -> SampleMetadata {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\tgenotype\tnutrient\ttime").unwrap();
        for i in 0..18 {
            let genotype = ["wt", "mut1", "mut2"][i % 3];
            let nutrient = ["low", "medium", "high"][(i / 3) % 3];
            let time = ["0h", "6h"][(i / 9) % 2];
            writeln!(file, "S{:02}\t{}\t{}\t{}", i, genotype, nutrient, time).unwrap();
        }
        file.flush().unwrap();
        SampleMetadata::from_tsv(file.path()).unwrap()
    }

    fn create_test_expression() -> ExpressionMatrix {
        // 20 genes x 18 samples; genes 0-4 follow genotype strongly and
        // carry large totals, the rest are low-level noise.
        let n_genes = 20;
        let n_samples = 18;
        let mut values = Vec::with_capacity(n_genes * n_samples);
        let mut state = 11u64;
        for g in 0..n_genes {
            for s in 0..n_samples {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let noise = (state >> 33) as f64 / (1u64 << 31) as f64; // [0, 1)
                let v = if g < 5 {
                    1000.0 + 200.0 * (s % 3) as f64 + noise
                } else {
                    5.0 + noise
                };
                values.push(v);
            }
        }
        let data = DMatrix::from_row_slice(n_genes, n_samples, &values);
        ExpressionMatrix::new(
            data,
            (0..n_genes).map(|g| format!("gene{:02}", g)).collect(),
            (0..n_samples).map(|s| format!("S{:02}", s)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_run_eda_produces_report() {
        let expression = create_test_expression();
        let metadata = create_test_metadata();
        let config = EdaConfig {
            top_n: 5,
            candidate_ks: vec![2, 3],
            ..EdaConfig::default()
        };

        let report = run_eda(&expression, &metadata, &config).unwrap();

        assert_eq!(report.filter_summary.kept + report.filter_summary.removed, 20);
        assert_eq!(report.ranking.selected.len(), 5);
        // the genotype-driven genes rank first
        for g in 0..5 {
            assert!(report.ranking.is_selected(&format!("gene{:02}", g)));
        }
        assert_eq!(report.silhouettes.len(), 2);
        assert_eq!(report.heatmap.gene_ids().len(), 5);
        assert_eq!(report.heatmap.sample_ids().len(), 18);
        assert_eq!(report.pca.n_components(), 2);

        // every categorical model factor gets a color legend
        for factor in ["genotype", "nutrient", "time"] {
            let map = report.annotation_colors.get(factor).unwrap();
            assert_ne!(map.color("unrecognized"), "");
        }
        let genotype = &report.annotation_colors["genotype"];
        assert_ne!(genotype.color("wt"), genotype.fallback());
    }

    #[test]
    fn test_run_eda_attribute_ordering() {
        let expression = create_test_expression();
        let metadata = create_test_metadata();
        let config = EdaConfig {
            top_n: 5,
            candidate_ks: vec![2],
            sample_ordering: SampleOrdering::Attribute("genotype".to_string()),
            ..EdaConfig::default()
        };

        let report = run_eda(&expression, &metadata, &config).unwrap();
        // samples grouped by genotype level: mut1, mut2, wt
        let first_six: Vec<&str> = report.heatmap.sample_ids()[..6]
            .iter()
            .map(|s| s.as_str())
            .collect();
        for sid in first_six {
            let idx: usize = sid[1..].parse().unwrap();
            assert_eq!(idx % 3, 1, "expected a mut1 sample, got {}", sid);
        }
    }

    #[test]
    fn test_run_eda_rejects_mismatched_inputs() {
        let expression = create_test_expression();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\tgenotype\tnutrient\ttime").unwrap();
        writeln!(file, "S00\twt\tlow\t0h").unwrap();
        file.flush().unwrap();
        let metadata = SampleMetadata::from_tsv(file.path()).unwrap();

        let result = run_eda(&expression, &metadata, &EdaConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_write_artifacts() {
        let expression = create_test_expression();
        let metadata = create_test_metadata();
        let config = EdaConfig {
            top_n: 5,
            candidate_ks: vec![2, 3],
            ..EdaConfig::default()
        };
        let report = run_eda(&expression, &metadata, &config).unwrap();

        let dir = tempfile::tempdir().unwrap();
        report.write_artifacts(dir.path()).unwrap();
        assert!(dir.path().join("ranking.tsv").exists());
        assert!(dir.path().join("heatmap.tsv").exists());
        assert!(dir.path().join("silhouette.json").exists());
        assert!(dir.path().join("pca_scores.tsv").exists());

        let json = fs::read_to_string(dir.path().join("silhouette.json")).unwrap();
        let parsed: Vec<SilhouetteSummary> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 2);

        let colors_json = fs::read_to_string(dir.path().join("colors.json")).unwrap();
        let legends: HashMap<String, ColorMap> = serde_json::from_str(&colors_json).unwrap();
        assert!(legends.contains_key("genotype"));
        assert_ne!(legends["genotype"].color("wt"), legends["genotype"].fallback());
    }

    #[test]
    fn test_config_yaml_roundtrip() {
        let config = EdaConfig {
            formula: "~ genotype + nutrient".to_string(),
            top_n: 100,
            ..EdaConfig::default()
        };
        let yaml = config.to_yaml().unwrap();
        let parsed = EdaConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.formula, "~ genotype + nutrient");
        assert_eq!(parsed.top_n, 100);
        assert_eq!(parsed.candidate_ks, vec![3, 4, 5]);
    }

    #[test]
    fn test_config_defaults_from_partial_yaml() {
        let parsed = EdaConfig::from_yaml("formula: \"~ genotype\"").unwrap();
        assert_eq!(parsed.top_n, 1000);
        assert_eq!(parsed.candidate_ks, vec![3, 4, 5]);
        assert_eq!(parsed.n_components, 2);
        assert!(matches!(parsed.sample_ordering, SampleOrdering::Dendrogram));
    }
}
