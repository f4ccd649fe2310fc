//! Integration tests for the full exploratory analysis pipeline.

use microarray_eda::prelude::*;
use nalgebra::DMatrix;
use std::io::Write;
use tempfile::NamedTempFile;

/// Create a synthetic expression matrix with known signal genes.
fn create_synthetic_expression() -> ExpressionMatrix {
    // 100 genes x 90 samples.
    // - Genes 0-9: strong genotype effect (step of 400 per level) on a high
    //   baseline, so they survive the median filter and rank first.
    // - Genes 10-99: low baseline plus noise, no factor structure.
    let n_genes = 100;
    let n_samples = 90;

    let mut rng_seed = 42u64;
    let mut simple_rand = move || -> f64 {
        rng_seed = rng_seed.wrapping_mul(1103515245).wrapping_add(12345);
        ((rng_seed >> 16) & 0x7FFF) as f64 / 32768.0
    };

    let mut values = Vec::with_capacity(n_genes * n_samples);
    for gene in 0..n_genes {
        for sample in 0..n_samples {
            let genotype_level = (sample % 3) as f64;
            let v = if gene < 10 {
                2000.0 + 400.0 * genotype_level + simple_rand()
            } else {
                10.0 + 5.0 * simple_rand()
            };
            values.push(v);
        }
    }

    let data = DMatrix::from_row_slice(n_genes, n_samples, &values);
    let gene_ids: Vec<String> = (0..n_genes).map(|i| format!("gene_{:03}", i)).collect();
    let sample_ids: Vec<String> = (0..n_samples).map(|i| format!("GSM{:03}", i)).collect();
    ExpressionMatrix::new(data, gene_ids, sample_ids).unwrap()
}

/// Create metadata matching the synthetic expression matrix.
fn create_synthetic_metadata() -> SampleMetadata {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "sample_id\tgenotype\tnutrient\ttime").unwrap();
    for i in 0..90 {
        let genotype = ["wt", "mut1", "mut2"][i % 3];
        let nutrient = ["low", "medium", "high"][(i / 3) % 3];
        let time = ["0h", "6h", "24h"][(i / 9) % 3];
        writeln!(file, "GSM{:03}\t{}\t{}\t{}", i, genotype, nutrient, time).unwrap();
    }
    file.flush().unwrap();
    SampleMetadata::from_tsv(file.path()).unwrap()
}

#[test]
fn test_filter_rank_select_recovers_signal_genes() {
    let expression = create_synthetic_expression();
    let metadata = create_synthetic_metadata();
    check_correspondence(&expression, &metadata).unwrap();

    let (filtered, summary) = filter_by_median_total(&expression).unwrap();
    assert_eq!(summary.kept + summary.removed, 100);
    // signal genes have far larger totals than the median
    for g in 0..10 {
        assert!(filtered.gene_ids().contains(&format!("gene_{:03}", g)));
    }

    let formula = Formula::parse("~ genotype + nutrient + time").unwrap();
    let design = DesignMatrix::from_formula(&metadata, &formula).unwrap();
    let ranking = rank_genes(&filtered, &design, 10).unwrap();

    // exactly the injected signal genes come back
    assert_eq!(ranking.selected.len(), 10);
    for g in 0..10 {
        assert!(
            ranking.is_selected(&format!("gene_{:03}", g)),
            "gene_{:03} missing from selection",
            g
        );
    }

    // scores are valid probabilities
    for s in &ranking.scores {
        if !s.score.is_nan() {
            assert!((0.0..=1.0).contains(&s.score));
        }
    }
}

#[test]
fn test_full_pipeline_end_to_end() {
    let expression = create_synthetic_expression();
    let metadata = create_synthetic_metadata();

    let config = EdaConfig {
        top_n: 10,
        candidate_ks: vec![3, 4, 5],
        ..EdaConfig::default()
    };
    let report = run_eda(&expression, &metadata, &config).unwrap();

    assert_eq!(report.ranking.selected.len(), 10);
    assert_eq!(report.silhouettes.len(), 3);
    assert_eq!(report.silhouettes[0].k, 3);

    // heatmap covers the selected genes over all samples
    assert_eq!(report.heatmap.gene_ids().len(), 10);
    assert_eq!(report.heatmap.sample_ids().len(), 90);

    // heatmap rows are z-scored: values bounded and roughly centered
    for row in 0..10 {
        let mut sum = 0.0;
        for col in 0..90 {
            let v = report.heatmap.get(row, col);
            assert!(v.abs() < 10.0);
            sum += v;
        }
        assert!((sum / 90.0).abs() < 1e-6);
    }

    // samples differ only by genotype, which has 3 levels, so the dominant
    // structure is low-dimensional
    assert_eq!(report.pca.n_components(), 2);
    assert!(report.pca.explained_ratio()[0] > 0.5);

    // sample dendrogram covers every sample
    assert_eq!(report.sample_dendrogram.n_leaves(), 90);
    assert_eq!(report.sample_dendrogram.leaf_order().len(), 90);
}

#[test]
fn test_pipeline_artifacts_written() {
    let expression = create_synthetic_expression();
    let metadata = create_synthetic_metadata();
    let config = EdaConfig {
        top_n: 10,
        ..EdaConfig::default()
    };
    let report = run_eda(&expression, &metadata, &config).unwrap();

    let dir = tempfile::tempdir().unwrap();
    report.write_artifacts(dir.path()).unwrap();

    let ranking = std::fs::read_to_string(dir.path().join("ranking.tsv")).unwrap();
    assert!(ranking.starts_with("gene_id\tmin_p_value\n"));

    let heatmap = std::fs::read_to_string(dir.path().join("heatmap.tsv")).unwrap();
    assert_eq!(heatmap.lines().count(), 11); // header + 10 genes

    let pca_scores = std::fs::read_to_string(dir.path().join("pca_scores.tsv")).unwrap();
    assert_eq!(pca_scores.lines().count(), 91); // header + 90 samples

    // color legend covers every categorical model factor
    let colors = std::fs::read_to_string(dir.path().join("colors.json")).unwrap();
    for factor in ["genotype", "nutrient", "time"] {
        assert!(colors.contains(factor), "missing legend for {}", factor);
    }
}

#[test]
fn test_mismatched_metadata_fails_fast() {
    let expression = create_synthetic_expression();

    // metadata with a swapped sample order
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "sample_id\tgenotype\tnutrient\ttime").unwrap();
    for i in (0..90).rev() {
        let genotype = ["wt", "mut1", "mut2"][i % 3];
        writeln!(file, "GSM{:03}\t{}\tlow\t0h", i, genotype).unwrap();
    }
    file.flush().unwrap();
    let metadata = SampleMetadata::from_tsv(file.path()).unwrap();

    let result = check_correspondence(&expression, &metadata);
    assert!(matches!(
        result,
        Err(EdaError::Validation(ValidationFailure::SampleIdMismatch { .. }))
    ));

    // the pipeline refuses to run on the same inputs
    assert!(run_eda(&expression, &metadata, &EdaConfig::default()).is_err());
}

#[test]
fn test_gene_clusters_align_with_candidate_ks() {
    let expression = create_synthetic_expression();
    let metadata = create_synthetic_metadata();
    let config = EdaConfig {
        top_n: 10,
        candidate_ks: vec![3, 4, 5],
        ..EdaConfig::default()
    };
    let report = run_eda(&expression, &metadata, &config).unwrap();

    for (k, labels) in &report.gene_clusters {
        assert_eq!(labels.len(), 10);
        let distinct: std::collections::HashSet<_> = labels.iter().collect();
        assert_eq!(distinct.len(), *k);
    }
}
