//! Microarray Exploratory Data Analysis Library
//!
//! This library implements a forward-only exploratory analysis pipeline for
//! microarray expression data: load an expression matrix and sample
//! metadata, validate their correspondence, cluster samples, filter and rank
//! genes, build a z-scored heatmap table, evaluate gene clusterings by
//! silhouette width, and run PCA.
//!
//! # Overview
//!
//! The library is organized by pipeline stage:
//!
//! - **data**: Core data structures (ExpressionMatrix, SampleMetadata,
//!   Formula, DesignMatrix)
//! - **fetch**: Dataset download by accession with a local cache
//! - **validate**: Expression/metadata correspondence checks
//! - **filter**: Gene filtering by median total expression
//! - **rank**: Per-gene linear model fitting and p-value ranking
//! - **cluster**: Distance matrices, average-linkage clustering, silhouette
//! - **pca**: Principal component analysis of samples
//! - **report**: Heatmap tables, display orderings, color mapping
//! - **pipeline**: End-to-end orchestration
//!
//! # Example
//!
//! ```no_run
//! use microarray_eda::prelude::*;
//!
//! let expression = ExpressionMatrix::from_tsv("expression.tsv").unwrap();
//! let metadata = SampleMetadata::from_tsv("metadata.tsv").unwrap();
//!
//! let config = EdaConfig::default();
//! let report = run_eda(&expression, &metadata, &config).unwrap();
//! report.write_artifacts("eda-report").unwrap();
//! ```

pub mod cluster;
pub mod data;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod pca;
pub mod pipeline;
pub mod rank;
pub mod report;
pub mod validate;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::cluster::{
        linkage_average, silhouette, Axis, Dendrogram, DistanceMatrix, Merge, SilhouetteResult,
    };
    pub use crate::data::{
        DesignMatrix, ExpressionMatrix, Formula, SampleMetadata, Variable, VariableType,
    };
    pub use crate::error::{EdaError, Result, ValidationFailure};
    pub use crate::fetch::{clear_cache, fetch_dataset, FetchConfig, FetchedDataset};
    pub use crate::filter::{filter_by_median_total, FilterSummary};
    pub use crate::pca::{pca, PcaResult};
    pub use crate::pipeline::{run_eda, EdaConfig, EdaReport, SampleOrdering, SilhouetteSummary};
    pub use crate::rank::{
        fit_genes, rank_genes, score_gene, score_genes, GeneFitSingle, GeneFits, GeneScore,
        RankingTable,
    };
    pub use crate::report::{sample_order_by_attribute, ColorMap, HeatmapTable};
    pub use crate::validate::check_correspondence;
}
