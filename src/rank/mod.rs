//! Gene ranking by per-gene linear model significance.

pub mod lm;
pub mod score;

pub use lm::{fit_genes, GeneFitSingle, GeneFits};
pub use score::{rank_genes, score_gene, score_genes, GeneScore, RankingTable};
