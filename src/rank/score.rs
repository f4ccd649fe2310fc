//! Gene ranking by minimum non-intercept coefficient p-value.

use crate::data::{DesignMatrix, ExpressionMatrix};
use crate::error::{EdaError, Result};
use crate::rank::lm::{fit_genes, GeneFitSingle, GeneFits};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One scored gene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneScore {
    /// Gene identifier.
    pub gene_id: String,
    /// Minimum two-sided p-value across non-intercept coefficients.
    /// NaN marks a degenerate fit.
    pub score: f64,
}

/// All genes ranked ascending by score, with degenerate fits sorted last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingTable {
    /// Scores sorted ascending; NaN scores at the end.
    pub scores: Vec<GeneScore>,
    /// Gene ids of the top-N selection, excluding degenerate fits.
    pub selected: Vec<String>,
    /// Number of genes whose fit was degenerate.
    pub n_degenerate: usize,
}

impl RankingTable {
    /// Number of ranked genes (including degenerate ones).
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Score for a specific gene.
    pub fn get_score(&self, gene_id: &str) -> Option<f64> {
        self.scores
            .iter()
            .find(|s| s.gene_id == gene_id)
            .map(|s| s.score)
    }

    /// Whether a gene made the selection.
    pub fn is_selected(&self, gene_id: &str) -> bool {
        self.selected.iter().any(|id| id == gene_id)
    }

    /// Write the ranking as a two-column TSV.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "gene_id\tmin_p_value")?;
        for s in &self.scores {
            if s.score.is_nan() {
                writeln!(writer, "{}\tNA", s.gene_id)?;
            } else {
                writeln!(writer, "{}\t{}", s.gene_id, s.score)?;
            }
        }
        Ok(())
    }
}

/// Score a single fitted gene.
///
/// The score is the smallest two-sided t-test p-value among non-intercept
/// coefficients. A zero-residual fit with a non-zero estimate is maximally
/// significant (p = 0); a coefficient with zero estimate and zero standard
/// error carries no information and is skipped. Genes with no usable
/// coefficient score NaN.
pub fn score_gene(fit: &GeneFitSingle, non_intercept: &[usize]) -> f64 {
    if !fit.converged || fit.df_residual == 0 {
        return f64::NAN;
    }

    // df is fixed per pass, so the distribution is the same for all genes
    let t_dist = match StudentsT::new(0.0, 1.0, fit.df_residual as f64) {
        Ok(d) => d,
        Err(_) => return f64::NAN,
    };

    let mut min_p = f64::NAN;
    for &idx in non_intercept {
        let estimate = fit.coefficients[idx];
        let se = fit.std_errors[idx];
        if !estimate.is_finite() || !se.is_finite() {
            continue;
        }
        let p = if se > 0.0 {
            let statistic = estimate / se;
            2.0 * (1.0 - t_dist.cdf(statistic.abs()))
        } else if estimate != 0.0 {
            // perfect fit: the factor level predicts expression exactly
            0.0
        } else {
            continue;
        };
        if min_p.is_nan() || p < min_p {
            min_p = p;
        }
    }
    min_p
}

/// Score all fitted genes and rank them ascending.
pub fn score_genes(fits: &GeneFits, design: &DesignMatrix, top_n: usize) -> Result<RankingTable> {
    let non_intercept = design.non_intercept_indices();
    if non_intercept.is_empty() {
        return Err(EdaError::InvalidParameter(
            "Ranking requires at least one non-intercept coefficient".to_string(),
        ));
    }

    let mut scores: Vec<GeneScore> = fits
        .fits
        .iter()
        .map(|f| GeneScore {
            gene_id: f.gene_id.clone(),
            score: score_gene(f, &non_intercept),
        })
        .collect();

    // Ascending, NaN last
    scores.sort_by(|a, b| match (a.score.is_nan(), b.score.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => a
            .score
            .partial_cmp(&b.score)
            .unwrap_or(std::cmp::Ordering::Equal),
    });

    let n_degenerate = scores.iter().filter(|s| s.score.is_nan()).count();
    let selected: Vec<String> = scores
        .iter()
        .filter(|s| !s.score.is_nan())
        .take(top_n)
        .map(|s| s.gene_id.clone())
        .collect();

    Ok(RankingTable {
        scores,
        selected,
        n_degenerate,
    })
}

/// Fit, score, and rank every gene in one pass.
///
/// Convenience wrapper around [`fit_genes`] and [`score_genes`].
pub fn rank_genes(
    expression: &ExpressionMatrix,
    design: &DesignMatrix,
    top_n: usize,
) -> Result<RankingTable> {
    let fits = fit_genes(expression, design)?;
    score_genes(&fits, design, top_n)
}
