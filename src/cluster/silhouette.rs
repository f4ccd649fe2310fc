//! Silhouette widths for evaluating a flat clustering.

use crate::cluster::distance::DistanceMatrix;
use crate::error::{EdaError, Result};

/// Per-item silhouette widths and their mean.
#[derive(Debug, Clone)]
pub struct SilhouetteResult {
    pub widths: Vec<f64>,
    pub mean: f64,
}

/// Compute silhouette widths for a labelling of the items in `distances`.
///
/// For item `i`, `a(i)` is the mean distance to the other members of its own
/// cluster and `b(i)` the smallest mean distance to any other cluster; the
/// width is `(b - a) / max(a, b)`. Members of singleton clusters get width
/// 0.0. Requires at least 2 distinct clusters.
pub fn silhouette(distances: &DistanceMatrix, labels: &[usize]) -> Result<SilhouetteResult> {
    let n = distances.n();
    if labels.len() != n {
        return Err(EdaError::DimensionMismatch {
            expected: n,
            actual: labels.len(),
        });
    }

    let n_clusters = labels.iter().max().map_or(0, |&m| m + 1);
    let mut counts = vec![0usize; n_clusters];
    for &l in labels {
        counts[l] += 1;
    }
    if counts.iter().filter(|&&c| c > 0).count() < 2 {
        return Err(EdaError::InvalidParameter(
            "Silhouette requires at least 2 clusters".to_string(),
        ));
    }

    let mut widths = Vec::with_capacity(n);
    for i in 0..n {
        let own = labels[i];
        if counts[own] == 1 {
            widths.push(0.0);
            continue;
        }

        // Sum of distances from i to each cluster.
        let mut sums = vec![0.0f64; n_clusters];
        for j in 0..n {
            if j != i {
                sums[labels[j]] += distances.get(i, j);
            }
        }

        let a = sums[own] / (counts[own] - 1) as f64;
        let b = (0..n_clusters)
            .filter(|&c| c != own && counts[c] > 0)
            .map(|c| sums[c] / counts[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        widths.push(if denom > 0.0 { (b - a) / denom } else { 0.0 });
    }

    let mean = widths.iter().sum::<f64>() / n as f64;
    Ok(SilhouetteResult { widths, mean })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_tight_pairs() -> DistanceMatrix {
        let data = vec![vec![0.0], vec![1.0], vec![10.0], vec![11.0]];
        DistanceMatrix::from_vectors(&data).unwrap()
    }

    #[test]
    fn test_well_separated_clusters_score_high() {
        let dm = two_tight_pairs();
        let result = silhouette(&dm, &[0, 0, 1, 1]).unwrap();
        assert!(result.mean > 0.85);
        assert!(result.widths.iter().all(|&w| w > 0.8));
    }

    #[test]
    fn test_singletons_get_zero() {
        let dm = two_tight_pairs();
        let result = silhouette(&dm, &[0, 1, 2, 3]).unwrap();
        assert!(result.widths.iter().all(|&w| w == 0.0));
        assert_relative_eq!(result.mean, 0.0);
    }

    #[test]
    fn test_natural_k_beats_oversplit() {
        let dm = two_tight_pairs();
        let k2 = silhouette(&dm, &[0, 0, 1, 1]).unwrap();
        let k3 = silhouette(&dm, &[0, 0, 1, 2]).unwrap();
        let k4 = silhouette(&dm, &[0, 1, 2, 3]).unwrap();
        assert!(k2.mean > k3.mean);
        assert!(k2.mean > k4.mean);
    }

    #[test]
    fn test_single_cluster_rejected() {
        let dm = two_tight_pairs();
        assert!(silhouette(&dm, &[0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_label_length_mismatch() {
        let dm = two_tight_pairs();
        assert!(silhouette(&dm, &[0, 1]).is_err());
    }
}
