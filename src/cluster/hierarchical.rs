//! Agglomerative hierarchical clustering with average linkage.

use crate::cluster::distance::DistanceMatrix;
use crate::error::{EdaError, Result};

/// A single agglomeration step.
///
/// Node ids follow the usual convention: leaves are `0..n`, and the node
/// created by the i-th merge is `n + i`.
#[derive(Debug, Clone, Copy)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub height: f64,
    /// Number of leaves under the merged node.
    pub size: usize,
}

/// Result of agglomerative clustering: `n_leaves - 1` merges in order of
/// increasing height.
#[derive(Debug, Clone)]
pub struct Dendrogram {
    n_leaves: usize,
    merges: Vec<Merge>,
}

impl Dendrogram {
    pub fn n_leaves(&self) -> usize {
        self.n_leaves
    }

    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    /// Leaf indices in dendrogram order (left-to-right traversal from the
    /// root). Used to reorder heatmap rows and columns.
    pub fn leaf_order(&self) -> Vec<usize> {
        let n = self.n_leaves;
        if n == 1 {
            return vec![0];
        }
        let root = n + self.merges.len() - 1;
        let mut order = Vec::with_capacity(n);
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node < n {
                order.push(node);
            } else {
                let merge = &self.merges[node - n];
                // push right first so the left subtree is visited first
                stack.push(merge.right);
                stack.push(merge.left);
            }
        }
        order
    }

    /// Cut the tree into `k` flat clusters.
    ///
    /// Returns one label per leaf in `0..k`, numbered by order of first
    /// appearance over the leaves.
    pub fn cut(&self, k: usize) -> Result<Vec<usize>> {
        let n = self.n_leaves;
        if k == 0 || k > n {
            return Err(EdaError::InvalidParameter(format!(
                "Cannot cut a tree with {} leaves into {} clusters",
                n, k
            )));
        }

        // Replay the first n - k merges; the surviving groups are the clusters.
        // Nodes map to the slot in `members` currently holding their leaves;
        // every node id a merge references was created by an earlier step.
        let mut members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
        let mut node_slot: Vec<usize> = (0..n).collect();
        let mut consumed = vec![false; n];

        for merge in self.merges.iter().take(n - k) {
            let li = node_slot[merge.left];
            let ri = node_slot[merge.right];
            let mut right_members = std::mem::take(&mut members[ri]);
            members[li].append(&mut right_members);
            consumed[ri] = true;
            node_slot.push(li);
        }

        // Assign labels by first leaf appearance so output is deterministic.
        let mut label_of_group: Vec<Option<usize>> = vec![None; n];
        let mut labels = vec![0usize; n];
        let mut next = 0usize;
        let mut leaf_group = vec![0usize; n];
        for (gi, group) in members.iter().enumerate() {
            if consumed[gi] {
                continue;
            }
            for &leaf in group {
                leaf_group[leaf] = gi;
            }
        }
        for leaf in 0..n {
            let gi = leaf_group[leaf];
            let label = match label_of_group[gi] {
                Some(l) => l,
                None => {
                    let l = next;
                    label_of_group[gi] = Some(l);
                    next += 1;
                    l
                }
            };
            labels[leaf] = label;
        }

        Ok(labels)
    }
}

/// Average-linkage (UPGMA) agglomerative clustering.
///
/// At each step the closest pair of active clusters is merged, and the
/// distance from the new cluster to every other one is the size-weighted
/// mean of the two parents' distances (Lance-Williams update).
pub fn linkage_average(distances: &DistanceMatrix) -> Result<Dendrogram> {
    let n = distances.n();
    if n < 2 {
        return Err(EdaError::InvalidParameter(
            "Need at least 2 items to cluster".to_string(),
        ));
    }

    // Working copy of pairwise distances between active clusters, indexed by
    // slot in 0..n. Merges reuse the left slot and retire the right one.
    let mut dist = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = distances.get(i, j);
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }

    let mut active: Vec<bool> = vec![true; n];
    let mut sizes: Vec<usize> = vec![1; n];
    // Dendrogram node id currently occupying each slot.
    let mut node_ids: Vec<usize> = (0..n).collect();
    let mut merges = Vec::with_capacity(n - 1);

    for step in 0..(n - 1) {
        // Find the closest active pair.
        let mut best = (0usize, 0usize, f64::INFINITY);
        for i in 0..n {
            if !active[i] {
                continue;
            }
            for j in (i + 1)..n {
                if !active[j] {
                    continue;
                }
                if dist[i][j] < best.2 {
                    best = (i, j, dist[i][j]);
                }
            }
        }
        let (a, b, height) = best;
        if !height.is_finite() {
            return Err(EdaError::Numerical(
                "Non-finite distance encountered during clustering".to_string(),
            ));
        }

        let merged_size = sizes[a] + sizes[b];
        merges.push(Merge {
            left: node_ids[a],
            right: node_ids[b],
            height,
            size: merged_size,
        });

        // Lance-Williams average-linkage update into slot a.
        let (wa, wb) = (sizes[a] as f64, sizes[b] as f64);
        for i in 0..n {
            if i == a || i == b || !active[i] {
                continue;
            }
            let d = (wa * dist[a][i] + wb * dist[b][i]) / (wa + wb);
            dist[a][i] = d;
            dist[i][a] = d;
        }
        active[b] = false;
        sizes[a] = merged_size;
        node_ids[a] = n + step;
    }

    Ok(Dendrogram {
        n_leaves: n,
        merges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line_points() -> DistanceMatrix {
        // Points at 0, 1, 10, 11 on a line: two tight pairs far apart.
        let data = vec![vec![0.0], vec![1.0], vec![10.0], vec![11.0]];
        DistanceMatrix::from_vectors(&data).unwrap()
    }

    #[test]
    fn test_merge_heights_monotone() {
        let dendro = linkage_average(&line_points()).unwrap();
        assert_eq!(dendro.merges().len(), 3);
        let heights: Vec<f64> = dendro.merges().iter().map(|m| m.height).collect();
        assert!(heights.windows(2).all(|w| w[0] <= w[1]));
        // the two unit pairs merge first at height 1
        assert_relative_eq!(heights[0], 1.0);
        assert_relative_eq!(heights[1], 1.0);
        // final merge is the average of the 4 cross distances: (10+11+9+10)/4
        assert_relative_eq!(heights[2], 10.0);
    }

    #[test]
    fn test_leaf_order_keeps_pairs_adjacent() {
        let dendro = linkage_average(&line_points()).unwrap();
        let order = dendro.leaf_order();
        assert_eq!(order.len(), 4);
        let pos: Vec<usize> = (0..4).map(|i| order.iter().position(|&x| x == i).unwrap()).collect();
        assert_eq!((pos[0] as isize - pos[1] as isize).abs(), 1);
        assert_eq!((pos[2] as isize - pos[3] as isize).abs(), 1);
    }

    #[test]
    fn test_cut_recovers_groups() {
        let dendro = linkage_average(&line_points()).unwrap();
        let labels = dendro.cut(2).unwrap();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
        // labels numbered by first leaf appearance
        assert_eq!(labels[0], 0);
        assert_eq!(labels[2], 1);
    }

    #[test]
    fn test_cut_extremes() {
        let dendro = linkage_average(&line_points()).unwrap();
        let singletons = dendro.cut(4).unwrap();
        assert_eq!(singletons, vec![0, 1, 2, 3]);
        let one = dendro.cut(1).unwrap();
        assert!(one.iter().all(|&l| l == 0));
        assert!(dendro.cut(0).is_err());
        assert!(dendro.cut(5).is_err());
    }
}
