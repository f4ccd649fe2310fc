//! Hierarchical clustering of samples and genes.

pub mod distance;
pub mod hierarchical;
pub mod silhouette;

pub use distance::{Axis, DistanceMatrix};
pub use hierarchical::{linkage_average, Dendrogram, Merge};
pub use silhouette::{silhouette, SilhouetteResult};
