//! Data structures for microarray exploratory analysis.

mod design_matrix;
mod expression_matrix;
mod formula;
mod metadata;

pub use design_matrix::DesignMatrix;
pub use expression_matrix::ExpressionMatrix;
pub use formula::Formula;
pub use metadata::{SampleMetadata, Variable, VariableType};
