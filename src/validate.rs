//! Expression/metadata correspondence validation.
//!
//! Checks that the two tables describe the same samples in the same order
//! before any analysis runs. Violations halt the pipeline rather than
//! letting misaligned tables flow into the model fits.

use crate::data::{ExpressionMatrix, SampleMetadata};
use crate::error::{EdaError, Result, ValidationFailure};
use std::collections::HashSet;

/// Validate that expression columns correspond to metadata rows.
///
/// Checks, in order:
/// 1. the sample counts match,
/// 2. all sample ids are unique,
/// 3. the ids are identical and in the same order.
///
/// The first violated invariant is returned as `EdaError::Validation`.
pub fn check_correspondence(
    expression: &ExpressionMatrix,
    metadata: &SampleMetadata,
) -> Result<()> {
    if expression.n_samples() != metadata.n_samples() {
        return Err(EdaError::Validation(ValidationFailure::SampleCount {
            expression: expression.n_samples(),
            metadata: metadata.n_samples(),
        }));
    }

    let mut seen = HashSet::new();
    for id in expression.sample_ids() {
        if !seen.insert(id.as_str()) {
            return Err(EdaError::Validation(ValidationFailure::DuplicateSampleId(
                id.clone(),
            )));
        }
    }

    for (index, (expr_id, meta_id)) in expression
        .sample_ids()
        .iter()
        .zip(metadata.sample_ids())
        .enumerate()
    {
        if expr_id != meta_id {
            return Err(EdaError::Validation(ValidationFailure::SampleIdMismatch {
                index,
                expression: expr_id.clone(),
                metadata: meta_id.clone(),
            }));
        }
    }

    Ok(())
}
