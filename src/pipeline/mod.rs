//! Pipeline orchestration.

pub mod runner;

pub use runner::{run_eda, EdaConfig, EdaReport, SampleOrdering, SilhouetteSummary};
