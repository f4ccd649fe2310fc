//! Fetch public expression datasets by accession, with a local cache.

use crate::data::{ExpressionMatrix, SampleMetadata};
use crate::error::{EdaError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://ftp.ncbi.nlm.nih.gov/geo/series";
const DEFAULT_ATTEMPTS: u32 = 3;

/// Where and how to fetch datasets.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    pub cache_dir: PathBuf,
    /// Download attempts per file before giving up.
    pub attempts: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_dir: default_cache_dir(),
            attempts: DEFAULT_ATTEMPTS,
        }
    }
}

/// A downloaded dataset, parsed and ready for the pipeline.
pub struct FetchedDataset {
    pub accession: String,
    pub expression: ExpressionMatrix,
    pub metadata: SampleMetadata,
    pub cache_dir: PathBuf,
}

fn expression_filename(accession: &str) -> String {
    format!("{}_expression_matrix.tsv", accession)
}

fn metadata_filename(accession: &str) -> String {
    format!("{}_sample_metadata.tsv", accession)
}

/// Fetch a dataset by accession, using the cache if both files are present.
pub fn fetch_dataset(accession: &str, config: &FetchConfig) -> Result<FetchedDataset> {
    if accession.is_empty() {
        return Err(EdaError::InvalidParameter(
            "Dataset accession must not be empty".to_string(),
        ));
    }

    fs::create_dir_all(&config.cache_dir)?;

    let expression_file = config.cache_dir.join(expression_filename(accession));
    let metadata_file = config.cache_dir.join(metadata_filename(accession));

    if !expression_file.exists() {
        log::info!("Downloading {}", expression_filename(accession));
        download_file(
            &format!("{}/{}", config.base_url, expression_filename(accession)),
            &expression_file,
            config.attempts,
        )?;
    }
    if !metadata_file.exists() {
        log::info!("Downloading {}", metadata_filename(accession));
        download_file(
            &format!("{}/{}", config.base_url, metadata_filename(accession)),
            &metadata_file,
            config.attempts,
        )?;
    }

    let expression = ExpressionMatrix::from_tsv(&expression_file)?;
    let metadata = SampleMetadata::from_tsv(&metadata_file)?;

    Ok(FetchedDataset {
        accession: accession.to_string(),
        expression,
        metadata,
        cache_dir: config.cache_dir.clone(),
    })
}

/// Remove all cached dataset files.
pub fn clear_cache(config: &FetchConfig) -> Result<()> {
    if config.cache_dir.exists() {
        fs::remove_dir_all(&config.cache_dir)?;
    }
    Ok(())
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("microarray-eda")
        .join("datasets")
}

/// Shell out to curl, retrying transient failures a bounded number of times.
fn download_file(url: &str, dest: &Path, attempts: u32) -> Result<()> {
    let attempts = attempts.max(1);
    let mut last_failure = String::new();

    for attempt in 1..=attempts {
        if attempt > 1 {
            log::warn!(
                "Retrying download ({}/{}): {}",
                attempt,
                attempts,
                last_failure
            );
            std::thread::sleep(Duration::from_millis(500 * u64::from(attempt)));
        }

        let dest_str = dest.to_string_lossy();
        let output = std::process::Command::new("curl")
            .args(["-sfL", "-o", dest_str.as_ref(), url])
            .output()
            .map_err(|e| EdaError::SourceUnavailable(format!("Failed to run curl: {}", e)))?;

        if output.status.success() {
            let meta = fs::metadata(dest)?;
            if meta.len() > 0 {
                return Ok(());
            }
            last_failure = "downloaded file is empty".to_string();
        } else {
            last_failure = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if last_failure.is_empty() {
                last_failure = format!("curl exited with {}", output.status);
            }
        }
        let _ = fs::remove_file(dest);
    }

    Err(EdaError::SourceUnavailable(format!(
        "Download failed after {} attempts for {}: {}",
        attempts, url, last_failure
    )))
}
