//! EDA - Microarray exploratory analysis CLI
//!
//! Command-line interface for the exploratory expression analysis pipeline.

use clap::{Parser, Subcommand};
use microarray_eda::data::{ExpressionMatrix, SampleMetadata};
use microarray_eda::error::Result;
use microarray_eda::fetch::{clear_cache, fetch_dataset, FetchConfig};
use microarray_eda::pipeline::{run_eda, EdaConfig};
use microarray_eda::validate::check_correspondence;
use std::path::PathBuf;

/// Microarray exploratory analysis
#[derive(Parser)]
#[command(name = "eda")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis on local data files
    Run {
        /// Path to expression matrix TSV
        #[arg(short = 'e', long)]
        expression: PathBuf,

        /// Path to sample metadata TSV
        #[arg(short, long)]
        metadata: PathBuf,

        /// Path to analysis configuration YAML (defaults apply if omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for report tables
        #[arg(short, long, default_value = "eda-report")]
        output: PathBuf,
    },

    /// Download a dataset by accession into the local cache
    Fetch {
        /// Dataset accession (e.g. GSE12345)
        accession: String,

        /// Cache directory (defaults to the platform cache dir)
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Clear the cache instead of downloading
        #[arg(long)]
        clear: bool,
    },

    /// Check that an expression matrix and metadata table correspond
    Validate {
        /// Path to expression matrix TSV
        #[arg(short = 'e', long)]
        expression: PathBuf,

        /// Path to sample metadata TSV
        #[arg(short, long)]
        metadata: PathBuf,
    },

    /// Write an example configuration YAML
    Example {
        /// Output path for the example YAML
        #[arg(short, long, default_value = "eda.yaml")]
        output: PathBuf,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            expression,
            metadata,
            config,
            output,
        } => cmd_run(&expression, &metadata, config.as_deref(), &output),

        Commands::Fetch {
            accession,
            cache_dir,
            clear,
        } => cmd_fetch(&accession, cache_dir, clear),

        Commands::Validate {
            expression,
            metadata,
        } => cmd_validate(&expression, &metadata),

        Commands::Example { output } => cmd_example(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(
    expression_path: &PathBuf,
    metadata_path: &PathBuf,
    config_path: Option<&std::path::Path>,
    output_dir: &PathBuf,
) -> Result<()> {
    let config = match config_path {
        Some(path) => {
            eprintln!("Loading configuration from {:?}...", path);
            EdaConfig::from_yaml_file(path)?
        }
        None => EdaConfig::default(),
    };

    eprintln!("Loading data...");
    let expression = ExpressionMatrix::from_tsv(expression_path)?;
    let metadata = SampleMetadata::from_tsv(metadata_path)?;

    eprintln!(
        "Loaded {} genes x {} samples",
        expression.n_genes(),
        expression.n_samples()
    );

    eprintln!("Running analysis (formula: {})...", config.formula);
    let report = run_eda(&expression, &metadata, &config)?;

    eprintln!(
        "Filter kept {} genes; {} selected after ranking",
        report.filter_summary.kept,
        report.ranking.selected.len()
    );
    for s in &report.silhouettes {
        eprintln!("  k={}: mean silhouette width {:.4}", s.k, s.mean_width);
    }
    eprintln!(
        "PC1 explains {:.1}% of variance, PC2 {:.1}%",
        report.pca.explained_ratio().first().copied().unwrap_or(0.0) * 100.0,
        report.pca.explained_ratio().get(1).copied().unwrap_or(0.0) * 100.0
    );

    eprintln!("Writing report tables to {:?}...", output_dir);
    report.write_artifacts(output_dir)?;
    eprintln!("Done.");

    Ok(())
}

fn cmd_fetch(accession: &str, cache_dir: Option<PathBuf>, clear: bool) -> Result<()> {
    let mut config = FetchConfig::default();
    if let Some(dir) = cache_dir {
        config.cache_dir = dir;
    }

    if clear {
        clear_cache(&config)?;
        eprintln!("Cache cleared.");
        return Ok(());
    }

    eprintln!("Fetching {}...", accession);
    let fetched = fetch_dataset(accession, &config)?;
    eprintln!(
        "Fetched {} genes x {} samples into {:?}",
        fetched.expression.n_genes(),
        fetched.expression.n_samples(),
        fetched.cache_dir
    );

    Ok(())
}

fn cmd_validate(expression_path: &PathBuf, metadata_path: &PathBuf) -> Result<()> {
    let expression = ExpressionMatrix::from_tsv(expression_path)?;
    let metadata = SampleMetadata::from_tsv(metadata_path)?;

    check_correspondence(&expression, &metadata)?;
    eprintln!(
        "OK: {} samples match between expression matrix and metadata",
        expression.n_samples()
    );

    Ok(())
}

fn cmd_example(output_path: &PathBuf) -> Result<()> {
    let config = EdaConfig::default();
    let yaml = config.to_yaml()?;

    std::fs::write(output_path, &yaml)?;
    eprintln!("Wrote example configuration to {:?}", output_path);
    eprintln!();
    println!("{}", yaml);

    Ok(())
}
