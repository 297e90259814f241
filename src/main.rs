use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use astro_corpus::pipeline::INTERRUPTED_EXIT_CODE;
use astro_corpus::{Capabilities, CorpusBuilder, PipelineConfig, PipelineContext, RunOptions, RunReport};

#[derive(Debug, Parser)]
#[command(author, version, about = "Build an astrology word-embedding corpus from a directory of PDFs")]
struct Cli {
    /// Directory containing PDF files
    #[arg(long)]
    pdf_dir: PathBuf,

    /// Raw extracted text output
    #[arg(long, default_value = "data/extracted_text.txt")]
    raw_output: PathBuf,

    /// Cleaned, tokenized text output
    #[arg(long, default_value = "data/cleaned_text.txt")]
    clean_output: PathBuf,

    /// Where the trainer writes the model
    #[arg(long, default_value = "models/astro_vec_model")]
    model_output: PathBuf,

    /// Embedding dimensionality [default: 300]
    #[arg(long)]
    vector_size: Option<usize>,

    /// Context window size [default: 5]
    #[arg(long)]
    window: Option<usize>,

    /// Minimum term frequency [default: 5]
    #[arg(long)]
    min_count: Option<usize>,

    /// Only extract and clean text, do not train
    #[arg(long)]
    skip_model: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON file with pipeline thresholds
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the run summary as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Descend into subdirectories
    #[arg(long)]
    recursive: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "astro_corpus=debug,info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match run(cli) {
        Ok(report) => ExitCode::from(report.exit_code()),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<RunReport> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {:?}", path);
            PipelineConfig::from_file(path)?
        }
        None => PipelineConfig::default(),
    };

    if let Some(vector_size) = cli.vector_size {
        config.training.vector_size = vector_size;
    }
    if let Some(window) = cli.window {
        config.training.window = window;
    }
    if let Some(min_count) = cli.min_count {
        config.training.min_count = min_count;
    }
    config.validate().context("Invalid configuration")?;

    let capabilities = Capabilities::probe();
    capabilities.log();

    let options = RunOptions {
        pdf_dir: cli.pdf_dir,
        raw_output: cli.raw_output,
        clean_output: cli.clean_output,
        model_output: cli.model_output,
        skip_model: cli.skip_model,
        recursive: cli.recursive,
    };
    let context = PipelineContext::new(config, capabilities, options);
    install_interrupt_handler(context.interrupt_handle())?;

    info!("Processing PDFs from {:?}", context.options.pdf_dir);
    let builder = CorpusBuilder::standard(&context);
    let report = builder.run(&context)?;
    report.log_summary();

    if let Some(path) = &cli.report {
        report.write_json(path)?;
    }

    Ok(report)
}

/// First Ctrl-C stops after the current document; a second one exits at once.
fn install_interrupt_handler(flag: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            warn!("Interrupted again, exiting immediately");
            std::process::exit(i32::from(INTERRUPTED_EXIT_CODE));
        }
        warn!("Interrupt received, finishing the current document");
    })
    .context("Failed to install interrupt handler")
}
