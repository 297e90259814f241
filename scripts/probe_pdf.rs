use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use astro_corpus::data::NormalizationStats;
use astro_corpus::utils::extractor::ExtractionAttempt;
use astro_corpus::utils::scan_detector::ScanAssessment;
use astro_corpus::utils::Document;
use astro_corpus::{Capabilities, ExtractionMethod, PipelineConfig, ScanDetector, TextExtractor, TextNormalizer};

#[derive(Debug, Parser)]
#[command(author, version, about = "Show how a single PDF moves through extraction and cleaning")]
struct Args {
    /// PDF file to inspect
    pdf: PathBuf,

    /// JSON file with pipeline thresholds
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of cleaned sentences to print
    #[arg(long, default_value_t = 5)]
    sample: usize,

    /// Print the diagnostics as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    file: String,
    bytes: u64,
    pages: usize,
    layout_tier: bool,
    ocr_tier: bool,
    lexicon_terms: usize,
    scanned: bool,
    scan_reason: Option<String>,
    avg_sampled_chars: f64,
    method: ExtractionMethod,
    chars: usize,
    suspicious: bool,
    attempts: Vec<AttemptSummary>,
    normalization: NormalizationStats,
    sample: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AttemptSummary {
    strategy: &'static str,
    method: ExtractionMethod,
    chars: usize,
    failure: Option<String>,
}

impl From<&ExtractionAttempt> for AttemptSummary {
    fn from(attempt: &ExtractionAttempt) -> Self {
        Self {
            strategy: attempt.strategy,
            method: attempt.method,
            chars: attempt.yield_chars(),
            failure: attempt.failure.clone(),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    config.validate()?;

    let capabilities = Capabilities::probe();
    capabilities.log();

    let document = Document::open(&args.pdf)
        .with_context(|| format!("Failed to open PDF: {:?}", args.pdf))?;
    info!("Opened {} ({} pages)", document.file_name(), document.page_count());

    let assessment: ScanAssessment = ScanDetector::new(config.scan.clone())
        .assess(&document)
        .with_context(|| "Failed to sample pages")?;

    let extractor = TextExtractor::standard(&config, capabilities.layout_aware, capabilities.ocr);
    let extraction = extractor.extract(&document);

    let normalizer = TextNormalizer::standard(config.normalizer.clone());
    let (sentences, stats) = normalizer.normalize_with_stats(&extraction);

    let report = ProbeReport {
        file: document.file_name(),
        bytes: document.byte_size(),
        pages: document.page_count(),
        layout_tier: extractor.has_layout(),
        ocr_tier: extractor.has_ocr(),
        lexicon_terms: normalizer.lexicon().len(),
        scanned: assessment.is_scanned(),
        scan_reason: assessment.reason.map(|r| format!("{:?}", r)),
        avg_sampled_chars: assessment.avg_text_len,
        method: extraction.method,
        chars: extraction.char_count,
        suspicious: extraction.suspicious,
        attempts: extraction.attempts.iter().map(AttemptSummary::from).collect(),
        normalization: stats,
        sample: sentences
            .iter()
            .take(args.sample)
            .map(|s| s.to_string())
            .collect(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("File:        {} ({:.1} MB, {} pages)", report.file, document.size_mb(), report.pages);
    println!(
        "Tiers:       native, layout {}, ocr {} ({} lexicon terms)",
        if report.layout_tier { "on" } else { "off" },
        if report.ocr_tier { "on" } else { "off" },
        report.lexicon_terms
    );
    println!(
        "Scanned:     {} (avg {:.0} chars over {} sampled pages{})",
        report.scanned,
        report.avg_sampled_chars,
        assessment.samples.len(),
        report
            .scan_reason
            .as_deref()
            .map(|r| format!(", {}", r))
            .unwrap_or_default()
    );
    println!("Method:      {} ({} chars)", report.method, report.chars);
    if report.suspicious {
        println!("Warning:     very little text for the page count");
    }
    for attempt in &report.attempts {
        match &attempt.failure {
            Some(reason) => println!("  {:<18} failed: {}", attempt.strategy, reason),
            None => println!("  {:<18} {} chars", attempt.strategy, attempt.chars),
        }
    }
    println!(
        "Sentences:   {} retained of {} (toc {}, refs {}, copyright {}, short {}, long {}, sparse {})",
        report.normalization.retained_sentences,
        report.normalization.sentences,
        report.normalization.toc_paragraphs,
        report.normalization.reference_paragraphs,
        report.normalization.copyright_sentences,
        report.normalization.short_sentences,
        report.normalization.long_sentences,
        report.normalization.sparse_sentences,
    );
    for line in &report.sample {
        println!("  | {}", line);
    }

    Ok(())
}
