use anyhow::{ensure, Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use super::context::PipelineContext;
use super::report::{DocumentReport, RunReport};
use crate::data::{Corpus, NormalizationStats, TextNormalizer, TokenizedSentence};
use crate::training::{BundleTrainer, EmbeddingTrainer};
use crate::utils::extractor::{ExtractionResult, TextExtractor};

/// A PDF found in the input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub bytes: u64,
}

impl SourceFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// `.pdf` files (any case) under `dir`, smallest first, ties broken by path.
pub fn discover_documents(dir: &Path, recursive: bool) -> Result<Vec<SourceFile>> {
    ensure!(dir.is_dir(), "PDF directory does not exist: {:?}", dir);

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files: Vec<SourceFile> = WalkDir::new(dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .map(|e| SourceFile {
            bytes: e.metadata().map(|m| m.len()).unwrap_or(0),
            path: e.into_path(),
        })
        .collect();

    files.sort_by(|a, b| a.bytes.cmp(&b.bytes).then_with(|| a.path.cmp(&b.path)));
    Ok(files)
}

/// The raw and cleaned text files, appended one document block at a time.
struct Artifacts {
    raw: BufWriter<File>,
    clean: BufWriter<File>,
}

impl Artifacts {
    fn create(raw_path: &Path, clean_path: &Path) -> Result<Self> {
        Ok(Self {
            raw: BufWriter::new(create_file(raw_path)?),
            clean: BufWriter::new(create_file(clean_path)?),
        })
    }

    fn write_raw(&mut self, name: &str, text: &str) -> Result<()> {
        write!(self.raw, "\n\n=== {} ===\n\n{}", name, text)?;
        self.raw.flush().with_context(|| "Failed to flush raw text output")
    }

    fn write_clean(&mut self, name: &str, sentences: &[TokenizedSentence]) -> Result<()> {
        write!(self.clean, "\n\n=== {} ===\n\n", name)?;
        for sentence in sentences {
            writeln!(self.clean, "{}", sentence)?;
        }
        self.clean.flush().with_context(|| "Failed to flush cleaned text output")
    }

    fn finish(mut self) -> Result<()> {
        self.raw.flush()?;
        self.clean.flush()?;
        Ok(())
    }
}

fn create_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))
}

/// What one document contributed.
struct DocumentOutcome {
    extraction: ExtractionResult,
    sentences: Vec<TokenizedSentence>,
    stats: NormalizationStats,
}

/// Drives a directory run: discover, extract, normalize, write artifacts, train.
pub struct CorpusBuilder {
    extractor: TextExtractor,
    normalizer: TextNormalizer,
    trainer: Box<dyn EmbeddingTrainer>,
}

impl CorpusBuilder {
    pub fn new(
        extractor: TextExtractor,
        normalizer: TextNormalizer,
        trainer: Box<dyn EmbeddingTrainer>,
    ) -> Self {
        Self {
            extractor,
            normalizer,
            trainer,
        }
    }

    /// Stock backends for the tiers the context reports as available.
    pub fn standard(context: &PipelineContext) -> Self {
        let extractor = TextExtractor::standard(
            &context.config,
            context.capabilities.layout_aware,
            context.capabilities.ocr,
        );
        let normalizer = TextNormalizer::standard(context.config.normalizer.clone());
        Self::new(extractor, normalizer, Box::new(BundleTrainer))
    }

    pub fn run(&self, context: &PipelineContext) -> Result<RunReport> {
        let start = Instant::now();
        let options = &context.options;

        let files = discover_documents(&options.pdf_dir, options.recursive)?;
        info!("Found {} PDF files in {:?}", files.len(), options.pdf_dir);
        info!(
            layout_tier = self.extractor.has_layout(),
            ocr_tier = self.extractor.has_ocr(),
            lexicon_terms = self.normalizer.lexicon().len(),
            "Extraction tiers ready"
        );

        let mut artifacts = Artifacts::create(&options.raw_output, &options.clean_output)?;
        let mut corpus = Corpus::new();
        let mut report = RunReport::default();

        for (i, file) in files.iter().enumerate() {
            if context.is_interrupted() {
                warn!("Interrupted, stopping before {}", file.file_name());
                report.interrupted = true;
                break;
            }

            let name = file.file_name();
            info!(
                "[{}/{}] Processing {} ({:.1} MB)",
                i + 1,
                files.len(),
                name,
                file.bytes as f64 / (1024.0 * 1024.0)
            );

            let outcome = match self.process(file) {
                Ok(outcome) => outcome,
                Err(reason) => {
                    error!(file = %name, "Error processing document: {}", reason);
                    report.skipped += 1;
                    report.documents.push(skipped_document(file, reason));
                    continue;
                }
            };

            let extraction = &outcome.extraction;
            if extraction.is_empty() {
                warn!(file = %name, "No text extracted, skipping");
                report.skipped += 1;
                report
                    .documents
                    .push(skipped_document(file, "no text extracted".to_string()));
                continue;
            }

            artifacts.write_raw(&name, &extraction.text)?;
            artifacts.write_clean(&name, &outcome.sentences)?;

            report.processed += 1;
            report.ocr_used += usize::from(extraction.ocr_used);
            report.fallback_used += usize::from(extraction.fallback_used);
            report.suspicious += usize::from(extraction.suspicious);
            report.total_sentences += outcome.sentences.len();
            report.normalization.merge(&outcome.stats);
            report.documents.push(DocumentReport {
                file: name.clone(),
                bytes: file.bytes,
                method: extraction.method,
                chars: extraction.char_count,
                pages: extraction.page_count,
                sentences: outcome.sentences.len(),
                ocr_used: extraction.ocr_used,
                fallback_used: extraction.fallback_used,
                suspicious: extraction.suspicious,
                skipped: None,
            });

            info!(
                file = %name,
                method = %extraction.method,
                chars = extraction.char_count,
                sentences = outcome.sentences.len(),
                "Document processed"
            );
            corpus.extend(outcome.sentences);
        }

        artifacts.finish()?;

        if report.interrupted {
            warn!("Skipping model training after interruption");
        } else if corpus.is_empty() {
            warn!("No sentences were extracted from the PDFs, skipping model training");
        } else if options.skip_model {
            info!("Model training skipped on request");
        } else {
            info!(
                "Training {} model on {} sentences",
                self.trainer.name(),
                corpus.len()
            );
            match self
                .trainer
                .train(&corpus, &context.config.training, &options.model_output)
            {
                Ok(training) => report.training = Some(training),
                Err(e) => {
                    error!("Model training failed: {:#}", e);
                    report.training_error = Some(format!("{:#}", e));
                }
            }
        }

        report.elapsed_secs = start.elapsed().as_secs_f64();
        Ok(report)
    }

    /// Extract and normalize one file. Panics from either stage are contained here.
    fn process(&self, file: &SourceFile) -> std::result::Result<DocumentOutcome, String> {
        panic::catch_unwind(AssertUnwindSafe(|| {
            let extraction = self.extractor.extract_file(&file.path);
            let (sentences, stats) = self.normalizer.normalize_with_stats(&extraction);
            DocumentOutcome {
                extraction,
                sentences,
                stats,
            }
        }))
        .map_err(|payload| {
            payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic during processing".to_string())
        })
    }
}

fn skipped_document(file: &SourceFile, reason: String) -> DocumentReport {
    DocumentReport {
        file: file.file_name(),
        bytes: file.bytes,
        method: crate::utils::extractor::ExtractionMethod::None,
        chars: 0,
        pages: 0,
        sentences: 0,
        ocr_used: false,
        fallback_used: false,
        suspicious: false,
        skipped: Some(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, bytes: usize) {
        fs::write(dir.join(name), vec![b'x'; bytes]).unwrap();
    }

    #[test]
    fn test_discovery_orders_smallest_first() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "big.pdf", 300);
        touch(dir.path(), "small.PDF", 10);
        touch(dir.path(), "b_mid.pdf", 100);
        touch(dir.path(), "a_mid.pdf", 100);
        touch(dir.path(), "notes.txt", 1);

        let names: Vec<String> = discover_documents(dir.path(), false)
            .unwrap()
            .iter()
            .map(SourceFile::file_name)
            .collect();
        assert_eq!(names, vec!["small.PDF", "a_mid.pdf", "b_mid.pdf", "big.pdf"]);
    }

    #[test]
    fn test_discovery_is_shallow_unless_recursive() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "top.pdf", 5);
        fs::create_dir(dir.path().join("nested")).unwrap();
        touch(&dir.path().join("nested"), "deep.pdf", 5);

        assert_eq!(discover_documents(dir.path(), false).unwrap().len(), 1);
        assert_eq!(discover_documents(dir.path(), true).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        assert!(discover_documents(Path::new("/nonexistent/pdfs"), false).is_err());
    }
}
