use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

use super::ocr::OcrEngine;
use super::pdf_parser::Document;
use super::readers::{native_strategies, ExtractionStrategy, LayoutTextReader};
use super::scan_detector::ScanDetector;
use super::text_processor::{clean_extracted_text, yield_chars};
use crate::config::{ExtractionConfig, PipelineConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Native,
    LayoutAware,
    Ocr,
    None,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Native => "native",
            Self::LayoutAware => "layout-aware",
            Self::Ocr => "ocr",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

/// Outcome of running a single tier, threaded through the escalation decisions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionAttempt {
    pub method: ExtractionMethod,
    pub strategy: &'static str,
    /// Cleaned text; empty on failure.
    pub text: String,
    pub failure: Option<String>,
}

impl ExtractionAttempt {
    /// Wrap a backend's raw output, applying the shared cleanup.
    pub fn from_raw<E: fmt::Display>(
        method: ExtractionMethod,
        strategy: &'static str,
        raw: Result<String, E>,
    ) -> Self {
        match raw {
            Ok(raw) => Self {
                method,
                strategy,
                text: clean_extracted_text(&raw),
                failure: None,
            },
            Err(e) => Self::failed(method, strategy, e.to_string()),
        }
    }

    pub fn failed(method: ExtractionMethod, strategy: &'static str, reason: impl Into<String>) -> Self {
        Self {
            method,
            strategy,
            text: String::new(),
            failure: Some(reason.into()),
        }
    }

    pub fn yield_chars(&self) -> usize {
        yield_chars(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub text: String,
    pub method: ExtractionMethod,
    pub char_count: usize,
    pub page_count: usize,
    pub ocr_used: bool,
    /// The layout-aware tier was consulted.
    pub fallback_used: bool,
    /// Very little text for the number of pages.
    pub suspicious: bool,
    pub attempts: Vec<ExtractionAttempt>,
}

impl ExtractionResult {
    /// Build a result, keeping `method == None` exactly when the text is empty.
    pub fn from_text(text: String, method: ExtractionMethod, page_count: usize) -> Self {
        let (text, method) = if text.trim().is_empty() || method == ExtractionMethod::None {
            (String::new(), ExtractionMethod::None)
        } else {
            (text, method)
        };

        Self {
            char_count: text.chars().count(),
            ocr_used: method == ExtractionMethod::Ocr,
            text,
            method,
            page_count,
            fallback_used: false,
            suspicious: false,
            attempts: Vec::new(),
        }
    }

    pub fn none(page_count: usize) -> Self {
        Self::from_text(String::new(), ExtractionMethod::None, page_count)
    }

    pub fn is_empty(&self) -> bool {
        self.method == ExtractionMethod::None
    }
}

/// Tiered text extraction: native readers, then layout-aware, then OCR.
pub struct TextExtractor {
    native: Vec<Box<dyn ExtractionStrategy>>,
    layout: Option<Box<dyn ExtractionStrategy>>,
    ocr: Option<OcrEngine>,
    detector: ScanDetector,
    config: ExtractionConfig,
}

impl TextExtractor {
    pub fn new(
        native: Vec<Box<dyn ExtractionStrategy>>,
        layout: Option<Box<dyn ExtractionStrategy>>,
        ocr: Option<OcrEngine>,
        detector: ScanDetector,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            native,
            layout,
            ocr,
            detector,
            config,
        }
    }

    /// The stock backends, limited to the tiers whose tools are installed.
    pub fn standard(config: &PipelineConfig, layout_available: bool, ocr_available: bool) -> Self {
        let layout: Option<Box<dyn ExtractionStrategy>> = if layout_available {
            Some(Box::new(LayoutTextReader))
        } else {
            None
        };
        let ocr = ocr_available.then(|| OcrEngine::tesseract(config.ocr.clone()));

        Self::new(
            native_strategies(),
            layout,
            ocr,
            ScanDetector::new(config.scan.clone()),
            config.extraction.clone(),
        )
    }

    pub fn has_layout(&self) -> bool {
        self.layout.is_some()
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    /// Open and extract a file. Unreadable files give an empty result.
    pub fn extract_file(&self, path: &Path) -> ExtractionResult {
        match Document::open(path) {
            Ok(document) => self.extract(&document),
            Err(e) => {
                warn!("Cannot open {:?}: {}", path, e);
                let mut result = ExtractionResult::none(0);
                result
                    .attempts
                    .push(ExtractionAttempt::failed(ExtractionMethod::None, "open", e.to_string()));
                result
            }
        }
    }

    /// Run the escalation policy over one document. Never fails.
    pub fn extract(&self, document: &Document) -> ExtractionResult {
        let cfg = &self.config;
        let verdict = OnceCell::new();
        let is_scanned = || *verdict.get_or_init(|| self.detector.classify(document));

        let mut attempts = Vec::new();
        let mut ocr_tried = false;
        let mut fallback_used = false;

        let (mut method, mut text) = self.run_native(document, &mut attempts);

        if document.byte_size() > cfg.large_file_bytes && yield_chars(&text) < cfg.large_file_min_chars {
            if let Some(ocr) = &self.ocr {
                if is_scanned() {
                    info!(
                        "Large scanned PDF detected ({:.1} MB), going straight to OCR",
                        document.size_mb()
                    );
                    ocr_tried = true;
                    let attempt = self.run_ocr(ocr, document);
                    if attempt.yield_chars() > 0 {
                        (method, text) = (attempt.method, attempt.text.clone());
                    }
                    attempts.push(attempt);
                }
            }
        }

        if text.is_empty() {
            if let Some(layout) = &self.layout {
                info!("Native extraction found no text, trying layout-aware extraction");
                fallback_used = true;
                let attempt = layout.attempt(document);
                log_attempt(&attempt);
                if attempt.yield_chars() > 0 {
                    (method, text) = (attempt.method, attempt.text.clone());
                }
                attempts.push(attempt);
            }
        }

        let current_yield = yield_chars(&text);
        if !ocr_tried && current_yield < cfg.scan_check_below_chars {
            if let Some(ocr) = &self.ocr {
                if is_scanned() {
                    info!("PDF appears to be scanned, attempting OCR");
                    let attempt = self.run_ocr(ocr, document);
                    if attempt.yield_chars() > 0 {
                        (method, text) = (attempt.method, attempt.text.clone());
                    }
                    attempts.push(attempt);
                } else if current_yield < cfg.speculative_ocr_below_chars {
                    info!(
                        "Very little text extracted ({} chars), trying OCR as fallback",
                        current_yield
                    );
                    let attempt = self.run_ocr(ocr, document);
                    let ocr_yield = attempt.yield_chars();
                    if ocr_yield as f64 > cfg.ocr_adoption_factor * current_yield as f64 {
                        info!("OCR produced more text ({} vs {} chars), using it", ocr_yield, current_yield);
                        (method, text) = (attempt.method, attempt.text.clone());
                    }
                    attempts.push(attempt);
                }
            }
        }

        let mut result = ExtractionResult::from_text(text, method, document.page_count());
        result.fallback_used = fallback_used;
        result.attempts = attempts;

        if result.char_count < cfg.suspicious_max_chars
            && result.page_count > cfg.suspicious_min_pages
        {
            warn!(
                file = %document.file_name(),
                chars = result.char_count,
                pages = result.page_count,
                "Extracted text seems too short for the page count"
            );
            result.suspicious = true;
        }

        result
    }

    /// First native strategy that yields any text wins.
    fn run_native(
        &self,
        document: &Document,
        attempts: &mut Vec<ExtractionAttempt>,
    ) -> (ExtractionMethod, String) {
        for strategy in &self.native {
            let attempt = strategy.attempt(document);
            log_attempt(&attempt);
            let found = (attempt.yield_chars() > 0).then(|| (attempt.method, attempt.text.clone()));
            attempts.push(attempt);
            if let Some(found) = found {
                return found;
            }
        }
        (ExtractionMethod::None, String::new())
    }

    fn run_ocr(&self, ocr: &OcrEngine, document: &Document) -> ExtractionAttempt {
        let text = ocr.recognize(document);
        let attempt = if text.is_empty() {
            ExtractionAttempt::failed(ExtractionMethod::Ocr, "ocr", "no text recognized")
        } else {
            ExtractionAttempt::from_raw(ExtractionMethod::Ocr, "ocr", Ok::<_, String>(text))
        };
        log_attempt(&attempt);
        attempt
    }
}

fn log_attempt(attempt: &ExtractionAttempt) {
    match &attempt.failure {
        Some(reason) => debug!(strategy = attempt.strategy, "Extraction attempt failed: {}", reason),
        None => debug!(
            strategy = attempt.strategy,
            chars = attempt.yield_chars(),
            "Extraction attempt finished"
        ),
    }
}
