use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::utils::ocr::OcrEngine;
use crate::utils::tools::PDFTOTEXT;

/// Which optional extraction tiers can run on this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub layout_aware: bool,
    pub ocr: bool,
}

impl Capabilities {
    /// Check for `pdftotext`, `pdftoppm` and `tesseract` on `PATH`.
    pub fn probe() -> Self {
        Self {
            layout_aware: PDFTOTEXT.is_available(),
            ocr: OcrEngine::is_available(),
        }
    }

    pub fn none() -> Self {
        Self {
            layout_aware: false,
            ocr: false,
        }
    }

    pub fn log(&self) {
        if self.layout_aware {
            info!("Layout-aware extraction available (pdftotext)");
        } else {
            warn!("pdftotext not found: layout-aware extraction disabled");
        }
        if self.ocr {
            info!("OCR available (pdftoppm + tesseract)");
        } else {
            warn!("pdftoppm or tesseract not found: OCR disabled, scanned PDFs will be skipped");
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub pdf_dir: PathBuf,
    pub raw_output: PathBuf,
    pub clean_output: PathBuf,
    pub model_output: PathBuf,
    pub skip_model: bool,
    pub recursive: bool,
}

impl RunOptions {
    pub fn new(pdf_dir: impl Into<PathBuf>) -> Self {
        Self {
            pdf_dir: pdf_dir.into(),
            raw_output: PathBuf::from("data/extracted_text.txt"),
            clean_output: PathBuf::from("data/cleaned_text.txt"),
            model_output: PathBuf::from("models/astro_vec_model"),
            skip_model: false,
            recursive: false,
        }
    }
}

/// Run-scoped state handed to every stage: configuration, available tiers,
/// output locations and the interrupt flag.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub capabilities: Capabilities,
    pub options: RunOptions,
    interrupt: Arc<AtomicBool>,
}

impl PipelineContext {
    pub fn new(config: PipelineConfig, capabilities: Capabilities, options: RunOptions) -> Self {
        Self {
            config,
            capabilities,
            options,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag for a signal handler to set.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn request_interrupt(&self) {
        self.interrupt.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }
}
