use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::data::NormalizationStats;
use crate::training::TrainingReport;
use crate::utils::extractor::ExtractionMethod;

/// Exit status for a run stopped by the user.
pub const INTERRUPTED_EXIT_CODE: u8 = 130;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub file: String,
    pub bytes: u64,
    pub method: ExtractionMethod,
    pub chars: usize,
    pub pages: usize,
    pub sentences: usize,
    pub ocr_used: bool,
    pub fallback_used: bool,
    pub suspicious: bool,
    /// Why the document contributed nothing, if it was skipped.
    pub skipped: Option<String>,
}

/// Summary of one directory run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub processed: usize,
    pub skipped: usize,
    pub ocr_used: usize,
    pub fallback_used: usize,
    pub suspicious: usize,
    pub total_sentences: usize,
    pub elapsed_secs: f64,
    pub interrupted: bool,
    pub normalization: NormalizationStats,
    pub training: Option<TrainingReport>,
    pub training_error: Option<String>,
    pub documents: Vec<DocumentReport>,
}

impl RunReport {
    /// 0 for a completed run (even one with nothing to train on), 130 when interrupted.
    pub fn exit_code(&self) -> u8 {
        if self.interrupted {
            INTERRUPTED_EXIT_CODE
        } else {
            0
        }
    }

    pub fn log_summary(&self) {
        info!("Processing complete in {:.2} seconds", self.elapsed_secs);
        info!(
            "Processed {} files, skipped {} files",
            self.processed, self.skipped
        );
        info!(
            "Used OCR on {} files, fallback extraction on {} files",
            self.ocr_used, self.fallback_used
        );
        info!("Total sentences in corpus: {}", self.total_sentences);
        if self.suspicious > 0 {
            warn!("{} files looked under-extracted for their page count", self.suspicious);
        }
        if self.interrupted {
            warn!("Run was interrupted; artifacts contain the documents finished so far");
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report directory: {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).with_context(|| "Failed to serialize run report")?;
        fs::write(path, json).with_context(|| format!("Failed to write run report: {:?}", path))?;
        info!("Run report written to {:?}", path);
        Ok(())
    }
}
