use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

const MB: u64 = 1024 * 1024;

/// Thresholds that drive escalation between extraction tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Files above this size take the large-document path.
    pub large_file_bytes: u64,
    /// Large documents yielding less than this consult the scan detector.
    pub large_file_min_chars: usize,
    /// Yields below this consult the scan detector.
    pub scan_check_below_chars: usize,
    /// Non-scanned documents below this still get a speculative OCR pass.
    pub speculative_ocr_below_chars: usize,
    /// Speculative OCR text is adopted only when it beats the existing yield by this factor.
    pub ocr_adoption_factor: f64,
    pub suspicious_max_chars: usize,
    pub suspicious_min_pages: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            large_file_bytes: 20 * MB,
            large_file_min_chars: 1000,
            scan_check_below_chars: 500,
            speculative_ocr_below_chars: 100,
            ocr_adoption_factor: 2.0,
            suspicious_max_chars: 1000,
            suspicious_min_pages: 10,
        }
    }
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.ocr_adoption_factor >= 1.0, "ocr_adoption_factor must be >= 1.0");
        ensure!(
            self.speculative_ocr_below_chars <= self.scan_check_below_chars,
            "speculative_ocr_below_chars must be <= scan_check_below_chars"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub max_samples: usize,
    /// Documents up to this many pages are sampled from the front.
    pub small_document_pages: usize,
    pub image_text_threshold: f64,
    pub empty_text_threshold: f64,
    pub uneven_high_chars: usize,
    pub uneven_low_chars: usize,
    pub substantial_page_chars: usize,
    pub dense_file_bytes: u64,
    pub dense_text_threshold: f64,
    pub min_chars_per_mb: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_samples: 5,
            small_document_pages: 10,
            image_text_threshold: 100.0,
            empty_text_threshold: 10.0,
            uneven_high_chars: 500,
            uneven_low_chars: 50,
            substantial_page_chars: 100,
            dense_file_bytes: 2 * MB,
            dense_text_threshold: 200.0,
            min_chars_per_mb: 500.0,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_samples > 0, "max_samples must be > 0");
        ensure!(
            self.uneven_low_chars < self.uneven_high_chars,
            "uneven_low_chars must be < uneven_high_chars"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub language: String,
    pub huge_file_bytes: u64,
    pub large_file_bytes: u64,
    pub huge_file_max_pages: usize,
    pub large_file_max_pages: usize,
    pub default_max_pages: usize,
    /// Pages recognizing fewer characters are retried with the alternate segmentation mode.
    pub retry_below_chars: usize,
    pub primary_psm: u8,
    pub alternate_psm: u8,
    pub engine_mode: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            huge_file_bytes: 50 * MB,
            large_file_bytes: 20 * MB,
            huge_file_max_pages: 5,
            large_file_max_pages: 15,
            default_max_pages: 50,
            retry_below_chars: 100,
            primary_psm: 1,
            alternate_psm: 3,
            engine_mode: 3,
        }
    }
}

impl OcrConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.language.is_empty(), "ocr language must not be empty");
        ensure!(self.huge_file_max_pages > 0, "huge_file_max_pages must be > 0");
        ensure!(self.large_file_max_pages > 0, "large_file_max_pages must be > 0");
        ensure!(self.default_max_pages > 0, "default_max_pages must be > 0");
        ensure!(
            self.huge_file_bytes >= self.large_file_bytes,
            "huge_file_bytes must be >= large_file_bytes"
        );
        Ok(())
    }

    /// Upper bound on OCR'd pages for a file of the given size.
    pub fn page_cap(&self, byte_size: u64) -> usize {
        if byte_size > self.huge_file_bytes {
            self.huge_file_max_pages
        } else if byte_size > self.large_file_bytes {
            self.large_file_max_pages
        } else {
            self.default_max_pages
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub min_sentence_words: usize,
    pub min_sentence_words_ocr: usize,
    pub max_sentence_words: usize,
    pub min_meaningful_tokens: usize,
    pub min_meaningful_tokens_ocr: usize,
    pub min_token_chars: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            min_sentence_words: 4,
            min_sentence_words_ocr: 3,
            max_sentence_words: 100,
            min_meaningful_tokens: 3,
            min_meaningful_tokens_ocr: 2,
            min_token_chars: 3,
        }
    }
}

impl NormalizerConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.min_sentence_words <= self.max_sentence_words,
            "min_sentence_words must be <= max_sentence_words"
        );
        ensure!(self.min_meaningful_tokens > 0, "min_meaningful_tokens must be > 0");
        ensure!(self.min_meaningful_tokens_ocr > 0, "min_meaningful_tokens_ocr must be > 0");
        Ok(())
    }

    pub fn min_words(&self, is_ocr: bool) -> usize {
        if is_ocr {
            self.min_sentence_words_ocr
        } else {
            self.min_sentence_words
        }
    }

    pub fn min_tokens(&self, is_ocr: bool) -> usize {
        if is_ocr {
            self.min_meaningful_tokens_ocr
        } else {
            self.min_meaningful_tokens
        }
    }
}

/// Pass-through parameters for the embedding trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    pub vector_size: usize,
    pub window: usize,
    pub min_count: usize,
    pub skip_gram: bool,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            vector_size: 300,
            window: 5,
            min_count: 5,
            skip_gram: true,
        }
    }
}

impl TrainingParams {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.vector_size > 0, "vector_size must be > 0");
        ensure!(self.window > 0, "window must be > 0");
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub extraction: ExtractionConfig,
    pub scan: ScanConfig,
    pub ocr: OcrConfig,
    pub normalizer: NormalizerConfig,
    pub training: TrainingParams,
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config JSON: {:?}", path))?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.extraction.validate()?;
        self.scan.validate()?;
        self.ocr.validate()?;
        self.normalizer.validate()?;
        self.training.validate()?;
        Ok(())
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_validate() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"extraction": {{"ocr_adoption_factor": 3.0}}}}"#).unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.extraction.ocr_adoption_factor, 3.0);
        assert_eq!(config.extraction.scan_check_below_chars, 500);
        assert_eq!(config.training.vector_size, 300);
    }

    #[test]
    fn test_rejects_adoption_factor_below_one() {
        let mut config = PipelineConfig::default();
        config.extraction.ocr_adoption_factor = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ocr_page_cap_by_size() {
        let ocr = OcrConfig::default();
        assert_eq!(ocr.page_cap(60 * MB), 5);
        assert_eq!(ocr.page_cap(30 * MB), 15);
        assert_eq!(ocr.page_cap(MB), 50);
    }
}
