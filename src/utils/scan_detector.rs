use tracing::debug;

use super::pdf_parser::{Document, PdfError};
use crate::config::ScanConfig;

/// What was observed on one sampled page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSample {
    pub page_index: usize,
    pub extracted_char_count: usize,
    pub has_image_object: bool,
}

/// The heuristic that flagged a document as scanned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScanReason {
    /// Little text and at least one embedded image.
    SparseTextWithImages { avg_text_len: f64 },
    /// Pages exist but carry almost no text.
    NearlyEmpty { avg_text_len: f64 },
    /// Some pages are text-rich while most are not.
    UnevenText { text_pages: usize, sampled: usize },
    /// Large file with very low text density.
    LowTextDensity { chars_per_mb: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanAssessment {
    pub samples: Vec<PageSample>,
    pub avg_text_len: f64,
    pub reason: Option<ScanReason>,
}

impl ScanAssessment {
    pub fn is_scanned(&self) -> bool {
        self.reason.is_some()
    }
}

/// Classifies documents as native text or scanned images from a handful of sampled pages.
#[derive(Debug, Clone, Default)]
pub struct ScanDetector {
    config: ScanConfig,
}

impl ScanDetector {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// True when the document is likely scanned. Sampling errors fail open to `false`.
    pub fn classify(&self, document: &Document) -> bool {
        match self.assess(document) {
            Ok(assessment) => assessment.is_scanned(),
            Err(e) => {
                debug!("Error checking if {:?} is scanned: {}", document.path(), e);
                false
            }
        }
    }

    pub fn assess(&self, document: &Document) -> Result<ScanAssessment, PdfError> {
        let pages = document.pages();
        let total_pages = pages.page_count();

        let mut samples = Vec::new();
        for page_index in self.sample_indices(total_pages) {
            let text = pages.page_text(page_index)?;
            samples.push(PageSample {
                page_index,
                extracted_char_count: text.trim().chars().count(),
                has_image_object: pages.page_has_image(page_index)?,
            });
        }

        let avg_text_len = if samples.is_empty() {
            0.0
        } else {
            samples
                .iter()
                .map(|s| s.extracted_char_count as f64)
                .sum::<f64>()
                / samples.len() as f64
        };

        let reason = self.verdict(&samples, avg_text_len, total_pages, document.byte_size());
        if let Some(reason) = &reason {
            debug!(path = ?document.path(), ?reason, "PDF likely scanned");
        }

        Ok(ScanAssessment {
            samples,
            avg_text_len,
            reason,
        })
    }

    /// Front pages for short documents; beginning, quartiles and end for longer ones.
    pub fn sample_indices(&self, total_pages: usize) -> Vec<usize> {
        if total_pages == 0 {
            return Vec::new();
        }

        if total_pages > self.config.small_document_pages {
            let mut indices = vec![
                0,
                total_pages / 4,
                total_pages / 2,
                (3 * total_pages) / 4,
                total_pages - 1,
            ];
            indices.dedup();
            indices.truncate(self.config.max_samples);
            indices
        } else {
            (0..total_pages.min(self.config.max_samples)).collect()
        }
    }

    fn verdict(
        &self,
        samples: &[PageSample],
        avg_text_len: f64,
        total_pages: usize,
        byte_size: u64,
    ) -> Option<ScanReason> {
        if total_pages == 0 || samples.is_empty() {
            return None;
        }
        let cfg = &self.config;

        let has_images = samples.iter().any(|s| s.has_image_object);
        if avg_text_len < cfg.image_text_threshold && has_images {
            return Some(ScanReason::SparseTextWithImages { avg_text_len });
        }

        if avg_text_len < cfg.empty_text_threshold {
            return Some(ScanReason::NearlyEmpty { avg_text_len });
        }

        let max = samples.iter().map(|s| s.extracted_char_count).max().unwrap_or(0);
        let min = samples.iter().map(|s| s.extracted_char_count).min().unwrap_or(0);
        if max > cfg.uneven_high_chars && min < cfg.uneven_low_chars {
            let text_pages = samples
                .iter()
                .filter(|s| s.extracted_char_count > cfg.substantial_page_chars)
                .count();
            if text_pages < samples.len() / 2 {
                return Some(ScanReason::UnevenText {
                    text_pages,
                    sampled: samples.len(),
                });
            }
        }

        if byte_size > cfg.dense_file_bytes && avg_text_len < cfg.dense_text_threshold {
            let size_mb = byte_size as f64 / (1024.0 * 1024.0);
            let chars_per_mb = avg_text_len * total_pages as f64 / size_mb;
            if chars_per_mb < cfg.min_chars_per_mb {
                return Some(ScanReason::LowTextDensity { chars_per_mb });
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::pdf_parser::PageSource;

    const MB: u64 = 1024 * 1024;

    struct FakePages {
        texts: Vec<String>,
        images: Vec<bool>,
        broken: bool,
    }

    impl FakePages {
        fn new(texts: &[&str], images: &[bool]) -> Self {
            Self {
                texts: texts.iter().map(|t| t.to_string()).collect(),
                images: images.to_vec(),
                broken: false,
            }
        }
    }

    impl PageSource for FakePages {
        fn page_count(&self) -> usize {
            self.texts.len()
        }

        fn page_text(&self, index: usize) -> Result<String, PdfError> {
            if self.broken {
                return Err(PdfError::Page {
                    page: index,
                    reason: "corrupt content stream".to_string(),
                });
            }
            Ok(self.texts[index].clone())
        }

        fn page_has_image(&self, index: usize) -> Result<bool, PdfError> {
            Ok(self.images[index])
        }
    }

    fn document(pages: FakePages, byte_size: u64) -> Document {
        Document::from_source("fake.pdf", byte_size, Box::new(pages))
    }

    #[test]
    fn test_native_text_is_not_scanned() {
        let text = "Sun in Leo trine Jupiter. Moon in Cancer square Mars.";
        let doc = document(FakePages::new(&[text], &[false]), 4096);
        // 53 chars, no images: only the near-empty rule could fire and it does not
        assert!(!ScanDetector::default().classify(&doc));
    }

    #[test]
    fn test_image_only_page_is_scanned() {
        let doc = document(FakePages::new(&[""], &[true]), 200 * 1024);
        let assessment = ScanDetector::default().assess(&doc).unwrap();
        assert!(matches!(
            assessment.reason,
            Some(ScanReason::SparseTextWithImages { .. })
        ));
    }

    #[test]
    fn test_near_empty_text_is_scanned_regardless_of_size() {
        for size in [1024, 3 * MB, 90 * MB] {
            let doc = document(FakePages::new(&["", "ab", "   "], &[false, false, false]), size);
            let assessment = ScanDetector::default().assess(&doc).unwrap();
            assert!(assessment.is_scanned(), "size {size} should be scanned");
        }
    }

    #[test]
    fn test_uneven_text_distribution() {
        let rich = "x".repeat(800);
        let texts: Vec<&str> = vec![&rich, "", "", "tiny", ""];
        let doc = document(FakePages::new(&texts, &[false; 5]), 10_000);
        let assessment = ScanDetector::default().assess(&doc).unwrap();
        assert_eq!(
            assessment.reason,
            Some(ScanReason::UnevenText {
                text_pages: 1,
                sampled: 5
            })
        );
    }

    #[test]
    fn test_low_density_large_file() {
        let text = "y".repeat(150);
        let doc = document(FakePages::new(&[&text, &text], &[false, false]), 3 * MB);
        let assessment = ScanDetector::default().assess(&doc).unwrap();
        assert!(matches!(
            assessment.reason,
            Some(ScanReason::LowTextDensity { .. })
        ));
    }

    #[test]
    fn test_sampling_errors_fail_open() {
        let mut pages = FakePages::new(&[""], &[true]);
        pages.broken = true;
        let doc = document(pages, 1024);
        assert!(!ScanDetector::default().classify(&doc));
    }

    #[test]
    fn test_sample_indices() {
        let detector = ScanDetector::default();
        assert_eq!(detector.sample_indices(0), Vec::<usize>::new());
        assert_eq!(detector.sample_indices(3), vec![0, 1, 2]);
        assert_eq!(detector.sample_indices(10), vec![0, 1, 2, 3, 4]);
        assert_eq!(detector.sample_indices(100), vec![0, 25, 50, 75, 99]);
    }
}
