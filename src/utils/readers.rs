use std::ffi::OsStr;
use tracing::debug;

use super::extractor::{ExtractionAttempt, ExtractionMethod};
use super::pdf_parser::{self, Document};
use super::tools::PDFTOTEXT;

/// One way of pulling text out of a document.
pub trait ExtractionStrategy {
    fn name(&self) -> &'static str;

    fn method(&self) -> ExtractionMethod;

    /// Run the strategy. Failures are reported in the attempt, never raised.
    fn attempt(&self, document: &Document) -> ExtractionAttempt;
}

/// Whole-document read of the embedded text layer through pdf-extract.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectTextReader;

impl ExtractionStrategy for DirectTextReader {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Native
    }

    fn attempt(&self, document: &Document) -> ExtractionAttempt {
        let result = pdf_parser::extract_full_text(document.path());
        ExtractionAttempt::from_raw(self.method(), self.name(), result)
    }
}

/// Page-by-page read of the text layer; unreadable pages are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct PageStreamReader;

impl ExtractionStrategy for PageStreamReader {
    fn name(&self) -> &'static str {
        "page-stream"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Native
    }

    fn attempt(&self, document: &Document) -> ExtractionAttempt {
        let pages = document.pages();
        let mut texts = Vec::with_capacity(pages.page_count());
        let mut failed = 0;

        for index in 0..pages.page_count() {
            match pages.page_text(index) {
                Ok(text) => texts.push(text),
                Err(e) => {
                    failed += 1;
                    debug!("Skipping page {} of {}: {}", index + 1, document.file_name(), e);
                }
            }
        }

        if texts.is_empty() && failed > 0 {
            return ExtractionAttempt::failed(
                self.method(),
                self.name(),
                format!("all {} pages failed", failed),
            );
        }

        ExtractionAttempt::from_raw(
            self.method(),
            self.name(),
            Ok::<_, String>(texts.join("\n")),
        )
    }
}

/// Layout-preserving extraction through poppler's `pdftotext -layout`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LayoutTextReader;

impl ExtractionStrategy for LayoutTextReader {
    fn name(&self) -> &'static str {
        "pdftotext-layout"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::LayoutAware
    }

    fn attempt(&self, document: &Document) -> ExtractionAttempt {
        let result = PDFTOTEXT.run([
            OsStr::new("-layout"),
            OsStr::new("-enc"),
            OsStr::new("UTF-8"),
            document.path().as_os_str(),
            OsStr::new("-"),
        ]);
        ExtractionAttempt::from_raw(self.method(), self.name(), result)
    }
}

/// The native readers in the order they are tried.
pub fn native_strategies() -> Vec<Box<dyn ExtractionStrategy>> {
    vec![Box::new(DirectTextReader), Box::new(PageStreamReader)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::pdf_parser::{PageSource, PdfError};

    struct FlakyPages {
        texts: Vec<Option<&'static str>>,
    }

    impl PageSource for FlakyPages {
        fn page_count(&self) -> usize {
            self.texts.len()
        }

        fn page_text(&self, index: usize) -> Result<String, PdfError> {
            self.texts[index]
                .map(str::to_string)
                .ok_or(PdfError::Page {
                    page: index,
                    reason: "bad stream".to_string(),
                })
        }

        fn page_has_image(&self, _index: usize) -> Result<bool, PdfError> {
            Ok(false)
        }
    }

    fn document(texts: Vec<Option<&'static str>>) -> Document {
        Document::from_source("book.pdf", 2048, Box::new(FlakyPages { texts }))
    }

    #[test]
    fn test_page_stream_skips_failed_pages() {
        let doc = document(vec![Some("Venus rules Taurus."), None, Some("Mars rules Aries.")]);
        let attempt = PageStreamReader.attempt(&doc);

        assert!(attempt.failure.is_none());
        assert_eq!(attempt.text, "Venus rules Taurus. Mars rules Aries.");
        assert_eq!(attempt.method, ExtractionMethod::Native);
    }

    #[test]
    fn test_page_stream_reports_total_failure() {
        let attempt = PageStreamReader.attempt(&document(vec![None, None]));
        assert_eq!(attempt.text, "");
        assert_eq!(attempt.failure.as_deref(), Some("all 2 pages failed"));
    }

    #[test]
    fn test_direct_reader_reports_unreadable_file() {
        let attempt = DirectTextReader.attempt(&document(vec![Some("ignored")]));
        assert_eq!(attempt.yield_chars(), 0);
        assert!(attempt.failure.is_some());
    }
}
