pub mod extractor;
pub mod ocr;
pub mod pdf_parser;
pub mod readers;
pub mod scan_detector;
pub mod text_processor;
pub mod tools;

pub use extractor::{ExtractionAttempt, ExtractionMethod, ExtractionResult, TextExtractor};
pub use ocr::{OcrEngine, OcrError, PageRasterizer, RasterQuality, TextRecognizer};
pub use pdf_parser::{Document, PageSource, PdfError};
pub use readers::{DirectTextReader, ExtractionStrategy, LayoutTextReader, PageStreamReader};
pub use scan_detector::{PageSample, ScanAssessment, ScanDetector, ScanReason};
pub use text_processor::{clean_extracted_text, OCR_MARKER, PARA_MARKER};
