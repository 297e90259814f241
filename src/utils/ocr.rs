use image::DynamicImage;
use regex::Regex;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use super::pdf_parser::Document;
use super::text_processor::{collapse_whitespace, mark_ocr, mark_paragraphs, yield_chars};
use super::tools::{ToolError, PDFTOPPM, TESSERACT};
use crate::config::OcrConfig;

/// Contrast boost passed to `adjust_contrast`; roughly doubles distance from mid-grey.
const CONTRAST_BOOST: f32 = 41.4;

/// 3x3 sharpen kernel; `filter3x3` normalizes by the kernel sum (16).
const SHARPEN_KERNEL: [f32; 9] = [-2.0, -2.0, -2.0, -2.0, 32.0, -2.0, -2.0, -2.0, -2.0];

static MISSING_SPACE_AFTER_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z]),([a-zA-Z])").unwrap());
static MISSING_SPACE_AFTER_PERIOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z])\.([A-Z])").unwrap());
static TRAILING_L_IN_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)l\b").unwrap());
static LEADING_L_IN_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bl(\d+)\b").unwrap());
static INNER_L_IN_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)l(\d)").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("rasterizer produced no image for page {0}")]
    MissingImage(usize),
}

/// Rasterization settings, tried from best to cheapest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterQuality {
    High,
    Medium,
    /// Last resort: low resolution, first selected page only.
    Minimal,
}

impl RasterQuality {
    pub const LADDER: [RasterQuality; 3] = [Self::High, Self::Medium, Self::Minimal];

    pub fn dpi(self) -> u32 {
        match self {
            Self::High => 300,
            Self::Medium => 150,
            Self::Minimal => 72,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::High => "jpg",
            Self::Medium | Self::Minimal => "png",
        }
    }
}

/// Renders a single PDF page to an image.
pub trait PageRasterizer {
    fn rasterize(
        &self,
        pdf_path: &Path,
        page_index: usize,
        quality: RasterQuality,
    ) -> Result<DynamicImage, OcrError>;
}

/// Turns a page image into text.
pub trait TextRecognizer {
    fn recognize(&self, image: &DynamicImage, page_segmentation: u8) -> Result<String, OcrError>;
}

/// Rasterizer backed by poppler's `pdftoppm`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdftoppmRasterizer;

impl PageRasterizer for PdftoppmRasterizer {
    fn rasterize(
        &self,
        pdf_path: &Path,
        page_index: usize,
        quality: RasterQuality,
    ) -> Result<DynamicImage, OcrError> {
        let workdir = tempfile::Builder::new().prefix("astro_ocr_").tempdir()?;
        let prefix = workdir.path().join("page");
        let page_number = (page_index + 1).to_string();
        let dpi = quality.dpi().to_string();
        let format_flag = if quality == RasterQuality::High { "-jpeg" } else { "-png" };

        PDFTOPPM.run([
            OsStr::new("-f"),
            OsStr::new(&page_number),
            OsStr::new("-l"),
            OsStr::new(&page_number),
            OsStr::new("-r"),
            OsStr::new(&dpi),
            OsStr::new("-singlefile"),
            OsStr::new(format_flag),
            pdf_path.as_os_str(),
            prefix.as_os_str(),
        ])?;

        let image_path = prefix.with_extension(quality.extension());
        if !image_path.exists() {
            return Err(OcrError::MissingImage(page_index));
        }

        Ok(image::open(&image_path)?)
    }
}

/// Recognizer backed by the `tesseract` CLI.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    language: String,
    engine_mode: u8,
}

impl TesseractRecognizer {
    pub fn new(language: impl Into<String>, engine_mode: u8) -> Self {
        Self {
            language: language.into(),
            engine_mode,
        }
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &DynamicImage, page_segmentation: u8) -> Result<String, OcrError> {
        let input = tempfile::Builder::new()
            .prefix("astro_ocr_")
            .suffix(".png")
            .tempfile()?;
        image.save(input.path())?;

        let psm = page_segmentation.to_string();
        let oem = self.engine_mode.to_string();

        let text = TESSERACT.run([
            input.path().as_os_str(),
            OsStr::new("stdout"),
            OsStr::new("-l"),
            OsStr::new(&self.language),
            OsStr::new("--psm"),
            OsStr::new(&psm),
            OsStr::new("--oem"),
            OsStr::new(&oem),
        ])?;

        Ok(text)
    }
}

/// Optical character recognition over a sample of a document's pages.
pub struct OcrEngine {
    rasterizer: Box<dyn PageRasterizer>,
    recognizer: Box<dyn TextRecognizer>,
    config: OcrConfig,
}

impl OcrEngine {
    pub fn new(
        rasterizer: Box<dyn PageRasterizer>,
        recognizer: Box<dyn TextRecognizer>,
        config: OcrConfig,
    ) -> Self {
        Self {
            rasterizer,
            recognizer,
            config,
        }
    }

    /// The pdftoppm + tesseract engine, without checking that either is installed.
    pub fn tesseract(config: OcrConfig) -> Self {
        let recognizer = TesseractRecognizer::new(config.language.clone(), config.engine_mode);
        Self::new(Box::new(PdftoppmRasterizer), Box::new(recognizer), config)
    }

    /// True when both `pdftoppm` and `tesseract` can be run.
    pub fn is_available() -> bool {
        PDFTOPPM.is_available() && TESSERACT.is_available()
    }

    /// Recognized text prefixed with the OCR marker, or `""` when nothing was recognized.
    pub fn recognize(&self, document: &Document) -> String {
        let cap = self.config.page_cap(document.byte_size());
        let pages = select_pages(document.page_count(), cap);
        info!(
            "Converting {} of {} pages from {} to images for OCR",
            pages.len(),
            document.page_count(),
            document.file_name()
        );

        let images = self.rasterize_pages(document, &pages);
        info!("Processing {} pages with OCR", images.len());

        let mut text = String::new();
        for (page_index, image) in &images {
            match self.recognize_page(image) {
                Ok(page_text) => {
                    text.push_str(&mark_paragraphs(&page_text));
                    text.push(' ');
                }
                Err(e) => {
                    warn!("Error processing OCR on page {}: {}", page_index + 1, e);
                }
            }
        }

        let text = repair_recognition_errors(&collapse_whitespace(&text));
        info!(
            chars = text.chars().count(),
            words = text.split_whitespace().count(),
            "OCR extraction finished"
        );

        mark_ocr(&text)
    }

    /// Rasterize the selected pages, stepping down the quality ladder while nothing renders.
    fn rasterize_pages(&self, document: &Document, pages: &[usize]) -> Vec<(usize, DynamicImage)> {
        for quality in RasterQuality::LADDER {
            let targets = match quality {
                RasterQuality::Minimal => &pages[..pages.len().min(1)],
                _ => pages,
            };

            let mut images = Vec::with_capacity(targets.len());
            for &page_index in targets {
                match self.rasterizer.rasterize(document.path(), page_index, quality) {
                    Ok(image) => images.push((page_index, image)),
                    Err(e) => debug!(
                        "Rasterizing page {} at {:?} failed: {}",
                        page_index + 1,
                        quality,
                        e
                    ),
                }
            }

            if !images.is_empty() {
                return images;
            }
            if !targets.is_empty() {
                warn!("Could not rasterize {} at {:?} quality", document.file_name(), quality);
            }
        }

        Vec::new()
    }

    /// Recognize one page, retrying sparse results with the alternate segmentation mode.
    fn recognize_page(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let prepared = preprocess_image(image);
        let primary = self
            .recognizer
            .recognize(&prepared, self.config.primary_psm)?;

        if yield_chars(&primary) >= self.config.retry_below_chars {
            return Ok(primary);
        }

        match self
            .recognizer
            .recognize(&prepared, self.config.alternate_psm)
        {
            Ok(alternate) if yield_chars(&alternate) > yield_chars(&primary) => Ok(alternate),
            Ok(_) => Ok(primary),
            Err(e) => {
                debug!("Alternate segmentation failed, keeping primary result: {}", e);
                Ok(primary)
            }
        }
    }
}

/// Evenly spread page indices, at most `cap` of them.
pub fn select_pages(total_pages: usize, cap: usize) -> Vec<usize> {
    if total_pages <= cap {
        return (0..total_pages).collect();
    }
    (0..cap).map(|i| i * total_pages / cap).collect()
}

/// Grayscale, contrast boost and sharpen before recognition.
pub fn preprocess_image(image: &DynamicImage) -> DynamicImage {
    image
        .grayscale()
        .adjust_contrast(CONTRAST_BOOST)
        .filter3x3(&SHARPEN_KERNEL)
}

/// Fix the recognition errors tesseract makes most often on scanned books.
///
/// `l` is only rewritten to `1` between or beside digits, as in "l5" or "2l". A broader
/// `l` to `i` rewrite before any non-letter would also change words such as "all," and
/// "will." so it is not applied.
pub fn repair_recognition_errors(text: &str) -> String {
    let text = MISSING_SPACE_AFTER_COMMA.replace_all(text, "$1, $2");
    let text = MISSING_SPACE_AFTER_PERIOD.replace_all(&text, "$1. $2");
    let text = TRAILING_L_IN_NUMBER.replace_all(&text, "${1}1");
    let text = LEADING_L_IN_NUMBER.replace_all(&text, "1${1}");
    let text = INNER_L_IN_NUMBER.replace_all(&text, "${1}1${2}");
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::pdf_parser::{PageSource, PdfError};
    use image::{GenericImageView, Rgb, RgbImage};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct BlankPages(usize);

    impl PageSource for BlankPages {
        fn page_count(&self) -> usize {
            self.0
        }
        fn page_text(&self, _index: usize) -> Result<String, PdfError> {
            Ok(String::new())
        }
        fn page_has_image(&self, _index: usize) -> Result<bool, PdfError> {
            Ok(true)
        }
    }

    /// Encodes the page index into the image width so the recognizer can tell pages apart.
    struct FakeRasterizer {
        fail_at: Vec<RasterQuality>,
        calls: Rc<RefCell<Vec<(usize, RasterQuality)>>>,
    }

    impl PageRasterizer for FakeRasterizer {
        fn rasterize(
            &self,
            _pdf_path: &Path,
            page_index: usize,
            quality: RasterQuality,
        ) -> Result<DynamicImage, OcrError> {
            self.calls.borrow_mut().push((page_index, quality));
            if self.fail_at.contains(&quality) {
                return Err(OcrError::MissingImage(page_index));
            }
            let image = RgbImage::from_pixel(page_index as u32 + 1, 4, Rgb([255, 255, 255]));
            Ok(DynamicImage::ImageRgb8(image))
        }
    }

    /// Returns per-page text keyed by image width and segmentation mode.
    struct FakeRecognizer {
        respond: fn(page_index: usize, psm: u8) -> Result<String, OcrError>,
    }

    impl TextRecognizer for FakeRecognizer {
        fn recognize(&self, image: &DynamicImage, psm: u8) -> Result<String, OcrError> {
            (self.respond)(image.dimensions().0 as usize - 1, psm)
        }
    }

    fn engine(
        fail_at: Vec<RasterQuality>,
        respond: fn(usize, u8) -> Result<String, OcrError>,
    ) -> (OcrEngine, Rc<RefCell<Vec<(usize, RasterQuality)>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let engine = OcrEngine::new(
            Box::new(FakeRasterizer {
                fail_at,
                calls: Rc::clone(&calls),
            }),
            Box::new(FakeRecognizer { respond }),
            OcrConfig::default(),
        );
        (engine, calls)
    }

    fn document(pages: usize) -> Document {
        Document::from_source("scan.pdf", 1024, Box::new(BlankPages(pages)))
    }

    fn long_text(page: usize) -> String {
        format!("Page {page} text about the Moon in Cancer. ").repeat(5)
    }

    #[test]
    fn test_select_pages_spreads_across_document() {
        assert_eq!(select_pages(3, 5), vec![0, 1, 2]);
        assert_eq!(select_pages(100, 5), vec![0, 20, 40, 60, 80]);
        let pages = select_pages(120, 50);
        assert_eq!(pages.len(), 50);
        assert!(*pages.last().unwrap() > 110);
    }

    #[test]
    fn test_output_is_marked_and_joined() {
        let (engine, _) = engine(vec![], |page, _| Ok(long_text(page)));
        let text = engine.recognize(&document(2));
        assert!(text.starts_with("[OCR_PROCESSED] Page 0 text"));
        assert!(text.contains("Page 1 text"));
    }

    #[test]
    fn test_empty_recognition_has_no_marker() {
        let (engine, _) = engine(vec![], |_, _| Ok("  \n ".to_string()));
        assert_eq!(engine.recognize(&document(1)), "");
    }

    #[test]
    fn test_sparse_page_retries_with_alternate_mode() {
        let (engine, _) = engine(vec![], |page, psm| match psm {
            1 => Ok("short".to_string()),
            _ => Ok(long_text(page)),
        });
        let text = engine.recognize(&document(1));
        assert!(text.contains("Moon in Cancer"));
        assert!(!text.contains("short"));
    }

    #[test]
    fn test_alternate_mode_must_win_to_be_kept() {
        let (engine, _) = engine(vec![], |_, psm| match psm {
            1 => Ok("Saturn in Capricorn".to_string()),
            _ => Ok("Sat".to_string()),
        });
        assert_eq!(engine.recognize(&document(1)), "[OCR_PROCESSED] Saturn in Capricorn");
    }

    #[test]
    fn test_failed_page_is_skipped() {
        let (engine, _) = engine(vec![], |page, _| {
            if page == 1 {
                Err(OcrError::MissingImage(page))
            } else {
                Ok(long_text(page))
            }
        });
        let text = engine.recognize(&document(3));
        assert!(text.contains("Page 0 text"));
        assert!(!text.contains("Page 1 text"));
        assert!(text.contains("Page 2 text"));
    }

    #[test]
    fn test_quality_degrades_on_rasterizer_failure() {
        let (engine, calls) = engine(vec![RasterQuality::High], |page, _| Ok(long_text(page)));
        let text = engine.recognize(&document(2));
        assert!(text.contains("Page 1 text"));

        let qualities: Vec<RasterQuality> = calls.borrow().iter().map(|(_, q)| *q).collect();
        assert_eq!(
            qualities,
            vec![
                RasterQuality::High,
                RasterQuality::High,
                RasterQuality::Medium,
                RasterQuality::Medium
            ]
        );
    }

    #[test]
    fn test_minimal_quality_renders_single_page() {
        let (engine, calls) = engine(
            vec![RasterQuality::High, RasterQuality::Medium],
            |page, _| Ok(long_text(page)),
        );
        let text = engine.recognize(&document(4));
        assert!(text.contains("Page 0 text"));
        assert!(!text.contains("Page 1 text"));

        let minimal_calls = calls
            .borrow()
            .iter()
            .filter(|(_, q)| *q == RasterQuality::Minimal)
            .count();
        assert_eq!(minimal_calls, 1);
    }

    #[test]
    fn test_repair_recognition_errors() {
        assert_eq!(
            repair_recognition_errors("Mars,Venus and Jupiter.Saturn"),
            "Mars, Venus and Jupiter. Saturn"
        );
        assert_eq!(repair_recognition_errors("at l5 degrees"), "at 15 degrees");
        assert_eq!(repair_recognition_errors("the 2l house"), "the 21 house");
        assert_eq!(repair_recognition_errors("year 19l2"), "year 1912");
        assert_eq!(repair_recognition_errors("will lead"), "will lead");
        assert_eq!(repair_recognition_errors("they all, in time, will."), "they all, in time, will.");
    }

    #[test]
    fn test_preprocess_produces_grayscale() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([200, 30, 30])));
        let prepared = preprocess_image(&image);
        assert!(matches!(prepared, DynamicImage::ImageLuma8(_)));
        assert_eq!(prepared.dimensions(), (4, 4));
    }
}
