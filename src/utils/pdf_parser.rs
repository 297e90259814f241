use lopdf::{Dictionary, Object};
use std::fs::{self, File};
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const PDF_SIGNATURE: &[u8] = b"%PDF-";
const MAX_PARENT_DEPTH: usize = 32;
const MAX_FORM_DEPTH: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0:?} does not start with a PDF signature")]
    NotPdf(PathBuf),
    #[error("failed to parse PDF: {0}")]
    Parse(String),
    #[error("{0:?} contains no pages")]
    NoPages(PathBuf),
    #[error("page {0} is out of range")]
    PageOutOfRange(usize),
    #[error("page {page}: {reason}")]
    Page { page: usize, reason: String },
}

/// Per-page access used by scan detection and page-by-page extraction.
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Text of the zero-based page, as found in the embedded text layer.
    fn page_text(&self, index: usize) -> Result<String, PdfError>;

    /// Whether the page's resources reference an image XObject.
    fn page_has_image(&self, index: usize) -> Result<bool, PdfError>;
}

/// An opened PDF. Immutable; dropped once its extraction attempt is over.
pub struct Document {
    path: PathBuf,
    byte_size: u64,
    pages: Box<dyn PageSource>,
}

impl Document {
    /// Open a PDF from disk, rejecting files without a `%PDF-` header or without pages.
    pub fn open(path: &Path) -> Result<Self, PdfError> {
        let io_err = |source| PdfError::Io {
            path: path.to_path_buf(),
            source,
        };

        let byte_size = fs::metadata(path).map_err(io_err)?.len();

        if !has_pdf_signature(path).map_err(io_err)? {
            return Err(PdfError::NotPdf(path.to_path_buf()));
        }

        let pdf = lopdf::Document::load(path).map_err(|e| PdfError::Parse(e.to_string()))?;
        let pages = LopdfPages::new(pdf);

        if pages.page_count() == 0 {
            return Err(PdfError::NoPages(path.to_path_buf()));
        }

        debug!(path = ?path, byte_size, pages = pages.page_count(), "Opened PDF");

        Ok(Self {
            path: path.to_path_buf(),
            byte_size,
            pages: Box::new(pages),
        })
    }

    /// Assemble a document from an already-open page source.
    pub fn from_source(path: impl Into<PathBuf>, byte_size: u64, pages: Box<dyn PageSource>) -> Self {
        Self {
            path: path.into(),
            byte_size,
            pages,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn size_mb(&self) -> f64 {
        self.byte_size as f64 / (1024.0 * 1024.0)
    }

    pub fn page_count(&self) -> usize {
        self.pages.page_count()
    }

    pub fn pages(&self) -> &dyn PageSource {
        self.pages.as_ref()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("path", &self.path)
            .field("byte_size", &self.byte_size)
            .field("page_count", &self.page_count())
            .finish()
    }
}

fn has_pdf_signature(path: &Path) -> std::io::Result<bool> {
    let mut header = [0u8; 5];
    let mut file = File::open(path)?;
    match file.read_exact(&mut header) {
        Ok(()) => Ok(header == PDF_SIGNATURE),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Whole-document text through pdf-extract.
///
/// pdf-extract panics on some malformed inputs; those are reported as parse errors.
pub fn extract_full_text(path: &Path) -> Result<String, PdfError> {
    match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text(path))) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(PdfError::Parse(e.to_string())),
        Err(_) => {
            warn!("pdf-extract panicked on {:?}", path);
            Err(PdfError::Parse("pdf-extract panicked".to_string()))
        }
    }
}

/// `PageSource` backed by a parsed lopdf document.
pub struct LopdfPages {
    doc: lopdf::Document,
    page_numbers: Vec<u32>,
}

impl LopdfPages {
    pub fn new(doc: lopdf::Document) -> Self {
        let page_numbers = doc.get_pages().keys().copied().collect();
        Self { doc, page_numbers }
    }

    fn page_number(&self, index: usize) -> Result<u32, PdfError> {
        self.page_numbers
            .get(index)
            .copied()
            .ok_or(PdfError::PageOutOfRange(index))
    }

    fn page_dictionary(&self, index: usize) -> Result<&Dictionary, PdfError> {
        let number = self.page_number(index)?;
        let pages = self.doc.get_pages();
        let page_id = pages.get(&number).ok_or(PdfError::PageOutOfRange(index))?;
        self.doc.get_dictionary(*page_id).map_err(|e| PdfError::Page {
            page: index,
            reason: e.to_string(),
        })
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> Option<&'a Object> {
        match object {
            Object::Reference(id) => self.doc.get_object(*id).ok(),
            other => Some(other),
        }
    }

    /// Resources are inheritable, so walk up the page tree until one is found.
    fn resources<'a>(&'a self, page: &'a Dictionary) -> Option<&'a Dictionary> {
        let mut node = page;
        for _ in 0..MAX_PARENT_DEPTH {
            if let Ok(resources) = node.get(b"Resources") {
                return self.resolve(resources).and_then(|o| o.as_dict().ok());
            }
            let parent = node.get(b"Parent").ok()?;
            node = self.resolve(parent)?.as_dict().ok()?;
        }
        None
    }

    fn resources_contain_image(&self, resources: &Dictionary, depth: usize) -> bool {
        let Some(xobjects) = resources
            .get(b"XObject")
            .ok()
            .and_then(|o| self.resolve(o))
            .and_then(|o| o.as_dict().ok())
        else {
            return false;
        };

        for (_, entry) in xobjects.iter() {
            let Some(stream) = self.resolve(entry).and_then(|o| o.as_stream().ok()) else {
                continue;
            };
            let subtype = stream
                .dict
                .get(b"Subtype")
                .ok()
                .and_then(|o| self.resolve(o))
                .and_then(|o| o.as_name().ok());

            match subtype {
                Some(b"Image") => return true,
                Some(b"Form") if depth < MAX_FORM_DEPTH => {
                    let nested = stream
                        .dict
                        .get(b"Resources")
                        .ok()
                        .and_then(|o| self.resolve(o))
                        .and_then(|o| o.as_dict().ok());
                    if let Some(nested) = nested {
                        if self.resources_contain_image(nested, depth + 1) {
                            return true;
                        }
                    }
                }
                _ => {}
            }
        }

        false
    }
}

impl PageSource for LopdfPages {
    fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    fn page_text(&self, index: usize) -> Result<String, PdfError> {
        let number = self.page_number(index)?;
        self.doc
            .extract_text(&[number])
            .map_err(|e| PdfError::Page {
                page: index,
                reason: e.to_string(),
            })
    }

    fn page_has_image(&self, index: usize) -> Result<bool, PdfError> {
        let page = self.page_dictionary(index)?;
        Ok(self
            .resources(page)
            .map(|resources| self.resources_contain_image(resources, 0))
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, ObjectId, Stream};
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Resources can hang off the page itself or off its `/Pages` parent.
    enum ResourcesOn {
        Page,
        Parent,
    }

    fn text_content(text: &str) -> Vec<u8> {
        Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        }
        .encode()
        .unwrap()
    }

    fn image_xobject(doc: &mut lopdf::Document) -> ObjectId {
        doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0u8],
        ))
    }

    fn form_xobject(doc: &mut lopdf::Document, image_id: ObjectId) -> ObjectId {
        doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 1.into(), 1.into()],
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im1" => image_id },
                },
            },
            b"/Im1 Do".to_vec(),
        ))
    }

    /// Finish `doc` as a one-page document whose content stream shows `text` in Courier.
    fn single_page(
        mut doc: lopdf::Document,
        text: &str,
        xobjects: Option<Dictionary>,
        placement: ResourcesOn,
    ) -> lopdf::Document {
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });

        let mut resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        };
        if let Some(xobjects) = xobjects {
            resources.set("XObject", xobjects);
        }
        let resources_id = doc.add_object(resources);

        let content_id = doc.add_object(Stream::new(dictionary! {}, text_content(text)));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        let mut pages = dictionary! {
            "Type" => "Pages",
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        match placement {
            ResourcesOn::Page => page.set("Resources", resources_id),
            ResourcesOn::Parent => pages.set("Resources", resources_id),
        }

        let page_id = doc.add_object(page);
        pages.set("Kids", vec![page_id.into()]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn test_page_text_reads_the_text_layer() {
        let pages = LopdfPages::new(single_page(
            lopdf::Document::with_version("1.5"),
            "Sun in Leo trine Jupiter.",
            None,
            ResourcesOn::Page,
        ));

        assert_eq!(pages.page_count(), 1);
        assert!(pages.page_text(0).unwrap().contains("Sun in Leo trine Jupiter."));
        assert!(!pages.page_has_image(0).unwrap());
        assert!(matches!(pages.page_text(1), Err(PdfError::PageOutOfRange(1))));
    }

    #[test]
    fn test_direct_image_xobject_is_detected() {
        let mut doc = lopdf::Document::with_version("1.5");
        let image_id = image_xobject(&mut doc);
        let doc = single_page(doc, "", Some(dictionary! { "Im0" => image_id }), ResourcesOn::Page);
        let pages = LopdfPages::new(doc);

        assert!(pages.page_has_image(0).unwrap());
    }

    #[test]
    fn test_image_inside_form_xobject_is_detected() {
        let mut doc = lopdf::Document::with_version("1.5");
        let image_id = image_xobject(&mut doc);
        let form_id = form_xobject(&mut doc, image_id);
        let doc = single_page(doc, "", Some(dictionary! { "Fm0" => form_id }), ResourcesOn::Page);
        let pages = LopdfPages::new(doc);

        assert!(pages.page_has_image(0).unwrap());
    }

    #[test]
    fn test_resources_inherited_from_page_tree() {
        let mut doc = lopdf::Document::with_version("1.5");
        let image_id = image_xobject(&mut doc);
        let doc = single_page(
            doc,
            "Moon in Cancer.",
            Some(dictionary! { "Im0" => image_id }),
            ResourcesOn::Parent,
        );
        let pages = LopdfPages::new(doc);

        assert!(pages.page_has_image(0).unwrap());
        assert!(pages.page_text(0).unwrap().contains("Moon in Cancer."));
    }

    #[test]
    fn test_open_reads_a_saved_document() {
        let mut doc = single_page(
            lopdf::Document::with_version("1.5"),
            "Venus in Libra.",
            None,
            ResourcesOn::Parent,
        );
        let file = NamedTempFile::new().unwrap();
        doc.save(file.path()).unwrap();

        let document = Document::open(file.path()).unwrap();
        assert_eq!(document.page_count(), 1);
        assert!(document.byte_size() > 0);
        assert!(document.pages().page_text(0).unwrap().contains("Venus in Libra."));
        assert!(extract_full_text(file.path()).unwrap().contains("Venus in Libra."));
    }

    #[test]
    fn test_rejects_non_pdf() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "just some text, not a pdf").unwrap();

        let err = Document::open(file.path()).unwrap_err();
        assert!(matches!(err, PdfError::NotPdf(_)));
    }

    #[test]
    fn test_rejects_truncated_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "%PD").unwrap();

        assert!(matches!(
            Document::open(file.path()),
            Err(PdfError::NotPdf(_))
        ));
    }

    #[test]
    fn test_header_only_pdf_fails_to_parse() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "%PDF-1.4\n%%EOF\n").unwrap();

        assert!(Document::open(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Document::open(Path::new("/nonexistent/nowhere.pdf")).unwrap_err();
        assert!(matches!(err, PdfError::Io { .. }));
    }
}
