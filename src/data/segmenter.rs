use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    #[error("no sentence found in {0} chars of text")]
    NoSentences(usize),
}

/// Splits a paragraph into sentences.
pub trait SentenceSegmenter {
    fn segment(&self, paragraph: &str) -> Result<Vec<String>, SegmentError>;
}

/// UAX #29 sentence boundaries.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnicodeSentenceSegmenter;

impl SentenceSegmenter for UnicodeSentenceSegmenter {
    fn segment(&self, paragraph: &str) -> Result<Vec<String>, SegmentError> {
        let sentences: Vec<String> = paragraph
            .unicode_sentences()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if sentences.is_empty() && paragraph.chars().any(char::is_alphanumeric) {
            return Err(SegmentError::NoSentences(paragraph.chars().count()));
        }

        Ok(sentences)
    }
}

/// Naive fallback: split on `". "` and put the period back.
pub fn split_on_periods(paragraph: &str) -> Vec<String> {
    paragraph
        .trim()
        .split(". ")
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            let s = s.trim();
            if s.ends_with('.') {
                s.to_string()
            } else {
                format!("{s}.")
            }
        })
        .collect()
}
