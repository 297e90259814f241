use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

use super::corpus::TokenizedSentence;
use super::lexicon::TermLexicon;
use super::segmenter::{split_on_periods, SentenceSegmenter, UnicodeSentenceSegmenter};
use crate::config::NormalizerConfig;
use crate::utils::extractor::ExtractionResult;
use crate::utils::text_processor::{strip_ocr_marker, PARA_MARKER};

const DOT_MASK: &str = "_DOT_";

static SPLIT_HYPHENATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)-\s+(\w+)").unwrap());
static MISSING_SPACE_AFTER_PERIOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w)\.(\w)").unwrap());
static DIGIT_THEN_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9])([a-zA-Z])").unwrap());
static LETTER_THEN_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z])([0-9])").unwrap());

static TOC_LEADERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.{3,}|\s{3,}\d+$").unwrap());
static TOC_OUTLINE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\.[\s.]").unwrap());
static REFERENCE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:references|bibliography|works cited|footnotes)").unwrap());

static SHORT_ABBREVIATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z][a-z]{1,2})\. ").unwrap());
static COPYRIGHT_OR_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"copyright|©|\bwww\.|\bhttp").unwrap());
/// Everything but word characters, apostrophes, underscores, degree signs and sign glyphs.
static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s'_°♈-♓]").unwrap());

/// Numeric tokens worth keeping: degrees, sign positions, house positions.
static POSITION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^\d+°",
        r"^\d+\s*degrees?",
        r"^\d+[♈-♓]",
        r"^\d+\s*[a-zA-Z]+\s*house",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Counts of what normalization discarded, kept for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub paragraphs: usize,
    pub toc_paragraphs: usize,
    pub reference_paragraphs: usize,
    pub segmentation_fallbacks: usize,
    pub sentences: usize,
    pub copyright_sentences: usize,
    pub short_sentences: usize,
    pub long_sentences: usize,
    pub sparse_sentences: usize,
    pub retained_sentences: usize,
}

impl NormalizationStats {
    pub fn merge(&mut self, other: &NormalizationStats) {
        self.paragraphs += other.paragraphs;
        self.toc_paragraphs += other.toc_paragraphs;
        self.reference_paragraphs += other.reference_paragraphs;
        self.segmentation_fallbacks += other.segmentation_fallbacks;
        self.sentences += other.sentences;
        self.copyright_sentences += other.copyright_sentences;
        self.short_sentences += other.short_sentences;
        self.long_sentences += other.long_sentences;
        self.sparse_sentences += other.sparse_sentences;
        self.retained_sentences += other.retained_sentences;
    }
}

/// Turns extracted text into tokenized sentences ready for embedding training.
///
/// Normalization is a pure function of its input: paragraphs are split on the
/// extraction paragraph marker, noise paragraphs (tables of contents, reference
/// sections) and noise sentences (copyright lines, fragments, run-ons) are dropped,
/// and the remaining sentences are tokenized with domain terms kept intact.
pub struct TextNormalizer {
    lexicon: TermLexicon,
    segmenter: Box<dyn SentenceSegmenter>,
    config: NormalizerConfig,
}

impl TextNormalizer {
    pub fn new(
        lexicon: TermLexicon,
        segmenter: Box<dyn SentenceSegmenter>,
        config: NormalizerConfig,
    ) -> Self {
        Self {
            lexicon,
            segmenter,
            config,
        }
    }

    /// Astrological lexicon with UAX #29 sentence segmentation.
    pub fn standard(config: NormalizerConfig) -> Self {
        Self::new(
            TermLexicon::astrological(),
            Box::new(UnicodeSentenceSegmenter),
            config,
        )
    }

    pub fn lexicon(&self) -> &TermLexicon {
        &self.lexicon
    }

    pub fn normalize(&self, extraction: &ExtractionResult) -> Vec<TokenizedSentence> {
        self.normalize_text(&extraction.text).0
    }

    pub fn normalize_with_stats(
        &self,
        extraction: &ExtractionResult,
    ) -> (Vec<TokenizedSentence>, NormalizationStats) {
        self.normalize_text(&extraction.text)
    }

    pub fn normalize_text(&self, text: &str) -> (Vec<TokenizedSentence>, NormalizationStats) {
        let mut stats = NormalizationStats::default();

        let (is_ocr, body) = strip_ocr_marker(text);
        let expanded = self.lexicon.expand_abbreviations(body);

        let mut sentences = Vec::new();
        for paragraph in expanded.split(PARA_MARKER) {
            if paragraph.trim().is_empty() {
                continue;
            }
            stats.paragraphs += 1;

            let paragraph = repair_paragraph(paragraph, is_ocr);

            if is_table_of_contents(&paragraph) {
                stats.toc_paragraphs += 1;
                continue;
            }
            if is_reference_header(&paragraph) {
                stats.reference_paragraphs += 1;
                continue;
            }

            sentences.extend(self.segment(&paragraph, &mut stats));
        }
        stats.sentences = sentences.len();

        debug!(
            toc = stats.toc_paragraphs,
            references = stats.reference_paragraphs,
            sentences = stats.sentences,
            "Split text into sentences"
        );

        let mut output = Vec::new();
        for sentence in &sentences {
            if let Some(tokens) = self.tokenize_sentence(sentence, is_ocr, &mut stats) {
                output.push(tokens);
            }
        }
        stats.retained_sentences = output.len();

        debug!(
            copyright = stats.copyright_sentences,
            short = stats.short_sentences,
            long = stats.long_sentences,
            sparse = stats.sparse_sentences,
            retained = stats.retained_sentences,
            is_ocr,
            "Tokenized sentences"
        );

        (output, stats)
    }

    fn segment(&self, paragraph: &str, stats: &mut NormalizationStats) -> Vec<String> {
        let masked = SHORT_ABBREVIATION.replace_all(paragraph.trim(), "${1}_DOT_ ");

        let sentences = match self.segmenter.segment(&masked) {
            Ok(sentences) => sentences,
            Err(e) => {
                debug!("Sentence segmentation failed, using fallback: {}", e);
                stats.segmentation_fallbacks += 1;
                split_on_periods(&masked)
            }
        };

        sentences
            .into_iter()
            .map(|s| s.replace(DOT_MASK, "."))
            .collect()
    }

    /// Filter one sentence and tokenize it, or `None` if it is discarded.
    fn tokenize_sentence(
        &self,
        sentence: &str,
        is_ocr: bool,
        stats: &mut NormalizationStats,
    ) -> Option<TokenizedSentence> {
        let lowered = sentence.to_lowercase();
        if COPYRIGHT_OR_URL.is_match(&lowered) {
            stats.copyright_sentences += 1;
            return None;
        }

        let word_count = sentence.split_whitespace().count();
        if word_count < self.config.min_words(is_ocr) {
            stats.short_sentences += 1;
            return None;
        }
        if word_count > self.config.max_sentence_words {
            stats.long_sentences += 1;
            return None;
        }

        let joined = self.lexicon.join_phrases(&lowered);
        let stripped = PUNCTUATION.replace_all(&joined, " ");

        let tokens: Vec<String> = stripped
            .split_whitespace()
            .filter_map(|token| self.keep_token(token))
            .collect();

        if tokens.len() < self.config.min_tokens(is_ocr) {
            stats.sparse_sentences += 1;
            return None;
        }

        Some(TokenizedSentence::new(tokens))
    }

    fn keep_token(&self, token: &str) -> Option<String> {
        let token = self
            .lexicon
            .restore_phrase(token)
            .unwrap_or_else(|| token.to_string());

        if self.lexicon.contains(&token) || POSITION_PATTERNS.iter().any(|p| p.is_match(&token)) {
            return Some(token);
        }

        if !self.lexicon.is_stopword(&token)
            && token.chars().count() >= self.config.min_token_chars
        {
            Some(token)
        } else {
            None
        }
    }
}

fn repair_paragraph(paragraph: &str, is_ocr: bool) -> String {
    let text = SPLIT_HYPHENATION.replace_all(paragraph, "$1$2");
    let text = MISSING_SPACE_AFTER_PERIOD.replace_all(&text, "$1. $2");
    if !is_ocr {
        return text.into_owned();
    }
    let text = DIGIT_THEN_LETTER.replace_all(&text, "$1 $2");
    LETTER_THEN_DIGIT.replace_all(&text, "$1 $2").into_owned()
}

/// Dot leaders, trailing page numbers or a leading outline number.
pub fn is_table_of_contents(paragraph: &str) -> bool {
    TOC_LEADERS.is_match(paragraph) || TOC_OUTLINE_NUMBER.is_match(paragraph)
}

pub fn is_reference_header(paragraph: &str) -> bool {
    REFERENCE_HEADER.is_match(&paragraph.trim_start().to_lowercase())
}
