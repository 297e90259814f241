mod corpus;
mod lexicon;
mod normalizer;
mod segmenter;

pub use corpus::{Corpus, TokenizedSentence};
pub use lexicon::TermLexicon;
pub use normalizer::{is_reference_header, is_table_of_contents, NormalizationStats, TextNormalizer};
pub use segmenter::{split_on_periods, SegmentError, SentenceSegmenter, UnicodeSentenceSegmenter};
