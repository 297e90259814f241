// Library exports for the corpus binary and the probe-pdf script

pub mod config;
pub mod data;
pub mod pipeline;
pub mod training;
pub mod utils;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use data::{Corpus, TermLexicon, TextNormalizer, TokenizedSentence};
pub use pipeline::{Capabilities, CorpusBuilder, PipelineContext, RunOptions, RunReport};
pub use utils::{ExtractionMethod, ExtractionResult, ScanDetector, TextExtractor};
