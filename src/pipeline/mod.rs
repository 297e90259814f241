mod context;
mod corpus_builder;
mod report;

pub use context::{Capabilities, PipelineContext, RunOptions};
pub use corpus_builder::{discover_documents, CorpusBuilder, SourceFile};
pub use report::{DocumentReport, RunReport, INTERRUPTED_EXIT_CODE};
