use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use super::bundle::{save_bundle, CorpusBundle};
use crate::config::TrainingParams;
use crate::data::Corpus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model_path: PathBuf,
    pub manifest_path: Option<PathBuf>,
    pub sentences: usize,
    pub vocabulary_size: usize,
}

/// Consumes the finished corpus and produces a model artifact at `output`.
pub trait EmbeddingTrainer {
    fn name(&self) -> &'static str;

    fn train(&self, corpus: &Corpus, params: &TrainingParams, output: &Path) -> Result<TrainingReport>;
}

/// Hands the corpus to an out-of-process word2vec trainer as a bincode bundle.
#[derive(Debug, Default, Clone, Copy)]
pub struct BundleTrainer;

impl EmbeddingTrainer for BundleTrainer {
    fn name(&self) -> &'static str {
        "bundle"
    }

    fn train(&self, corpus: &Corpus, params: &TrainingParams, output: &Path) -> Result<TrainingReport> {
        info!(
            vector_size = params.vector_size,
            window = params.window,
            min_count = params.min_count,
            skip_gram = params.skip_gram,
            "Preparing corpus of {} sentences for embedding training",
            corpus.len()
        );

        let bundle = CorpusBundle::new(corpus.clone(), params.clone());
        let manifest_path = save_bundle(&bundle, output)?;

        Ok(TrainingReport {
            model_path: output.to_path_buf(),
            manifest_path: Some(manifest_path),
            sentences: corpus.len(),
            vocabulary_size: bundle.vocabulary.len(),
        })
    }
}
