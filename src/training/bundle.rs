use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::TrainingParams;
use crate::data::Corpus;

/// Everything the external word2vec trainer needs, in one bincode file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusBundle {
    pub params: TrainingParams,
    /// Tokens meeting `min_count`, most frequent first.
    pub vocabulary: Vec<(String, usize)>,
    pub corpus: Corpus,
}

impl CorpusBundle {
    pub fn new(corpus: Corpus, params: TrainingParams) -> Self {
        let mut vocabulary: Vec<(String, usize)> =
            corpus.vocabulary(params.min_count).into_iter().collect();
        vocabulary.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self {
            params,
            vocabulary,
            corpus,
        }
    }
}

/// JSON sidecar describing a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub bundle_file: String,
    pub params: TrainingParams,
    pub sentence_count: usize,
    pub token_count: usize,
    pub vocabulary_size: usize,
    pub created_at: u64,
}

/// Write the bundle to `bundle_path` and its manifest next to it. Returns the manifest path.
pub fn save_bundle(bundle: &CorpusBundle, bundle_path: &Path) -> Result<PathBuf> {
    if let Some(parent) = bundle_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create model directory: {:?}", parent))?;
    }

    let file = File::create(bundle_path)
        .with_context(|| format!("Failed to create bundle file: {:?}", bundle_path))?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, bundle)
        .with_context(|| "Failed to serialize corpus bundle")?;
    writer
        .flush()
        .with_context(|| format!("Failed to write bundle file: {:?}", bundle_path))?;

    let created_at = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let manifest = BundleManifest {
        bundle_file: bundle_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        params: bundle.params.clone(),
        sentence_count: bundle.corpus.len(),
        token_count: bundle.corpus.token_count(),
        vocabulary_size: bundle.vocabulary.len(),
        created_at,
    };

    let manifest_path = bundle_path.with_extension("json");
    let manifest_json = serde_json::to_string_pretty(&manifest)
        .with_context(|| "Failed to serialize bundle manifest")?;
    fs::write(&manifest_path, manifest_json)
        .with_context(|| format!("Failed to write bundle manifest: {:?}", manifest_path))?;

    info!(
        "Corpus bundle saved: {} sentences, {} vocabulary terms -> {:?}",
        manifest.sentence_count, manifest.vocabulary_size, bundle_path
    );

    Ok(manifest_path)
}

/// Load a bundle through its manifest.
pub fn load_bundle(manifest_path: &Path) -> Result<CorpusBundle> {
    let manifest_json = fs::read_to_string(manifest_path)
        .with_context(|| format!("Failed to read bundle manifest: {:?}", manifest_path))?;
    let manifest: BundleManifest = serde_json::from_str(&manifest_json)
        .with_context(|| "Failed to parse bundle manifest")?;

    let dir = manifest_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Invalid manifest path"))?;
    let bundle_path = dir.join(&manifest.bundle_file);

    let file = File::open(&bundle_path)
        .with_context(|| format!("Failed to open bundle: {:?}", bundle_path))?;
    let bundle = bincode::deserialize_from(BufReader::new(file))
        .with_context(|| format!("Failed to decode bundle: {:?}", bundle_path))?;

    Ok(bundle)
}
