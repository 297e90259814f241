mod bundle;
mod trainer;

pub use bundle::{load_bundle, save_bundle, BundleManifest, CorpusBundle};
pub use trainer::{BundleTrainer, EmbeddingTrainer, TrainingReport};
