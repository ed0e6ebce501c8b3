use crate::{pipelines::encoding::EncodingError, utils::classes::LabelError};

/// Training arguments
pub mod config;

/// Tokenization into fixed-length id sequences
pub mod encoding;

/// Shared collate step
pub mod batcher;

/// Loss-only training output
pub mod output;

/// Model resolution, artifacts and learner settings shared by every task
pub mod session;

/// Sentence classification (TNEWS)
pub mod text_classification;

/// Named entity recognition with start/end span tagging
pub mod span_ner;

/// Named entity recognition with a global pointer
pub mod global_pointer;

/// Named entity recognition with cascaded BIO tagging
pub mod cascade_tagging;

/// Relation extraction with token linking
pub mod relation_extraction;

/// Unsupervised SimCSE sentence embeddings
pub mod sentence_embedding;

/// Whole word masked language model pretraining
pub mod masked_lm;

pub use config::{Mode, Training};
pub use session::Session;

/// Errors while turning records into features
#[derive(thiserror::Error, Debug)]
pub enum FeatureError {
    /// Tokenization failed
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// A record uses a label outside the vocabulary
    #[error(transparent)]
    Label(#[from] LabelError),
}
