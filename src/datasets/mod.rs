use async_trait::async_trait;
use burn::data::dataset::{Dataset, InMemDataset};

use crate::utils::{classes::LabelError, files::JsonLinesError};

/// TNEWS news title classification
pub mod tnews;

/// CLUENER fine-grained named entities
pub mod cluener;

/// Relation extraction records
pub mod relation;

/// Raw documents for unsupervised objectives
pub mod documents;

/// Labelled sentence pairs
pub mod pairs;

/// A record type that can be read from an input file
#[async_trait]
pub trait Record: Sized + Clone + Send + Sync + 'static {
    /// Read every record of one file
    async fn read(path: &str) -> Result<Vec<Self>, DatasetError>;

    /// Whether the record carries gold annotations. Test files of the CLUE benchmarks do not.
    fn is_labelled(&self) -> bool {
        true
    }
}

/// A dataset which can be loaded
#[async_trait]
pub trait LoadableDataset<I>: Dataset<I> {
    /// Load the dataset from one or more files, keeping at most `max_samples` records
    async fn load(files: &[String], max_samples: Option<usize>) -> Result<Self, DatasetError>
    where
        Self: std::marker::Sized;
}

/// An in-memory corpus of records, read from one or more files
pub struct Corpus<I> {
    /// Underlying In-Memory dataset
    dataset: InMemDataset<I>,
}

impl<I: Clone + Send + Sync> Corpus<I> {
    /// Wrap records that are already in memory
    pub fn from_items(mut items: Vec<I>, max_samples: Option<usize>) -> Self {
        if let Some(max) = max_samples {
            items.truncate(max);
        }

        Self {
            dataset: InMemDataset::new(items),
        }
    }

    /// Copy the records out of the corpus
    pub fn items(&self) -> Vec<I> {
        self.dataset.iter().collect()
    }
}

impl<I: Clone + Send + Sync> Dataset<I> for Corpus<I> {
    fn get(&self, index: usize) -> Option<I> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

#[async_trait]
impl<I: Record> LoadableDataset<I> for Corpus<I> {
    async fn load(files: &[String], max_samples: Option<usize>) -> Result<Self, DatasetError> {
        if files.is_empty() {
            return Err(DatasetError::NoFiles);
        }

        let mut items = Vec::new();
        for file in files {
            let records = I::read(file).await?;

            log::info!("Read {} records from {}", records.len(), file);

            items.extend(records);

            if max_samples.map(|max| items.len() >= max).unwrap_or(false) {
                break;
            }
        }

        Ok(Self::from_items(items, max_samples))
    }
}

/// Dataset Error
#[derive(thiserror::Error, Debug)]
pub enum DatasetError {
    /// No input file was configured for a split
    #[error("no input files given")]
    NoFiles,

    /// A JSON-lines file could not be read or parsed
    #[error(transparent)]
    JsonLines(#[from] JsonLinesError),

    /// A tab-separated file could not be read
    #[error("unable to read {path}: {source}")]
    Io {
        /// The input file
        path: String,
        /// The underlying error
        source: std::io::Error,
    },

    /// An entity whose start lies after its end
    #[error("inverted span [{start}, {end}] for {label} in {path} at line {line}")]
    InvertedSpan {
        /// The input file
        path: String,
        /// 1-based line number
        line: usize,
        /// The entity label
        label: String,
        /// The start offset
        start: usize,
        /// The end offset
        end: usize,
    },

    /// A record that parses but does not have the expected shape
    #[error("malformed record in {path} at line {line}: {reason}")]
    Malformed {
        /// The input file
        path: String,
        /// 1-based line number
        line: usize,
        /// What is wrong with it
        reason: String,
    },

    /// A label outside of the configured vocabulary
    #[error(transparent)]
    Label(#[from] LabelError),
}
