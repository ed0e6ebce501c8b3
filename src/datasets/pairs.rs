use async_trait::async_trait;
use burn::data::dataset::{Dataset, InMemDataset};
use derive_new::new;
use serde::{Deserialize, Serialize};

use super::{DatasetError, Record};

/// Two sentences and their gold similarity score
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, new)]
pub struct Item {
    /// The first sentence
    pub first: String,

    /// The second sentence
    pub second: String,

    /// The gold similarity, a binary label or a graded score
    pub score: f32,
}

impl Item {
    /// Read a tab-separated `first\tsecond\tscore` file without a header row
    pub fn read_tsv(path: &str) -> Result<Vec<Self>, DatasetError> {
        let mut reader = csv::ReaderBuilder::new();
        reader.delimiter(b'\t').has_headers(false).quoting(false);

        let dataset: InMemDataset<Item> =
            InMemDataset::from_csv(path, &reader).map_err(|source| DatasetError::Io {
                path: path.to_string(),
                source,
            })?;

        Ok(dataset.iter().collect())
    }
}

#[async_trait]
impl Record for Item {
    async fn read(path: &str) -> Result<Vec<Self>, DatasetError> {
        let owned = path.to_string();

        tokio::task::spawn_blocking(move || Self::read_tsv(&owned))
            .await
            .map_err(|e| DatasetError::Io {
                path: path.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e),
            })?
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_read_tsv() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "今天天气不错\t今天天气很好\t1\n他走了\t\"她来了\t0\n").unwrap();

        let items = Item::read_tsv(file.path().to_str().unwrap()).unwrap();

        assert_eq!(
            items,
            vec![
                Item::new("今天天气不错".into(), "今天天气很好".into(), 1.0),
                Item::new("他走了".into(), "\"她来了".into(), 0.0),
            ]
        );
    }
}
