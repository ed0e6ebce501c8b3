use std::{collections::BTreeMap, hash::Hash, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::files::read_file;

/// Invert a map by swapping keys and values
pub fn invert_map<K, V, MK, MV>(original: MK) -> MV
where
    K: Ord + Hash + Eq,
    V: Ord + Hash + Eq + Clone,
    MK: IntoIterator<Item = (K, V)>,
    MV: FromIterator<(V, K)>,
{
    original
        .into_iter()
        .map(|(key, value)| (value, key))
        .collect()
}

/// A label vocabulary, mapping task label strings to dense integer ids
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    /// A mapping from class ids to class name labels
    id2label: BTreeMap<usize, String>,

    /// A mapping from class name labels to class ids
    label2id: BTreeMap<String, usize>,
}

impl Labels {
    /// Build a vocabulary in first-seen order, dropping duplicates
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = Self::default();

        for label in labels {
            let label = label.into();
            if vocab.label2id.contains_key(&label) {
                continue;
            }

            let id = vocab.id2label.len();
            vocab.label2id.insert(label.clone(), id);
            vocab.id2label.insert(id, label);
        }

        vocab
    }

    /// Build a vocabulary from the sorted, deduplicated labels
    pub fn sorted<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        labels.sort();
        labels.dedup();

        Self::new(labels)
    }

    /// Rebuild a vocabulary from an id -> label map, such as the one saved with a model config
    pub fn from_id2label(id2label: &BTreeMap<usize, String>) -> Self {
        Self {
            id2label: id2label.clone(),
            label2id: invert_map(id2label.clone()),
        }
    }

    /// Read a label file with one label per line. Files ending in `.json` hold one JSON object
    /// per line, with the label in its `label` field.
    pub async fn from_file(path: &str) -> Result<Self, LabelError> {
        let is_json = Path::new(path)
            .extension()
            .map(|ext| ext == "json")
            .unwrap_or(false);

        let mut labels = Vec::new();
        for (index, line) in read_lines(path).await? {
            if is_json {
                let value = parse_line(path, index, &line)?;
                let label = value
                    .get("label")
                    .and_then(Value::as_str)
                    .ok_or_else(|| LabelError::MissingField {
                        path: path.to_string(),
                        line: index + 1,
                        field: "label",
                    })?;

                labels.push(label.to_string());
            } else {
                labels.push(line);
            }
        }

        let vocab = Self::sorted(labels);
        if vocab.is_empty() {
            return Err(LabelError::Empty(path.to_string()));
        }

        Ok(vocab)
    }

    /// Read a relation schema file: JSON lines with `subject`, `predicate` and `object` fields,
    /// each turned into a `subject+predicate+object` label in file order
    pub async fn from_relation_file(path: &str) -> Result<Self, LabelError> {
        let mut labels = Vec::new();

        for (index, line) in read_lines(path).await? {
            let value = parse_line(path, index, &line)?;

            let mut parts = Vec::with_capacity(3);
            for field in ["subject", "predicate", "object"] {
                let part = value.get(field).and_then(Value::as_str).ok_or_else(|| {
                    LabelError::MissingField {
                        path: path.to_string(),
                        line: index + 1,
                        field,
                    }
                })?;

                parts.push(part);
            }

            labels.push(parts.join("+"));
        }

        let vocab = Self::new(labels);
        if vocab.is_empty() {
            return Err(LabelError::Empty(path.to_string()));
        }

        Ok(vocab)
    }

    /// Look up the id of a label
    pub fn id(&self, label: &str) -> Result<usize, LabelError> {
        self.label2id
            .get(label)
            .copied()
            .ok_or_else(|| LabelError::Unknown(label.to_string()))
    }

    /// Look up the label for an id
    pub fn label(&self, id: usize) -> Option<&str> {
        self.id2label.get(&id).map(String::as_str)
    }

    /// The number of labels
    pub fn len(&self) -> usize {
        self.id2label.len()
    }

    /// Whether the vocabulary holds no labels
    pub fn is_empty(&self) -> bool {
        self.id2label.is_empty()
    }

    /// The labels in id order
    pub fn names(&self) -> Vec<String> {
        self.id2label.values().cloned().collect()
    }

    /// The id -> label map
    pub fn id2label(&self) -> &BTreeMap<usize, String> {
        &self.id2label
    }

    /// The label -> id map
    pub fn label2id(&self) -> &BTreeMap<String, usize> {
        &self.label2id
    }
}

async fn read_lines(path: &str) -> Result<Vec<(usize, String)>, LabelError> {
    let lines = read_file(path)
        .await
        .map_err(|source| LabelError::Io {
            path: path.to_string(),
            source,
        })?;

    Ok(lines
        .into_iter()
        .enumerate()
        .map(|(index, line)| (index, line.trim().to_string()))
        .filter(|(_, line)| !line.is_empty())
        .collect())
}

fn parse_line(path: &str, index: usize, line: &str) -> Result<Value, LabelError> {
    serde_json::from_str(line).map_err(|source| LabelError::Json {
        path: path.to_string(),
        line: index + 1,
        source,
    })
}

/// Label vocabulary errors
#[derive(thiserror::Error, Debug)]
pub enum LabelError {
    /// A label that is not part of the vocabulary
    #[error("unknown label {0}")]
    Unknown(String),

    /// A label file without any labels
    #[error("no labels found in {0}")]
    Empty(String),

    /// The label file could not be read
    #[error("unable to read label file {path}: {source}")]
    Io {
        /// The label file
        path: String,
        /// The underlying error
        source: std::io::Error,
    },

    /// A JSON label line could not be parsed
    #[error("invalid JSON in {path} at line {line}: {source}")]
    Json {
        /// The label file
        path: String,
        /// 1-based line number
        line: usize,
        /// The underlying error
        source: serde_json::Error,
    },

    /// A JSON label line without the expected field
    #[error("missing field `{field}` in {path} at line {line}")]
    MissingField {
        /// The label file
        path: String,
        /// 1-based line number
        line: usize,
        /// The missing field
        field: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_new_keeps_first_seen_order() {
        let labels = Labels::new(["b", "a", "b", "c"]);

        assert_eq!(labels.names(), vec!["b", "a", "c"]);
        assert_eq!(labels.id("a").unwrap(), 1);
        assert_eq!(labels.label(2), Some("c"));
    }

    #[test]
    fn test_sorted_dedups() {
        let labels = Labels::sorted(["scene", "address", "book", "address"]);

        assert_eq!(labels.names(), vec!["address", "book", "scene"]);
        assert_eq!(labels.len(), 3);
    }

    #[test]
    fn test_unknown_label() {
        let labels = Labels::new(["news_story"]);

        assert!(matches!(labels.id("news_tech"), Err(LabelError::Unknown(l)) if l == "news_tech"));
        assert_eq!(labels.label(5), None);
    }

    #[test]
    fn test_invert_round_trip() {
        let labels = Labels::sorted(["x", "y"]);
        let inverted: BTreeMap<String, usize> = invert_map(labels.id2label().clone());

        assert_eq!(&inverted, labels.label2id());
        assert_eq!(Labels::from_id2label(labels.id2label()), labels);
    }
}
