use std::collections::BTreeMap;

use async_trait::async_trait;
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::{
    metrics::pointer::Span,
    utils::{classes::Labels, files::read_json_lines},
};

use super::{DatasetError, Record};

/// The CLUENER entity types
pub static LABELS: &[&str; 10] = &[
    "address",
    "book",
    "company",
    "game",
    "government",
    "movie",
    "name",
    "organization",
    "position",
    "scene",
];

/// The label vocabulary for CLUENER, in sorted order
pub fn labels() -> Labels {
    Labels::sorted(LABELS.iter().copied())
}

/// Annotations as they appear in the files: `{type: {mention: [[start, end], ...]}}`
pub type RawEntities = BTreeMap<String, BTreeMap<String, Vec<(usize, usize)>>>;

/// An annotated entity mention, offsets are inclusive character positions
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct Entity {
    /// The entity type
    pub label: String,

    /// Offset of the first character
    pub start: usize,

    /// Offset of the last character
    pub end: usize,
}

/// A text with its entity mentions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, new)]
pub struct Item {
    /// The annotated text
    pub text: String,

    /// The entity mentions, empty for unlabelled records
    pub entities: Vec<Entity>,

    /// Whether the line had a `label` key
    #[new(value = "true")]
    pub labelled: bool,
}

/// The mentions predicted for one line of a file without gold annotations
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct Prediction {
    /// Line index in the input file
    pub id: usize,

    /// The predicted mentions
    pub entities: Vec<Entity>,
}

impl Prediction {
    /// Name the spans decoded for every line
    pub fn from_spans(spans: &[Vec<Span>], labels: &Labels) -> Vec<Self> {
        spans
            .iter()
            .enumerate()
            .map(|(id, spans)| {
                let entities = spans
                    .iter()
                    .map(|span| {
                        let label = labels.label(span.label).unwrap_or_default();

                        Entity::new(label.to_string(), span.start, span.end)
                    })
                    .collect();

                Prediction::new(id, entities)
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct Line {
    text: String,

    #[serde(default)]
    label: Option<RawEntities>,
}

/// Flatten the nested annotation map, rejecting inverted spans
pub fn flatten_entities(
    raw: RawEntities,
    path: &str,
    line: usize,
) -> Result<Vec<Entity>, DatasetError> {
    let mut entities = Vec::new();

    for (label, mentions) in raw {
        for (start, end) in mentions.into_values().flatten() {
            if start > end {
                return Err(DatasetError::InvertedSpan {
                    path: path.to_string(),
                    line,
                    label,
                    start,
                    end,
                });
            }

            entities.push(Entity::new(label.clone(), start, end));
        }
    }

    entities.sort_by_key(|e| (e.start, e.end));

    Ok(entities)
}

#[async_trait]
impl Record for Item {
    async fn read(path: &str) -> Result<Vec<Self>, DatasetError> {
        let mut items = Vec::new();

        for (line, record) in read_json_lines::<Line>(path).await? {
            let labelled = record.label.is_some();
            let entities = match record.label {
                Some(raw) => flatten_entities(raw, path, line)?,
                None => Vec::new(),
            };

            items.push(Item {
                text: record.text,
                entities,
                labelled,
            });
        }

        Ok(items)
    }

    fn is_labelled(&self) -> bool {
        self.labelled
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_labels_are_sorted() {
        let labels = labels();

        assert_eq!(labels.len(), 10);
        assert_eq!(labels.id("address").unwrap(), 0);
        assert_eq!(labels.id("scene").unwrap(), 9);
    }

    #[test]
    fn test_flatten_entities() {
        let raw: RawEntities = serde_json::from_str(
            r#"{"name": {"叶老桂": [[9, 11]]}, "company": {"浙商银行": [[0, 3]]}}"#,
        )
        .unwrap();

        let entities = flatten_entities(raw, "train.json", 1).unwrap();

        assert_eq!(
            entities,
            vec![Entity::new("company".into(), 0, 3), Entity::new("name".into(), 9, 11)]
        );
    }

    #[test]
    fn test_inverted_span() {
        let raw: RawEntities = serde_json::from_str(r#"{"name": {"x": [[4, 2]]}}"#).unwrap();

        let err = flatten_entities(raw, "dev.json", 7).unwrap_err();
        assert!(matches!(err, DatasetError::InvertedSpan { line: 7, start: 4, end: 2, .. }));
    }

    #[test]
    fn test_predictions_from_spans() {
        let labels = labels();
        let spans = vec![vec![Span::new(0, 2, 3), Span::new(9, 5, 5)], vec![]];

        let predictions = Prediction::from_spans(&spans, &labels);

        assert_eq!(
            predictions,
            vec![
                Prediction::new(
                    0,
                    vec![
                        Entity::new("address".into(), 2, 3),
                        Entity::new("scene".into(), 5, 5)
                    ]
                ),
                Prediction::new(1, vec![]),
            ]
        );
    }

    #[tokio::test]
    async fn test_unlabelled_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.json");
        std::fs::write(
            &path,
            "{\"id\": 0, \"text\": \"北京大学\"}\n\
             {\"text\": \"上海\", \"label\": {\"address\": {\"上海\": [[0, 1]]}}}\n",
        )
        .unwrap();

        let items = Item::read(path.to_str().unwrap()).await.unwrap();

        assert!(!items[0].is_labelled());
        assert!(items[0].entities.is_empty());
        assert!(items[1].is_labelled());
        assert_eq!(items[1].entities, vec![Entity::new("address".into(), 0, 1)]);
    }
}
