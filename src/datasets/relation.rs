use std::collections::BTreeMap;

use async_trait::async_trait;
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::utils::files::read_json_lines;

use super::{
    cluener::{flatten_entities, Entity, RawEntities},
    DatasetError, Record,
};

/// A relation between two mentions. The predicate is the full
/// `subject_label+predicate+object_label` label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct Relation {
    /// Subject start and end, inclusive
    pub subject: (usize, usize),

    /// The predicate label
    pub predicate: String,

    /// Object start and end, inclusive
    pub object: (usize, usize),
}

/// A text with optional entity and relation annotations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, new)]
pub struct Item {
    /// The annotated text
    pub text: String,

    /// Entity mentions, if annotated
    pub entities: Option<Vec<Entity>>,

    /// Relations, if annotated
    pub relations: Option<Vec<Relation>>,
}

#[derive(Deserialize)]
struct Argument {
    pos: (usize, usize),
    label: String,
}

#[derive(Deserialize)]
struct Line {
    text: String,

    #[serde(default)]
    entities: Option<RawEntities>,

    #[serde(default)]
    re_list: Option<Vec<BTreeMap<String, Vec<Argument>>>>,
}

fn malformed(path: &str, line: usize, reason: String) -> DatasetError {
    DatasetError::Malformed {
        path: path.to_string(),
        line,
        reason,
    }
}

fn convert_relations(
    re_list: Vec<BTreeMap<String, Vec<Argument>>>,
    path: &str,
    line: usize,
) -> Result<Vec<Relation>, DatasetError> {
    let mut relations = Vec::new();

    for node in re_list {
        for (predicate, arguments) in node {
            let [subject, object] = <[Argument; 2]>::try_from(arguments).map_err(|args| {
                malformed(
                    path,
                    line,
                    format!("relation {} has {} arguments, expected 2", predicate, args.len()),
                )
            })?;

            for (start, end) in [subject.pos, object.pos] {
                if start > end {
                    return Err(DatasetError::InvertedSpan {
                        path: path.to_string(),
                        line,
                        label: predicate.clone(),
                        start,
                        end,
                    });
                }
            }

            relations.push(Relation::new(
                subject.pos,
                [subject.label.as_str(), predicate.as_str(), object.label.as_str()].join("+"),
                object.pos,
            ));
        }
    }

    Ok(relations)
}

#[async_trait]
impl Record for Item {
    async fn read(path: &str) -> Result<Vec<Self>, DatasetError> {
        let mut items = Vec::new();

        for (line, record) in read_json_lines::<Line>(path).await? {
            let entities = match record.entities {
                Some(raw) if !raw.is_empty() => Some(flatten_entities(raw, path, line)?),
                _ => None,
            };

            let relations = record
                .re_list
                .map(|re_list| convert_relations(re_list, path, line))
                .transpose()?;

            items.push(Item::new(record.text, entities, relations));
        }

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    use super::*;

    fn write(content: &str) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), content).unwrap();
        file
    }

    #[tokio::test]
    async fn test_read_relations() {
        let file = write(concat!(
            r#"{"text": "张三毕业于北京大学", "entities": {"人物": {"张三": [[0, 1]]}}, "#,
            r#""re_list": [{"毕业院校": [{"pos": [0, 1], "label": "人物"}, {"pos": [5, 8], "label": "学校"}]}]}"#,
            "\n\n",
            r#"{"text": "无标注"}"#,
            "\n"
        ));

        let items = Item::read(file.path().to_str().unwrap()).await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].relations,
            Some(vec![Relation::new((0, 1), "人物+毕业院校+学校".into(), (5, 8))])
        );
        assert_eq!(items[0].entities.as_ref().map(Vec::len), Some(1));
        assert_eq!(items[1].relations, None);
        assert_eq!(items[1].entities, None);
    }

    #[tokio::test]
    async fn test_relation_with_missing_object() {
        let file = write(
            r#"{"text": "abc", "re_list": [{"p": [{"pos": [0, 1], "label": "s"}]}]}"#,
        );

        let err = Item::read(file.path().to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, DatasetError::Malformed { line: 1, .. }));
    }
}
