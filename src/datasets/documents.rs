use async_trait::async_trait;
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::utils::files::read_json_lines;

use super::{DatasetError, Record};

/// A raw document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, new)]
pub struct Item {
    /// The document text, paragraphs separated by blank lines
    pub content: String,
}

impl Item {
    /// The non-empty paragraphs of the document
    pub fn paragraphs(&self) -> Vec<&str> {
        self.content
            .split("\n\n")
            .filter(|p| !p.is_empty())
            .collect()
    }

    /// Join the paragraphs and cut the result into pieces of at most `size` characters
    pub fn chunks(&self, size: usize) -> Vec<String> {
        let text: Vec<char> = self.paragraphs().concat().chars().collect();

        text.chunks(size.max(1))
            .map(|chunk| chunk.iter().collect())
            .collect()
    }
}

#[async_trait]
impl Record for Item {
    async fn read(path: &str) -> Result<Vec<Self>, DatasetError> {
        let records = read_json_lines::<Item>(path).await?;

        Ok(records.into_iter().map(|(_, item)| item).collect())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_paragraphs() {
        let item = Item::new("第一段\n\n\n\n第二段\n第二行".to_string());

        assert_eq!(item.paragraphs(), vec!["第一段", "第二段\n第二行"]);
    }

    #[test]
    fn test_chunks_count_characters() {
        let item = Item::new("一二三\n\n四五".to_string());

        assert_eq!(item.chunks(2), vec!["一二", "三四", "五"]);
        assert!(Item::new(String::new()).chunks(4).is_empty());
    }
}
