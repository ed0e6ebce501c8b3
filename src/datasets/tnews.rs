use async_trait::async_trait;
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::utils::files::read_json_lines;

use super::{DatasetError, Record};

/// A news title and its category label. Test files carry no label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, new)]
pub struct Item {
    /// The text for classification
    pub sentence: String,

    /// The category label of the text
    #[serde(default)]
    pub label: Option<String>,
}

#[async_trait]
impl Record for Item {
    async fn read(path: &str) -> Result<Vec<Self>, DatasetError> {
        let records = read_json_lines::<Item>(path).await?;

        Ok(records.into_iter().map(|(_, item)| item).collect())
    }

    fn is_labelled(&self) -> bool {
        self.label.is_some()
    }
}
