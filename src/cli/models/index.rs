use std::{fmt::Display, path::Path};

use super::bert;

/// Available Models
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Model {
    /// The BERT family of models, with the hub name or local directory contained within
    Bert(String),
}

impl Model {
    /// Get the model type
    pub fn model_type(&self) -> &str {
        match self {
            Model::Bert(_) => bert::MODEL_TYPE,
        }
    }

    /// The hub name or local directory of the model
    pub fn name_or_path(&self) -> &str {
        let Model::Bert(name) = self;

        name
    }
}

impl Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Model::Bert(name) = self;

        write!(f, "{}", name)
    }
}

impl TryFrom<&str> for Model {
    type Error = ModelError;

    /// Accept a local directory holding `config.json` and weights, or a hub id of the form
    /// `name` or `namespace/name`
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if Path::new(value).is_dir() || bert::ALL_MODELS.contains(&value) || is_hub_id(value) {
            Ok(Model::Bert(value.to_string()))
        } else {
            Err(ModelError::Unknown(value.to_string()))
        }
    }
}

fn is_hub_id(value: &str) -> bool {
    let parts: Vec<&str> = value.split('/').collect();

    parts.len() <= 2
        && parts.iter().all(|part| {
            !part.is_empty()
                && !part.starts_with(['.', '-'])
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        })
}

/// Model Error
#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    /// No model found for the given string
    #[error("no model found for {0}")]
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_hub_and_local_models() {
        let model = Model::try_from("hfl/chinese-roberta-wwm-ext").unwrap();
        assert_eq!(model.model_type(), "bert");
        assert_eq!(model.to_string(), "hfl/chinese-roberta-wwm-ext");

        let dir = tempfile::tempdir().unwrap();
        let local = Model::try_from(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(local.name_or_path(), dir.path().to_str().unwrap());

        let hub = Model::try_from("uer/chinese_roberta_L-4_H-256").unwrap();
        assert_eq!(hub.name_or_path(), "uer/chinese_roberta_L-4_H-256");
    }

    #[test]
    fn test_malformed_model_ids() {
        for value in ["", "a/b/c", "has space", "/missing/dir", "ns/", "../up"] {
            assert!(Model::try_from(value).is_err(), "{}", value);
        }
    }
}
