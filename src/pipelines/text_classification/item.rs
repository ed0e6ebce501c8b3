use serde::{Deserialize, Serialize};

use crate::{
    datasets::tnews,
    pipelines::{encoding::{Encoded, Encoder}, FeatureError},
    utils::classes::Labels,
};

/// An encoded sentence with its class id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// The tokenized sentence
    pub encoded: Encoded,

    /// The class id, 0 for unlabelled records
    pub label: usize,
}

/// Encode a sentence through the sub-word tokenizer. Unlabelled records get class 0, labels
/// outside the vocabulary are an error.
pub fn encode(
    encoder: &Encoder,
    labels: &Labels,
    item: &tnews::Item,
    max_seq_length: usize,
) -> Result<Feature, FeatureError> {
    let encoded = encoder.encode_text(&item.sentence, max_seq_length)?;

    let label = match &item.label {
        Some(label) => labels.id(label)?,
        None => 0,
    };

    Ok(Feature { encoded, label })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{pipelines::encoding::tests::encoder, utils::classes::LabelError};

    #[test]
    fn test_encode_label_ids() {
        let (_dir, encoder) = encoder(true);
        let labels = Labels::sorted(["news_tech", "news_culture"]);

        let item = tnews::Item::new("北京".to_string(), Some("news_tech".to_string()));
        let feature = encode(&encoder, &labels, &item, 6).unwrap();

        assert_eq!(feature.label, 1);
        assert_eq!(feature.encoded.input_ids, vec![2, 5, 6, 3, 0, 0]);

        let unlabelled = tnews::Item::new("北京".to_string(), None);
        assert_eq!(encode(&encoder, &labels, &unlabelled, 6).unwrap().label, 0);
    }

    #[test]
    fn test_unknown_label() {
        let (_dir, encoder) = encoder(true);
        let labels = Labels::sorted(["news_tech"]);
        let item = tnews::Item::new("北京".to_string(), Some("news_game".to_string()));

        assert!(matches!(
            encode(&encoder, &labels, &item, 6),
            Err(FeatureError::Label(LabelError::Unknown(_)))
        ));
    }
}
