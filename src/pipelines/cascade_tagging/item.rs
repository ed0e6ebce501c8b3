use serde::{Deserialize, Serialize};

use crate::{
    datasets::cluener,
    metrics::pointer::Span,
    pipelines::{
        encoding::{Encoded, Encoder},
        FeatureError,
    },
    utils::classes::Labels,
};

use super::{TAG_B, TAG_I, TAG_O};

/// Encoded text with BIO tags, entity type tags and the gold spans
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// One token per character
    pub encoded: Encoded,

    /// BIO tag per token, padded like the input ids
    pub seq_tags: Vec<i64>,

    /// Entity label id per tagged token, 0 on untagged tokens
    pub ent_tags: Vec<i64>,

    /// Every annotated span, including those cut by truncation
    pub spans: Vec<Span>,
}

/// Encode a CLUENER record into BIO and entity type tags
pub fn encode(
    encoder: &Encoder,
    labels: &Labels,
    item: &cluener::Item,
    max_seq_length: usize,
) -> Result<Feature, FeatureError> {
    let encoded = encoder.encode_chars(&item.text, max_seq_length)?;
    let kept = encoded.seqlen - 2;

    let mut seq_tags = vec![TAG_O; max_seq_length];
    let mut ent_tags = vec![0; max_seq_length];
    let mut spans = Vec::with_capacity(item.entities.len());

    for entity in item.entities.iter() {
        let label = labels.id(&entity.label)?;
        spans.push(Span::new(label, entity.start, entity.end));

        if entity.end >= kept {
            continue;
        }

        for position in entity.start + 1..=entity.end + 1 {
            seq_tags[position] = if position == entity.start + 1 {
                TAG_B
            } else {
                TAG_I
            };
            ent_tags[position] = label as i64;
        }
    }

    Ok(Feature {
        encoded,
        seq_tags,
        ent_tags,
        spans,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{datasets::cluener::Entity, pipelines::encoding::tests::encoder};

    #[test]
    fn test_encode_bio() {
        let (_dir, encoder) = encoder(true);
        let labels = Labels::sorted(["address", "name"]);

        let item = cluener::Item::new(
            "北京大学是".to_string(),
            vec![
                Entity::new("name".to_string(), 0, 1),
                Entity::new("address".to_string(), 2, 4),
            ],
        );

        let feature = encode(&encoder, &labels, &item, 8).unwrap();

        assert_eq!(feature.seq_tags, vec![0, 1, 2, 1, 2, 2, 0, 0]);
        assert_eq!(feature.ent_tags, vec![0, 1, 1, 0, 0, 0, 0, 0]);
    }
}
