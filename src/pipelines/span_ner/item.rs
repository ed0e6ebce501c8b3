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

/// Encoded text with sparse start/end targets and the gold spans
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// One token per character
    pub encoded: Encoded,

    /// `(token position, label id)` of every span start that fits the sequence
    pub starts: Vec<(usize, usize)>,

    /// `(token position, label id)` of every span end that fits the sequence
    pub ends: Vec<(usize, usize)>,

    /// Every annotated span, including those cut by truncation
    pub spans: Vec<Span>,
}

/// Encode a CLUENER record. Token positions are character offsets shifted by one for `[CLS]`.
pub fn encode(
    encoder: &Encoder,
    labels: &Labels,
    item: &cluener::Item,
    max_seq_length: usize,
) -> Result<Feature, FeatureError> {
    let encoded = encoder.encode_chars(&item.text, max_seq_length)?;
    let kept = encoded.seqlen - 2;

    let mut starts = Vec::with_capacity(item.entities.len());
    let mut ends = Vec::with_capacity(item.entities.len());
    let mut spans = Vec::with_capacity(item.entities.len());

    for entity in item.entities.iter() {
        let label = labels.id(&entity.label)?;
        spans.push(Span::new(label, entity.start, entity.end));

        if entity.end >= kept {
            continue;
        }

        starts.push((entity.start + 1, label));
        ends.push((entity.end + 1, label));
    }

    Ok(Feature {
        encoded,
        starts,
        ends,
        spans,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{datasets::cluener::Entity, pipelines::encoding::tests::encoder};

    #[test]
    fn test_encode_shifts_for_cls_and_skips_truncated() {
        let (_dir, encoder) = encoder(true);
        let labels = Labels::sorted(["name", "organization"]);

        let item = cluener::Item::new(
            "北京大学是".to_string(),
            vec![
                Entity::new("organization".to_string(), 0, 3),
                Entity::new("name".to_string(), 4, 4),
            ],
        );

        let feature = encode(&encoder, &labels, &item, 7).unwrap();

        assert_eq!(feature.starts, vec![(1, 1), (5, 0)]);
        assert_eq!(feature.ends, vec![(4, 1), (5, 0)]);

        let truncated = encode(&encoder, &labels, &item, 6).unwrap();

        assert_eq!(truncated.starts, vec![(1, 1)]);
        assert_eq!(truncated.ends, vec![(4, 1)]);
        assert_eq!(
            truncated.spans,
            vec![Span::new(1, 0, 3), Span::new(0, 4, 4)]
        );
    }
}
