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

/// Encoded text with its sparse span matrix and the gold spans
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// One token per character
    pub encoded: Encoded,

    /// `(label, start token, end token)` of every span that fits the sequence
    pub cells: Vec<(usize, usize, usize)>,

    /// Every annotated span, including those cut by truncation
    pub spans: Vec<Span>,
}

/// Encode a CLUENER record into span matrix cells
pub fn encode(
    encoder: &Encoder,
    labels: &Labels,
    item: &cluener::Item,
    max_seq_length: usize,
) -> Result<Feature, FeatureError> {
    let encoded = encoder.encode_chars(&item.text, max_seq_length)?;
    let kept = encoded.seqlen - 2;

    let mut cells = Vec::with_capacity(item.entities.len());
    let mut spans = Vec::with_capacity(item.entities.len());

    for entity in item.entities.iter() {
        let label = labels.id(&entity.label)?;
        spans.push(Span::new(label, entity.start, entity.end));

        if entity.end < kept {
            cells.push((label, entity.start + 1, entity.end + 1));
        }
    }

    Ok(Feature {
        encoded,
        cells,
        spans,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{datasets::cluener::Entity, pipelines::encoding::tests::encoder};

    #[test]
    fn test_encode_cells() {
        let (_dir, encoder) = encoder(true);
        let labels = Labels::sorted(["address", "name"]);

        let item = cluener::Item::new(
            "北京大学".to_string(),
            vec![
                Entity::new("address".to_string(), 0, 1),
                Entity::new("name".to_string(), 2, 3),
            ],
        );

        let feature = encode(&encoder, &labels, &item, 5).unwrap();

        assert_eq!(feature.cells, vec![(0, 1, 2)]);
        assert_eq!(feature.spans.len(), 2);
    }
}
