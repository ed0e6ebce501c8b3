use serde::{Deserialize, Serialize};

use crate::{
    datasets::relation,
    metrics::spo::Triple,
    pipelines::{
        encoding::{Encoded, Encoder},
        FeatureError,
    },
    utils::classes::Labels,
};

use super::{decode::extract_spoes, n_columns, object_column, subject_column, CONTINUATION, OUTSIDE};

/// Encoded text with sparse link rows, the loss mask and the gold triples
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// One token per character
    pub encoded: Encoded,

    /// `(token position, column)` of every set link bit
    pub cells: Vec<(usize, usize)>,

    /// 1 for character tokens, 0 for `[CLS]`, `[SEP]` and padding
    pub mask: Vec<i64>,

    /// The triples the link rows encode
    pub triples: Vec<Triple>,
}

/// Encode a relation record into link rows. Relations whose subject or object ends past the kept
/// characters are skipped, records without relation annotations get all-zero rows.
pub fn encode(
    encoder: &Encoder,
    labels: &Labels,
    item: &relation::Item,
    max_seq_length: usize,
) -> Result<Feature, FeatureError> {
    let encoded = encoder.encode_chars(&item.text, max_seq_length)?;
    let seqlen = encoded.seqlen;
    let kept = seqlen - 2;

    let mut mask = vec![0; max_seq_length];
    mask[1..seqlen - 1].fill(1);

    let Some(relations) = &item.relations else {
        return Ok(Feature {
            encoded,
            cells: Vec::new(),
            mask,
            triples: Vec::new(),
        });
    };

    let n_predicates = labels.len();
    let columns = n_columns(n_predicates);
    let mut rows = vec![0.0f32; kept * columns];

    let mut mark = |start: usize, end: usize, column: usize| {
        rows[start * columns + column] = 1.0;

        for position in start + 1..=end {
            rows[position * columns + CONTINUATION] = 1.0;
        }
    };

    for relation in relations.iter() {
        let predicate = labels.id(&relation.predicate)?;
        let (subject, object) = (relation.subject, relation.object);

        if subject.1 >= kept || object.1 >= kept {
            continue;
        }

        mark(subject.0, subject.1, subject_column(predicate));
        mark(object.0, object.1, object_column(predicate, n_predicates));
    }

    for row in rows.chunks_mut(columns) {
        if row.iter().all(|value| *value == 0.0) {
            row[OUTSIDE] = 1.0;
        }
    }

    let triples = extract_spoes(&rows, n_predicates, 0.5);

    let mut cells = vec![(0, OUTSIDE)];
    for (index, value) in rows.iter().enumerate() {
        if *value > 0.0 {
            cells.push((index / columns + 1, index % columns));
        }
    }
    cells.push((seqlen - 1, OUTSIDE));

    Ok(Feature {
        encoded,
        cells,
        mask,
        triples,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{datasets::relation::Relation, pipelines::encoding::tests::encoder};

    fn labels() -> Labels {
        Labels::new(["人物+毕业院校+学校", "人物+出生地+地点"])
    }

    #[test]
    fn test_encode_link_rows() {
        let (_dir, encoder) = encoder(true);

        let item = relation::Item::new(
            "是北京大学".to_string(),
            None,
            Some(vec![Relation::new(
                (0, 0),
                "人物+出生地+地点".to_string(),
                (1, 2),
            )]),
        );

        let feature = encode(&encoder, &labels(), &item, 8).unwrap();

        // 6 columns: outside, continuation, 2 subject starts, 2 object starts
        assert_eq!(
            feature.cells,
            vec![(0, 0), (1, 3), (2, 5), (3, 1), (4, 0), (5, 0), (6, 0)]
        );
        assert_eq!(feature.mask, vec![0, 1, 1, 1, 1, 1, 0, 0]);
        assert_eq!(feature.triples, vec![Triple::new((0, 0), 1, (1, 2))]);
    }

    #[test]
    fn test_truncated_relation_and_missing_annotations() {
        let (_dir, encoder) = encoder(true);

        let relation = Relation::new((0, 0), "人物+出生地+地点".to_string(), (3, 4));
        let item = relation::Item::new("是北京大学".to_string(), None, Some(vec![relation]));

        let feature = encode(&encoder, &labels(), &item, 6).unwrap();
        assert!(feature.triples.is_empty());
        assert_eq!(feature.cells.len(), 6);

        let unlabelled = relation::Item::new("是北京".to_string(), None, None);
        let feature = encode(&encoder, &labels(), &unlabelled, 6).unwrap();
        assert!(feature.cells.is_empty());
        assert_eq!(feature.mask, vec![0, 1, 1, 1, 0, 0]);
    }
}
