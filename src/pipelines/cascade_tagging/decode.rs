use crate::{metrics::pointer::Span, pipelines::batcher::char_rows};

use super::{TAG_B, TAG_I};

/// Collect `B I*` runs into spans, typed by the entity prediction at the `B` token. Both slices
/// hold one prediction per character.
pub fn decode(seq_tags: &[i64], ent_tags: &[i64]) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut position = 0;

    while position < seq_tags.len() {
        if seq_tags[position] != TAG_B {
            position += 1;
            continue;
        }

        let start = position;
        position += 1;

        while position < seq_tags.len() && seq_tags[position] == TAG_I {
            position += 1;
        }

        spans.push(Span::new(ent_tags[start] as usize, start, position - 1));
    }

    spans
}

/// Decode `[batch, width]` sequence and entity tags, one span list per sequence
pub fn spans_from_tags(
    seq_tags: &[i64],
    ent_tags: &[i64],
    width: usize,
    seqlens: &[usize],
) -> Vec<Vec<Span>> {
    seqlens
        .iter()
        .enumerate()
        .map(|(index, &seqlen)| {
            let rows = char_rows(index, width, seqlen);
            decode(&seq_tags[rows.clone()], &ent_tags[rows])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_decode_runs() {
        let seq_tags = [2, 1, 2, 2, 0, 1, 1, 2];
        let ent_tags = [0, 3, 1, 1, 0, 2, 4, 0];

        assert_eq!(
            decode(&seq_tags, &ent_tags),
            vec![Span::new(3, 1, 3), Span::new(2, 5, 5), Span::new(4, 6, 7)]
        );
    }

    #[test]
    fn test_runs_stop_at_sep() {
        // [CLS] B I [SEP] [PAD], then [CLS] O B I I
        let seq_tags = [1, 1, 2, 2, 2, 0, 0, 1, 2, 2];
        let ent_tags = [5, 3, 0, 0, 0, 0, 0, 7, 0, 0];

        let spans = spans_from_tags(&seq_tags, &ent_tags, 5, &[4, 5]);

        assert_eq!(spans, vec![vec![Span::new(3, 0, 1)], vec![Span::new(7, 1, 2)]]);
    }
}
