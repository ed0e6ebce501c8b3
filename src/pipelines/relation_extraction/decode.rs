use crate::{metrics::spo::Triple, pipelines::batcher::char_rows};

use super::{n_columns, object_column, subject_column, CONTINUATION};

/// Extract the triples encoded by link rows. `rows` is row-major `[chars, 2 * n + 2]`, a bit is
/// set when its value is above `threshold`. Every start extends through the continuation rows
/// that follow it, and subjects pair with every object of the same predicate.
pub fn extract_spoes(rows: &[f32], n_predicates: usize, threshold: f32) -> Vec<Triple> {
    let columns = n_columns(n_predicates);
    let len = rows.len() / columns;

    let is_set = |row: usize, column: usize| rows[row * columns + column] > threshold;

    let span = |start: usize| {
        let mut end = start;
        while end + 1 < len && is_set(end + 1, CONTINUATION) {
            end += 1;
        }

        (start, end)
    };

    let mut triples = Vec::new();

    for predicate in 0..n_predicates {
        let starts = |column: usize| -> Vec<(usize, usize)> {
            (0..len)
                .filter(|&row| is_set(row, column))
                .map(&span)
                .collect()
        };

        let subjects = starts(subject_column(predicate));
        let objects = starts(object_column(predicate, n_predicates));

        for subject in subjects.iter() {
            for object in objects.iter() {
                triples.push(Triple::new(*subject, predicate, *object));
            }
        }
    }

    triples.sort();
    triples.dedup();
    triples
}

/// Extract the triples of a `[batch, width, columns]` batch of link probabilities, one list per
/// sequence
pub fn triples_from_rows(
    probabilities: &[f32],
    width: usize,
    columns: usize,
    seqlens: &[usize],
    n_predicates: usize,
    threshold: f32,
) -> Vec<Vec<Triple>> {
    seqlens
        .iter()
        .enumerate()
        .map(|(index, &seqlen)| {
            let rows = char_rows(index, width, seqlen);
            let values = &probabilities[rows.start * columns..rows.end * columns];

            extract_spoes(values, n_predicates, threshold)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_pairs_by_predicate() {
        // 1 predicate, 4 columns: outside, continuation, subject, object
        #[rustfmt::skip]
        let rows = [
            0.1, 0.0, 0.9, 0.0, // subject start
            0.0, 0.8, 0.0, 0.0, // continuation
            0.9, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.7, // object start
            0.0, 0.0, 0.0, 0.6, // object start
            0.0, 0.9, 0.0, 0.0, // continuation
        ];

        assert_eq!(
            extract_spoes(&rows, 1, 0.5),
            vec![
                Triple::new((0, 1), 0, (3, 3)),
                Triple::new((0, 1), 0, (4, 5)),
            ]
        );
    }

    #[test]
    fn test_no_objects_no_triples() {
        let rows = [0.0, 0.0, 0.9, 0.0];

        assert_eq!(extract_spoes(&rows, 1, 0.5), vec![]);
    }

    #[test]
    fn test_batch_rows_skip_cls_and_sep() {
        // Width 5. First: [CLS] s o [SEP] [PAD], second: [CLS] s o o [SEP]
        #[rustfmt::skip]
        let probabilities = [
            0.0, 0.0, 0.9, 0.9,
            0.0, 0.0, 0.9, 0.0,
            0.0, 0.0, 0.0, 0.9,
            0.0, 0.9, 0.9, 0.0,
            0.0, 0.9, 0.0, 0.0,

            0.0, 0.0, 0.9, 0.9,
            0.0, 0.0, 0.9, 0.0,
            0.0, 0.0, 0.0, 0.9,
            0.0, 0.9, 0.0, 0.0,
            0.0, 0.9, 0.0, 0.9,
        ];

        let triples = triples_from_rows(&probabilities, 5, 4, &[4, 5], 1, 0.5);

        assert_eq!(
            triples,
            vec![
                vec![Triple::new((0, 0), 0, (1, 1))],
                vec![Triple::new((0, 0), 0, (1, 2))],
            ]
        );
    }
}
