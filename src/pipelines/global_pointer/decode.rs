use crate::metrics::pointer::Span;

/// Decode one example's `[n_labels, width, width]` logits. Only cells between `[CLS]` and
/// `[SEP]` with `start <= end` are considered, offsets come back as character positions.
pub fn decode(
    logits: &[f32],
    n_labels: usize,
    width: usize,
    seqlen: usize,
    threshold: f32,
) -> Vec<Span> {
    let last = seqlen.saturating_sub(1).min(width);
    let mut spans = Vec::new();

    for label in 0..n_labels {
        for start in 1..last {
            for end in start..last {
                if logits[(label * width + start) * width + end] > threshold {
                    spans.push(Span::new(label, start - 1, end - 1));
                }
            }
        }
    }

    spans
}

/// Decode a batch of `[batch, n_labels, width, width]` logits, one span list per sequence
pub fn spans_from_logits(
    logits: &[f32],
    n_labels: usize,
    width: usize,
    seqlens: &[usize],
    threshold: f32,
) -> Vec<Vec<Span>> {
    let size = n_labels * width * width;

    seqlens
        .iter()
        .enumerate()
        .map(|(index, &seqlen)| {
            let example = &logits[index * size..(index + 1) * size];
            decode(example, n_labels, width, seqlen, threshold)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_decode_skips_special_and_lower_cells() {
        let width = 4;
        let cell = |label: usize, start: usize, end: usize| (label * width + start) * width + end;
        let mut logits = vec![-5.0; 2 * width * width];

        // (2, 1) is below the diagonal, (0, 1) starts on [CLS] and (1, 3) ends on [SEP]
        for (start, end) in [(1, 2), (2, 1), (0, 1), (1, 3)] {
            logits[cell(0, start, end)] = 3.0;
        }
        logits[cell(1, 2, 2)] = 0.5;

        assert_eq!(
            decode(&logits, 2, width, 4, 0.0),
            vec![Span::new(0, 0, 1), Span::new(1, 1, 1)]
        );
    }

    #[test]
    fn test_batch_offsets_per_sequence() {
        let (n_labels, width) = (2, 4);
        let mut logits = vec![-1.0; 2 * n_labels * width * width];
        let mut set = |index: usize, label: usize, start: usize, end: usize| {
            logits[((index * n_labels + label) * width + start) * width + end] = 1.0;
        };

        // First sequence fills the width: [CLS] a b [SEP]
        set(0, 1, 1, 2);
        set(0, 0, 2, 3);
        // Second is padded: [CLS] a [SEP] [PAD]
        set(1, 0, 1, 1);
        set(1, 1, 1, 2);
        set(1, 1, 3, 3);

        let spans = spans_from_logits(&logits, n_labels, width, &[4, 3], 0.0);

        assert_eq!(
            spans,
            vec![vec![Span::new(1, 0, 1)], vec![Span::new(0, 0, 0)]]
        );
    }
}
