use crate::metrics::pointer::Span;

/// Pair every tagged start with the nearest following ends of the same label, at most `top_n`
/// of them. `starts` and `ends` hold one class per character, 0 meaning no boundary and
/// `label + 1` otherwise.
pub fn decode_single(starts: &[usize], ends: &[usize], top_n: usize) -> Vec<Span> {
    let mut spans = Vec::new();

    for (start, &class) in starts.iter().enumerate() {
        if class == 0 {
            continue;
        }

        let matches = ends
            .iter()
            .enumerate()
            .skip(start)
            .filter(|(_, end_class)| **end_class == class)
            .take(top_n);

        spans.extend(matches.map(|(end, _)| Span::new(class - 1, start, end)));
    }

    spans
}

/// Multi-label decoding: `starts` and `ends` are row-major `[chars, n_labels]` probabilities.
/// Each label pairs its starts above `threshold` with its nearest following ends.
pub fn decode_multi(
    starts: &[f32],
    ends: &[f32],
    n_labels: usize,
    threshold: f32,
    top_n: usize,
) -> Vec<Span> {
    if n_labels == 0 {
        return Vec::new();
    }

    let chars = starts.len() / n_labels;
    let mut spans = Vec::new();

    for label in 0..n_labels {
        let above = |probs: &[f32], position: usize| probs[position * n_labels + label] > threshold;

        for start in (0..chars).filter(|&position| above(starts, position)) {
            let matches = (start..chars)
                .filter(|&position| above(ends, position))
                .take(top_n);

            spans.extend(matches.map(|end| Span::new(label, start, end)));
        }
    }

    spans.sort();
    spans
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_single_nearest_end() {
        //            0  1  2  3  4  5
        let starts = [2, 0, 0, 1, 0, 0];
        let ends = [0, 2, 2, 0, 1, 1];

        assert_eq!(
            decode_single(&starts, &ends, 1),
            vec![Span::new(1, 0, 1), Span::new(0, 3, 4)]
        );

        assert_eq!(
            decode_single(&starts, &ends, 2),
            vec![
                Span::new(1, 0, 1),
                Span::new(1, 0, 2),
                Span::new(0, 3, 4),
                Span::new(0, 3, 5)
            ]
        );
    }

    #[test]
    fn test_single_start_without_end() {
        assert_eq!(decode_single(&[0, 1, 0], &[1, 0, 0], 1), vec![]);
        assert_eq!(decode_single(&[1], &[1], 1), vec![Span::new(0, 0, 0)]);
    }

    #[test]
    fn test_multi_threshold() {
        // 3 characters, 2 labels
        let starts = [0.9, 0.1, 0.2, 0.7, 0.1, 0.1];
        let ends = [0.1, 0.1, 0.8, 0.2, 0.1, 0.6];

        assert_eq!(
            decode_multi(&starts, &ends, 2, 0.5, 1),
            vec![Span::new(0, 0, 1), Span::new(1, 1, 2)]
        );
    }
}
