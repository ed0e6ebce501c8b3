use serde::{Deserialize, Serialize};

use super::{Labeled, SetMetric};

/// An entity mention: label id and inclusive character offsets into the text
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    /// The entity label id
    pub label: usize,

    /// Offset of the first character
    pub start: usize,

    /// Offset of the last character
    pub end: usize,
}

impl Span {
    /// Create a span
    pub fn new(label: usize, start: usize, end: usize) -> Self {
        Self { label, start, end }
    }
}

impl Labeled for Span {
    fn label(&self) -> usize {
        self.label
    }
}

/// Entity span precision / recall / F1, scored on exact label and boundary matches
pub type SpanMetric = SetMetric<Span>;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::utils::classes::Labels;

    #[test]
    fn test_exact_matches_only() {
        let mut metric = SpanMetric::new();

        metric.update(
            &[Span::new(0, 0, 2), Span::new(1, 5, 6)],
            &[Span::new(0, 0, 2), Span::new(1, 5, 7)],
        );
        metric.update(&[Span::new(1, 3, 4)], &[]);

        let total = metric.total();
        assert_eq!(total.correct, 1);
        assert_eq!(total.predicted, 2);
        assert_eq!(total.gold, 3);
        assert!((metric.micro_f1() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_duplicates_count_once() {
        let mut metric = SpanMetric::new();
        metric.update(&[Span::new(0, 1, 1)], &[Span::new(0, 1, 1), Span::new(0, 1, 1)]);

        assert_eq!(metric.micro_f1(), 1.0);
    }

    #[test]
    fn test_report_lists_all_labels() {
        let labels = Labels::sorted(["name", "address"]);
        let mut metric = SpanMetric::new();
        metric.update(&[Span::new(1, 0, 1)], &[Span::new(1, 0, 1)]);

        let report = metric.report(&labels);
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].name, "address");
        assert_eq!(report.rows[0].support, 0);
        assert_eq!(report.rows[1].f1, 1.0);
        assert_eq!(report.micro_f1(), 1.0);

        metric.clear();
        assert_eq!(metric.total().predicted, 0);
    }
}
