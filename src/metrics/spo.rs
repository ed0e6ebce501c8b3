use serde::{Deserialize, Serialize};

use super::{Labeled, SetMetric};

/// A relation between two spans, offsets are inclusive character positions
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    /// Subject start and end
    pub subject: (usize, usize),

    /// The predicate label id
    pub predicate: usize,

    /// Object start and end
    pub object: (usize, usize),
}

impl Triple {
    /// Create a triple
    pub fn new(subject: (usize, usize), predicate: usize, object: (usize, usize)) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

impl Labeled for Triple {
    fn label(&self) -> usize {
        self.predicate
    }
}

/// Relation precision / recall / F1 per predicate
pub type SpoMetric = SetMetric<Triple>;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_macro_f1_over_predicates() {
        let mut metric = SpoMetric::new();

        let gold = vec![
            Triple::new((0, 1), 0, (4, 5)),
            Triple::new((0, 1), 1, (7, 8)),
        ];
        let predicted = vec![
            Triple::new((0, 1), 0, (4, 5)),
            Triple::new((0, 1), 1, (7, 9)),
        ];
        metric.update(&gold, &predicted);

        assert_eq!(metric.counts(0).f1(), 1.0);
        assert_eq!(metric.counts(1).f1(), 0.0);
        assert_eq!(metric.macro_f1(), 0.5);
    }

    #[test]
    fn test_empty_metric() {
        let metric = SpoMetric::new();

        assert_eq!(metric.macro_f1(), 0.0);
        assert_eq!(metric.micro_f1(), 0.0);
    }
}
