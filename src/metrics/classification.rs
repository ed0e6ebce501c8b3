use crate::utils::classes::Labels;

use super::{Counts, Report};

/// Micro-averaged F1 for single-label predictions. With exactly one prediction per example
/// this equals accuracy.
pub fn micro_f1(y_true: &[usize], y_pred: &[usize]) -> f64 {
    let total = y_true.len().min(y_pred.len());
    if total == 0 {
        return 0.0;
    }

    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();

    correct as f64 / total as f64
}

/// Per-class precision / recall / F1 / support, listing every label of the vocabulary
pub fn report(y_true: &[usize], y_pred: &[usize], labels: &Labels) -> Report {
    let mut counts = vec![Counts::default(); labels.len()];

    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        if let Some(c) = counts.get_mut(t) {
            c.gold += 1;
        }

        if let Some(c) = counts.get_mut(p) {
            c.predicted += 1;

            if t == p {
                c.correct += 1;
            }
        }
    }

    let named: Vec<(String, Counts)> = labels.names().into_iter().zip(counts).collect();

    Report::from_counts(&named)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_micro_f1_is_accuracy() {
        assert_eq!(micro_f1(&[0, 1, 2, 1], &[0, 1, 1, 1]), 0.75);
        assert_eq!(micro_f1(&[], &[]), 0.0);
    }

    #[test]
    fn test_report() {
        let labels = Labels::sorted(["news_car", "news_sports"]);
        let report = report(&[0, 0, 1], &[0, 1, 1], &labels);

        assert_eq!(report.rows[0].precision, 1.0);
        assert_eq!(report.rows[0].recall, 0.5);
        assert_eq!(report.rows[1].precision, 0.5);
        assert_eq!(report.rows[1].support, 1);
        assert!((report.micro_f1() - 2.0 / 3.0).abs() < 1e-12);
    }
}
