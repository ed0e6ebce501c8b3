use std::fmt::{self, Display};

/// Match counts for one label
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    /// Predictions that match the gold annotation
    pub correct: usize,

    /// All predictions
    pub predicted: usize,

    /// All gold annotations
    pub gold: usize,
}

impl Counts {
    /// Share of predictions that are correct
    pub fn precision(&self) -> f64 {
        ratio(self.correct, self.predicted)
    }

    /// Share of gold annotations that were predicted
    pub fn recall(&self) -> f64 {
        ratio(self.correct, self.gold)
    }

    /// Harmonic mean of precision and recall
    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());

        if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            0.0
        }
    }

    /// Whether anything was predicted or annotated for this label
    pub fn is_empty(&self) -> bool {
        self.predicted == 0 && self.gold == 0
    }
}

impl std::ops::AddAssign for Counts {
    fn add_assign(&mut self, other: Self) {
        self.correct += other.correct;
        self.predicted += other.predicted;
        self.gold += other.gold;
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// One line of a report
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    /// The label, or the name of the average
    pub name: String,

    /// Precision
    pub precision: f64,

    /// Recall
    pub recall: f64,

    /// F1 score
    pub f1: f64,

    /// Number of gold annotations
    pub support: usize,
}

impl Row {
    fn from_counts(name: &str, counts: &Counts) -> Self {
        Self {
            name: name.to_string(),
            precision: counts.precision(),
            recall: counts.recall(),
            f1: counts.f1(),
            support: counts.gold,
        }
    }
}

/// A per-label precision / recall / F1 report with micro and macro averages
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    /// Per-label rows, in label id order
    pub rows: Vec<Row>,

    /// Totals over all matches
    pub micro: Row,

    /// Unweighted mean over labels that were predicted or annotated
    pub macro_avg: Row,
}

impl Report {
    /// Build a report from named per-label counts
    pub fn from_counts(counts: &[(String, Counts)]) -> Self {
        let mut total = Counts::default();
        for (_, c) in counts {
            total += *c;
        }

        let rows: Vec<Row> = counts
            .iter()
            .map(|(name, c)| Row::from_counts(name, c))
            .collect();

        let active: Vec<&Row> = counts
            .iter()
            .zip(rows.iter())
            .filter(|((_, c), _)| !c.is_empty())
            .map(|(_, row)| row)
            .collect();

        let mean = |f: fn(&Row) -> f64| {
            if active.is_empty() {
                0.0
            } else {
                active.iter().map(|row| f(row)).sum::<f64>() / active.len() as f64
            }
        };

        let macro_avg = Row {
            name: "macro avg".to_string(),
            precision: mean(|row| row.precision),
            recall: mean(|row| row.recall),
            f1: mean(|row| row.f1),
            support: total.gold,
        };

        Self {
            rows,
            micro: Row::from_counts("micro avg", &total),
            macro_avg,
        }
    }

    /// The micro-averaged F1 score
    pub fn micro_f1(&self) -> f64 {
        self.micro.f1
    }

    /// The macro-averaged F1 score
    pub fn macro_f1(&self) -> f64 {
        self.macro_avg.f1
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .rows
            .iter()
            .map(|row| row.name.chars().count())
            .chain([self.macro_avg.name.len()])
            .max()
            .unwrap_or(0);

        writeln!(
            f,
            "{:>width$}  {:>9}  {:>9}  {:>9}  {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;

        for row in self.rows.iter() {
            write_row(f, row, width)?;
        }

        writeln!(f)?;
        write_row(f, &self.micro, width)?;
        write_row(f, &self.macro_avg, width)
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, row: &Row, width: usize) -> fmt::Result {
    // Pad by character count, CJK label names would be misaligned by byte-based padding
    let padding = width.saturating_sub(row.name.chars().count());

    writeln!(
        f,
        "{}{}  {:>9.4}  {:>9.4}  {:>9.4}  {:>9}",
        " ".repeat(padding),
        row.name,
        row.precision,
        row.recall,
        row.f1,
        row.support
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_counts() {
        let counts = Counts {
            correct: 2,
            predicted: 4,
            gold: 2,
        };

        assert_eq!(counts.precision(), 0.5);
        assert_eq!(counts.recall(), 1.0);
        assert!((counts.f1() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(Counts::default().f1(), 0.0);
    }

    #[test]
    fn test_macro_skips_unseen_labels() {
        let report = Report::from_counts(&[
            (
                "a".to_string(),
                Counts {
                    correct: 1,
                    predicted: 1,
                    gold: 1,
                },
            ),
            ("b".to_string(), Counts::default()),
            (
                "c".to_string(),
                Counts {
                    correct: 0,
                    predicted: 1,
                    gold: 1,
                },
            ),
        ]);

        assert_eq!(report.macro_f1(), 0.5);
        assert_eq!(report.micro_f1(), 0.5);
        assert_eq!(report.micro.support, 2);

        let rendered = report.to_string();
        assert!(rendered.contains("micro avg"));
        assert_eq!(rendered.lines().count(), 7);
    }
}
