//! Validation metrics computed from decoded model outputs

use std::collections::{BTreeMap, BTreeSet};

use crate::utils::classes::Labels;

/// Precision / recall / F1 reports
pub mod report;

/// Single-label classification metrics
pub mod classification;

/// Entity span metrics
pub mod pointer;

/// Subject-predicate-object triple metrics
pub mod spo;

/// Correlation metrics for sentence embeddings
pub mod correlation;

pub use report::{Counts, Report};

/// An annotation that belongs to exactly one label
pub trait Labeled: Ord + Clone {
    /// The label id
    fn label(&self) -> usize;
}

/// Accumulates per-label set matches across any number of examples
#[derive(Clone, Debug)]
pub struct SetMetric<T> {
    counts: BTreeMap<usize, Counts>,
    _annotation: std::marker::PhantomData<T>,
}

impl<T> Default for SetMetric<T> {
    fn default() -> Self {
        Self {
            counts: BTreeMap::new(),
            _annotation: std::marker::PhantomData,
        }
    }
}

impl<T: Labeled> SetMetric<T> {
    /// Create an empty metric
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one example. Duplicate annotations count once.
    pub fn update(&mut self, gold: &[T], predicted: &[T]) {
        let gold: BTreeSet<&T> = gold.iter().collect();
        let predicted: BTreeSet<&T> = predicted.iter().collect();

        for item in gold.iter() {
            self.counts.entry(item.label()).or_default().gold += 1;
        }

        for item in predicted.iter() {
            let counts = self.counts.entry(item.label()).or_default();
            counts.predicted += 1;

            if gold.contains(item) {
                counts.correct += 1;
            }
        }
    }

    /// Counts summed over all labels
    pub fn total(&self) -> Counts {
        let mut total = Counts::default();
        for counts in self.counts.values() {
            total += *counts;
        }

        total
    }

    /// The counts for one label
    pub fn counts(&self, label: usize) -> Counts {
        self.counts.get(&label).copied().unwrap_or_default()
    }

    /// Micro-averaged F1 over all labels
    pub fn micro_f1(&self) -> f64 {
        self.total().f1()
    }

    /// Macro-averaged F1 over labels that were predicted or annotated
    pub fn macro_f1(&self) -> f64 {
        let f1: Vec<f64> = self
            .counts
            .values()
            .filter(|c| !c.is_empty())
            .map(Counts::f1)
            .collect();

        if f1.is_empty() {
            0.0
        } else {
            f1.iter().sum::<f64>() / f1.len() as f64
        }
    }

    /// A report listing every label of the vocabulary
    pub fn report(&self, labels: &Labels) -> Report {
        let counts: Vec<(String, Counts)> = labels
            .id2label()
            .iter()
            .map(|(id, name)| (name.clone(), self.counts(*id)))
            .collect();

        Report::from_counts(&counts)
    }

    /// Forget all accumulated examples
    pub fn clear(&mut self) {
        self.counts.clear();
    }
}
