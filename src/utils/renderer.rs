use std::collections::BTreeMap;

use burn::train::renderer::{MetricState, MetricsRenderer, TrainingProgress};
use derive_new::new;

/// A renderer for TUI-disabled runs: progress and the latest metric values go through the logger,
/// at info level once per epoch and at debug level for every other step
#[derive(new)]
pub struct Simple {
    #[new(default)]
    train: BTreeMap<String, String>,

    #[new(default)]
    valid: BTreeMap<String, String>,
}

impl MetricsRenderer for Simple {
    fn update_train(&mut self, state: MetricState) {
        record(&mut self.train, state);
    }

    fn update_valid(&mut self, state: MetricState) {
        record(&mut self.valid, state);
    }

    fn render_train(&mut self, item: TrainingProgress) {
        render("train", &item, &self.train);
    }

    fn render_valid(&mut self, item: TrainingProgress) {
        render("valid", &item, &self.valid);
    }
}

fn record(metrics: &mut BTreeMap<String, String>, state: MetricState) {
    let entry = match state {
        MetricState::Generic(entry) => entry,
        MetricState::Numeric(entry, _) => entry,
    };

    metrics.insert(entry.name, entry.formatted);
}

fn render(split: &str, item: &TrainingProgress, metrics: &BTreeMap<String, String>) {
    let summary = metrics
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join(", ");

    let level = if item.progress.items_processed >= item.progress.items_total {
        log::Level::Info
    } else {
        log::Level::Debug
    };

    log::log!(
        level,
        "{} epoch {}/{} iteration {} ({}/{} items) {}",
        split,
        item.epoch,
        item.epoch_total,
        item.iteration,
        item.progress.items_processed,
        item.progress.items_total,
        summary
    );
}
