use std::collections::BTreeMap;

/// Scalar metrics for one write, keyed by name.
pub type Metrics = BTreeMap<String, f64>;

pub const TRAIN_ACC: &str = "train_acc";
pub const VAL_ACC: &str = "val_acc";
pub const TRAIN_LOSS: &str = "train_loss";
pub const VAL_LOSS: &str = "val_loss";
pub const TEST_ACC: &str = "test_acc";

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        None
    } else {
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }
}

/// Per-step samples for the four epoch metrics.
///
/// Built fresh for every epoch (or log interval), reduced with
/// [`MetricsAccumulator::mean`], then dropped.
#[derive(Debug, Clone)]
pub struct MetricsAccumulator {
    series: BTreeMap<&'static str, Vec<f64>>,
}

impl Default for MetricsAccumulator {
    fn default() -> Self {
        MetricsAccumulator::new()
    }
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        let series = [TRAIN_ACC, VAL_ACC, TRAIN_LOSS, VAL_LOSS]
            .into_iter()
            .map(|name| (name, Vec::new()))
            .collect();
        MetricsAccumulator { series }
    }

    pub fn push(&mut self, name: &'static str, value: f64) {
        self.series.entry(name).or_default().push(value);
    }

    /// Replaces a series with a single sample.
    pub fn set(&mut self, name: &'static str, value: f64) {
        self.series.insert(name, vec![value]);
    }

    /// Mean of every non-empty series. Empty series are left out.
    pub fn mean(&self) -> Metrics {
        self.series
            .iter()
            .filter_map(|(name, samples)| mean(samples).map(|m| (name.to_string(), m)))
            .collect()
    }
}

/// Running accuracy over the batches seen since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamingAccuracy {
    correct: usize,
    total: usize,
}

impl StreamingAccuracy {
    pub fn update(&mut self, correct: usize, total: usize) {
        self.correct += correct;
        self.total += total;
    }

    /// Fraction correct in [0, 1]; 0 before any update.
    pub fn value(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    pub fn reset(&mut self) {
        *self = StreamingAccuracy::default();
    }
}
