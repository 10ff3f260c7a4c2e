use std::path::PathBuf;

use crate::data::Splits;
use crate::writer::MetricsWriter;

/// Shared state for a whole sweep: the datasets, the metrics sink, and
/// where best-epoch snapshots go.
///
/// The sweep owns it and lends it to each run in turn.
pub struct ExperimentContext {
    pub writer: Box<dyn MetricsWriter>,
    pub splits: Splits,
    /// Smoke-test mode: the writer is never started.
    pub trial_run: bool,
    pub checkpoint_dir: Option<PathBuf>,
    /// Index of the run in progress, used to keep snapshot names unique.
    pub run_index: usize,
}

impl ExperimentContext {
    pub fn new(writer: Box<dyn MetricsWriter>, splits: Splits) -> ExperimentContext {
        ExperimentContext { writer, splits, trial_run: false, checkpoint_dir: None, run_index: 0 }
    }

    pub fn trial_run(mut self, trial: bool) -> Self {
        self.trial_run = trial;
        self
    }

    pub fn checkpoint_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.checkpoint_dir = dir;
        self
    }
}
