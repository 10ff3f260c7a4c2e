pub mod driver;
pub mod early_stopping;
pub mod metrics;
pub mod trainer;

pub use driver::{train, RunSummary, TrainedRun};
pub use early_stopping::{Decision, EarlyStopping};
pub use metrics::{Metrics, MetricsAccumulator};
pub use trainer::{StepOutput, Trainer};
