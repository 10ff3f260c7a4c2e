use tracing::info;

use crate::config::RunConfig;
use crate::error::Result;
use crate::train::metrics::Metrics;
use crate::writer::MetricsWriter;

/// Logs the run lifecycle through `tracing`.
#[derive(Debug, Default)]
pub struct ConsoleWriter {
    current: Option<String>,
}

impl ConsoleWriter {
    pub fn new() -> ConsoleWriter {
        ConsoleWriter::default()
    }
}

impl MetricsWriter for ConsoleWriter {
    fn start(&mut self, config: &RunConfig) -> Result<()> {
        info!(
            experiment = %config.experiment_name,
            reg = config.reg_constant,
            dropout = config.dropout_constant,
            epochs = config.epochs,
            batch = config.batch_size,
            "run started"
        );
        self.current = Some(config.experiment_name.clone());
        Ok(())
    }

    fn write(&mut self, metrics: &Metrics, step: usize) -> Result<()> {
        let experiment = self.current.as_deref().unwrap_or("-");
        info!(experiment, step, ?metrics, "metrics");
        Ok(())
    }

    fn fin(&mut self) -> Result<()> {
        if let Some(experiment) = self.current.take() {
            info!(%experiment, "run finished");
        }
        Ok(())
    }
}
