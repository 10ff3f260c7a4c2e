use std::sync::{Arc, Mutex, PoisonError};

use crate::config::RunConfig;
use crate::error::Result;
use crate::train::metrics::Metrics;
use crate::writer::{MetricsWriter, WriterEvent};

/// Keeps every event in memory behind a shared handle.
///
/// `fin` is only recorded when a run is open, so repeated calls leave a
/// single `Fin` per run.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    events: Arc<Mutex<Vec<WriterEvent>>>,
    open: bool,
}

impl MemoryWriter {
    pub fn new() -> MemoryWriter {
        MemoryWriter::default()
    }

    /// Handle that stays readable after the writer is boxed and moved.
    pub fn events(&self) -> Arc<Mutex<Vec<WriterEvent>>> {
        Arc::clone(&self.events)
    }

    fn record(&self, event: WriterEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

impl MetricsWriter for MemoryWriter {
    fn start(&mut self, config: &RunConfig) -> Result<()> {
        self.open = true;
        self.record(WriterEvent::Start { config: config.clone() });
        Ok(())
    }

    fn write(&mut self, metrics: &Metrics, step: usize) -> Result<()> {
        self.record(WriterEvent::Metrics { step, metrics: metrics.clone() });
        Ok(())
    }

    fn fin(&mut self) -> Result<()> {
        if std::mem::take(&mut self.open) {
            self.record(WriterEvent::Fin);
        }
        Ok(())
    }
}
