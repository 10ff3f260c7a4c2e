//! Sinks for per-run hyperparameters and metrics.
//!
//! A writer sees each run as `start`, any number of `write`s, then `fin`.
//! `fin` must be safe to call again after a run is already closed.

pub mod console;
pub mod dashboard;
pub mod jsonl;
pub mod memory;

use serde::{Serialize, Deserialize};

use crate::config::RunConfig;
use crate::error::Result;
use crate::train::metrics::Metrics;

pub use console::ConsoleWriter;
pub use dashboard::DashboardWriter;
pub use jsonl::JsonlWriter;
pub use memory::MemoryWriter;

pub trait MetricsWriter {
    /// Opens a run and records its hyperparameters.
    fn start(&mut self, config: &RunConfig) -> Result<()>;

    /// Records scalar metrics at a step.
    fn write(&mut self, metrics: &Metrics, step: usize) -> Result<()>;

    /// Closes the current run. Idempotent.
    fn fin(&mut self) -> Result<()>;
}

/// One lifecycle event, as persisted by the JSONL writer and streamed by
/// the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WriterEvent {
    Start { config: RunConfig },
    Metrics { step: usize, metrics: Metrics },
    Fin,
}

impl WriterEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WriterEvent::Start { .. } => "start",
            WriterEvent::Metrics { .. } => "metrics",
            WriterEvent::Fin => "fin",
        }
    }
}

/// Forwards every call to each inner writer in order.
///
/// All writers are called even if one fails; the first error is returned.
#[derive(Default)]
pub struct Fanout {
    writers: Vec<Box<dyn MetricsWriter>>,
}

impl Fanout {
    pub fn new() -> Fanout {
        Fanout::default()
    }

    pub fn push(&mut self, writer: Box<dyn MetricsWriter>) {
        self.writers.push(writer);
    }

    pub fn with(mut self, writer: impl MetricsWriter + 'static) -> Fanout {
        self.push(Box::new(writer));
        self
    }

    fn each(&mut self, mut f: impl FnMut(&mut dyn MetricsWriter) -> Result<()>) -> Result<()> {
        let mut first_err = None;
        for w in &mut self.writers {
            if let Err(e) = f(w.as_mut()) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl MetricsWriter for Fanout {
    fn start(&mut self, config: &RunConfig) -> Result<()> {
        self.each(|w| w.start(config))
    }

    fn write(&mut self, metrics: &Metrics, step: usize) -> Result<()> {
        self.each(|w| w.write(metrics, step))
    }

    fn fin(&mut self) -> Result<()> {
        self.each(|w| w.fin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct Failing;

    impl MetricsWriter for Failing {
        fn start(&mut self, _: &RunConfig) -> Result<()> {
            Err(Error::writer("unavailable"))
        }
        fn write(&mut self, _: &Metrics, _: usize) -> Result<()> {
            Err(Error::writer("unavailable"))
        }
        fn fin(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn fanout_reaches_every_writer_despite_errors() {
        let memory = MemoryWriter::new();
        let events = memory.events();
        let mut fanout = Fanout::new().with(Failing).with(memory);

        assert!(fanout.start(&RunConfig::default()).is_err());
        fanout.fin().unwrap();

        let seen = events.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], WriterEvent::Fin);
    }

    #[test]
    fn events_are_tagged_by_name() {
        let json = serde_json::to_string(&WriterEvent::Fin).unwrap();
        assert_eq!(json, r#"{"event":"fin"}"#);
        let metrics = WriterEvent::Metrics { step: 3, metrics: Metrics::from([("val_acc".into(), 0.5)]) };
        let back: WriterEvent = serde_json::from_str(&serde_json::to_string(&metrics).unwrap()).unwrap();
        assert_eq!(back.name(), "metrics");
    }
}
