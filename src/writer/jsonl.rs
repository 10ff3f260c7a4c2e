use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::error::Result;
use crate::train::metrics::Metrics;
use crate::writer::{MetricsWriter, WriterEvent};

/// Appends each run's events to its own `NNN-<experiment>.jsonl` file.
///
/// Runs are numbered in start order, so repeated experiment names never
/// overwrite each other. Writes outside an open run are dropped.
pub struct JsonlWriter {
    dir: PathBuf,
    current: Option<BufWriter<File>>,
    paths: Vec<PathBuf>,
}

impl JsonlWriter {
    pub fn new(dir: impl AsRef<Path>) -> Result<JsonlWriter> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(JsonlWriter { dir, current: None, paths: Vec::new() })
    }

    /// Files created so far, in run order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn append(&mut self, event: &WriterEvent) -> Result<bool> {
        let Some(out) = self.current.as_mut() else {
            return Ok(false);
        };
        serde_json::to_writer(&mut *out, event)?;
        out.write_all(b"\n")?;
        Ok(true)
    }
}

impl MetricsWriter for JsonlWriter {
    fn start(&mut self, config: &RunConfig) -> Result<()> {
        // A run left open by a failed entry is closed first.
        self.fin()?;
        let path = self
            .dir
            .join(format!("{:03}-{}.jsonl", self.paths.len() + 1, config.experiment_name));
        self.current = Some(BufWriter::new(File::create(&path)?));
        debug!(path = %path.display(), "run log opened");
        self.paths.push(path);
        self.append(&WriterEvent::Start { config: config.clone() })?;
        Ok(())
    }

    fn write(&mut self, metrics: &Metrics, step: usize) -> Result<()> {
        let event = WriterEvent::Metrics { step, metrics: metrics.clone() };
        if !self.append(&event)? {
            warn!(step, "no open run, metrics dropped");
        }
        Ok(())
    }

    fn fin(&mut self) -> Result<()> {
        if self.append(&WriterEvent::Fin)? {
            if let Some(mut out) = self.current.take() {
                out.flush()?;
            }
            if let Some(path) = self.paths.last() {
                info!(path = %path.display(), "run log closed");
            }
        }
        Ok(())
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        let _ = self.fin();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::train::metrics::VAL_ACC;

    fn read_events(path: &Path) -> Vec<WriterEvent> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn one_file_per_run_in_lifecycle_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = JsonlWriter::new(dir.path()).unwrap();
        let cfg = RunConfig { experiment_name: "L2Reg".into(), ..RunConfig::default() };

        writer.start(&cfg).unwrap();
        writer.write(&Metrics::from([(VAL_ACC.to_string(), 0.9)]), 7).unwrap();
        writer.fin().unwrap();
        writer.fin().unwrap();
        writer.start(&cfg).unwrap();
        writer.fin().unwrap();

        let paths = writer.paths().to_vec();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("001-L2Reg.jsonl"));
        assert!(paths[1].ends_with("002-L2Reg.jsonl"));

        let events = read_events(&paths[0]);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], WriterEvent::Start { config: cfg });
        assert_eq!(events[1].name(), "metrics");
        assert_eq!(events[2], WriterEvent::Fin);
    }

    #[test]
    fn writes_without_a_run_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = JsonlWriter::new(dir.path()).unwrap();
        writer.write(&Metrics::new(), 1).unwrap();
        writer.fin().unwrap();
        assert!(writer.paths().is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn starting_again_closes_the_open_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = JsonlWriter::new(dir.path()).unwrap();
        writer.start(&RunConfig::default()).unwrap();
        writer.start(&RunConfig::default()).unwrap();
        drop(writer);
        let first = read_events(&dir.path().join("001-.jsonl"));
        assert_eq!(first.last(), Some(&WriterEvent::Fin));
        let second = read_events(&dir.path().join("002-.jsonl"));
        assert_eq!(second.last(), Some(&WriterEvent::Fin));
    }
}
