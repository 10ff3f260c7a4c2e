use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};

/// Largest class count a byte label can address.
pub const MAX_CLASSES: usize = u8::MAX as usize + 1;

/// Hyperparameters for one training run.
///
/// Serialized with upper-case keys; this is the mapping handed to
/// `MetricsWriter::start` and recorded at the top of every run log.
/// Sweep variants are produced by cloning and overriding fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct RunConfig {
    pub experiment_name: String,
    pub epochs: usize,
    pub batch_size: usize,
    #[serde(rename = "IMAGE_SIZE_H")]
    pub image_height: usize,
    #[serde(rename = "IMAGE_SIZE_W")]
    pub image_width: usize,
    /// Batches the loader may prepare ahead of the training loop.
    pub prefetch_buffer: usize,
    pub num_classes: usize,
    /// Probability of dropping a unit in the `Dropout` model.
    pub dropout_constant: f64,
    /// Penalty strength for the regularized models.
    pub reg_constant: f64,
    /// Epochs without validation improvement tolerated before stopping.
    pub required_improvement: usize,
    pub learning_rate: f64,
    pub hidden_units: usize,
    /// Gradient towers per step; 1 disables tower averaging.
    pub towers: usize,
    /// Steps between interval metric writes in tower mode.
    pub log_interval: usize,
    pub seed: u64,
    /// Caps each train/validation pass; set by trial runs.
    pub max_steps_per_phase: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            experiment_name: String::new(),
            epochs: 100,
            batch_size: 32,
            image_height: 28,
            image_width: 28,
            prefetch_buffer: 4,
            num_classes: 10,
            dropout_constant: 0.5,
            reg_constant: 0.01,
            required_improvement: 10,
            learning_rate: 0.05,
            hidden_units: 128,
            towers: 1,
            log_interval: 50,
            seed: 0,
            max_steps_per_phase: None,
        }
    }
}

impl RunConfig {
    /// Smoke-test settings: one epoch, tiny batches, one step per phase.
    pub fn trial(mut self) -> Self {
        self.epochs = 1;
        self.batch_size = 2;
        self.prefetch_buffer = 2;
        self.max_steps_per_phase = Some(1);
        self
    }

    pub fn input_size(&self) -> usize {
        self.image_height * self.image_width
    }

    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::config("EPOCHS must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(Error::config("BATCH_SIZE must be at least 1"));
        }
        if self.image_height == 0 || self.image_width == 0 {
            return Err(Error::config("image dimensions must be non-zero"));
        }
        if self.num_classes < 2 {
            return Err(Error::config(format!(
                "NUM_CLASSES must be at least 2, got {}",
                self.num_classes
            )));
        }
        // Labels are stored as bytes.
        if self.num_classes > MAX_CLASSES {
            return Err(Error::config(format!(
                "NUM_CLASSES must be at most {MAX_CLASSES}, got {}",
                self.num_classes
            )));
        }
        if !(0.0..1.0).contains(&self.dropout_constant) {
            return Err(Error::config(format!(
                "DROPOUT_CONSTANT must lie in [0, 1), got {}",
                self.dropout_constant
            )));
        }
        if self.reg_constant < 0.0 {
            return Err(Error::config("REG_CONSTANT must be non-negative"));
        }
        if self.hidden_units == 0 {
            return Err(Error::config("HIDDEN_UNITS must be at least 1"));
        }
        if self.towers == 0 {
            return Err(Error::config("TOWERS must be at least 1"));
        }
        if self.log_interval == 0 {
            return Err(Error::config("LOG_INTERVAL must be at least 1"));
        }
        if self.max_steps_per_phase == Some(0) {
            return Err(Error::config("MAX_STEPS_PER_PHASE must be at least 1 when set"));
        }
        Ok(())
    }
}

/// Process-wide settings: where data and logs live plus the base run config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub run: RunConfig,
    /// Directory holding the MNIST IDX files; synthetic data when absent.
    pub data_dir: Option<PathBuf>,
    /// Directory for JSONL run logs.
    pub log_dir: Option<PathBuf>,
    /// Directory for best-epoch network snapshots.
    pub checkpoint_dir: Option<PathBuf>,
    /// Address for the live metrics dashboard, e.g. `127.0.0.1:7878`.
    pub dashboard: Option<String>,
    pub trial_run: bool,
}

impl Settings {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Settings> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trial_overrides_sizes_and_caps_steps() {
        let cfg = RunConfig::default().trial();
        assert_eq!(cfg.epochs, 1);
        assert_eq!(cfg.batch_size, 2);
        assert_eq!(cfg.prefetch_buffer, 2);
        assert_eq!(cfg.max_steps_per_phase, Some(1));
        assert_eq!(cfg.reg_constant, 0.01);
    }

    #[test]
    fn serializes_with_upper_case_keys() {
        let json = serde_json::to_value(RunConfig::default()).unwrap();
        assert_eq!(json["REG_CONSTANT"], 0.01);
        assert_eq!(json["IMAGE_SIZE_H"], 28);
        assert_eq!(json["REQUIRED_IMPROVEMENT"], 10);
        assert!(json.get("reg_constant").is_none());
    }

    #[test]
    fn partial_settings_fill_defaults() {
        let s: Settings =
            serde_json::from_str(r#"{"run": {"EPOCHS": 3, "TOWERS": 2}, "trial_run": true}"#).unwrap();
        assert_eq!(s.run.epochs, 3);
        assert_eq!(s.run.towers, 2);
        assert_eq!(s.run.batch_size, 32);
        assert!(s.trial_run);
        assert!(s.data_dir.is_none());
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(RunConfig::default().validate().is_ok());
        let bad = RunConfig { dropout_constant: 1.0, ..RunConfig::default() };
        assert!(matches!(bad.validate(), Err(Error::Config(_))));
        let bad = RunConfig { towers: 0, ..RunConfig::default() };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn class_count_must_fit_a_byte_label() {
        let ok = RunConfig { num_classes: 256, ..RunConfig::default() };
        assert!(ok.validate().is_ok());
        let bad = RunConfig { num_classes: 257, ..RunConfig::default() };
        assert!(matches!(bad.validate(), Err(Error::Config(_))));
    }
}
