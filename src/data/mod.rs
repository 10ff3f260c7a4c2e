pub mod dataset;
pub mod idx;
pub mod loader;
pub mod mnist;
pub mod synthetic;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use crate::config::RunConfig;
use crate::error::{Error, Result};

pub use dataset::{one_hot, Batch, Dataset, ImageShape};
pub use loader::BatchLoader;

/// Train / validation / test datasets shared read-only by every sweep entry.
#[derive(Debug, Clone)]
pub struct Splits {
    pub train: Arc<Dataset>,
    pub val: Arc<Dataset>,
    pub test: Option<Arc<Dataset>>,
}

impl Splits {
    pub fn new(train: Dataset, val: Dataset, test: Option<Dataset>) -> Splits {
        Splits { train: Arc::new(train), val: Arc::new(val), test: test.map(Arc::new) }
    }
}

/// Where the images come from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    /// Directory holding the four MNIST IDX files.
    Mnist(PathBuf),
    /// Generated data with the configured image shape.
    Synthetic { train: usize, validation: usize, test: usize, seed: u64 },
}

impl DataSource {
    pub fn synthetic_default(seed: u64) -> DataSource {
        DataSource::Synthetic { train: 2_000, validation: 400, test: 400, seed }
    }

    pub fn load(&self, config: &RunConfig) -> Result<Splits> {
        match self {
            DataSource::Mnist(dir) => {
                let (train, val, test) = mnist::load_mnist(dir, config.num_classes)?;
                if train.shape != ImageShape::grayscale(config.image_height, config.image_width) {
                    return Err(Error::dataset(format!(
                        "images are {}x{} but the run expects {}x{}",
                        train.shape.height, train.shape.width, config.image_height, config.image_width
                    )));
                }
                Ok(Splits::new(train, val, test))
            }
            DataSource::Synthetic { train, validation, test, seed } => {
                warn!("no data directory configured, training on synthetic images");
                let shape = ImageShape::grayscale(config.image_height, config.image_width);
                let full = synthetic::synthetic_dataset(train + validation, shape, config.num_classes, *seed)?;
                let (train, val) = full.split_tail(*validation)?;
                let test = if *test > 0 {
                    Some(synthetic::synthetic_dataset(*test, shape, config.num_classes, seed.wrapping_add(1))?)
                } else {
                    None
                };
                Ok(Splits::new(train, val, test))
            }
        }
    }
}
